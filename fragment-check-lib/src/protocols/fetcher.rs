//! HTTP fetcher for marketplace profile pages.
//!
//! One GET per handle with a fixed browser-like header set, an optional
//! upstream proxy chosen once at construction, and a per-request timeout.
//! There is no retry: a failed request becomes a `RequestError` outcome.

use crate::error::FragmentCheckError;
use crate::types::{CheckConfig, Handle, Outcome};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE, CONNECTION};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// User agent of a desktop Chrome 112 on Windows 10.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/112.0.0.0 Safari/537.36";

pub const ACCEPT_LANGUAGE_VALUE: &str = "en-US,en;q=0.9";

/// A successfully fetched page.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL after following redirects
    pub final_url: String,
    /// Raw (already decompressed) response body
    pub body: Vec<u8>,
}

/// Why a fetch produced no page.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("failed to read response body: {0}")]
    Body(String),
}

impl From<FetchError> for Outcome {
    fn from(err: FetchError) -> Self {
        Outcome::RequestError(err.to_string())
    }
}

/// HTTP client bound to one marketplace, one timeout and at most one proxy.
#[derive(Clone)]
pub struct MarketplaceClient {
    http_client: reqwest::Client,
    config: CheckConfig,
}

impl MarketplaceClient {
    /// Build a client from the run configuration.
    ///
    /// `Accept-Encoding: gzip, deflate` is sent by reqwest itself because
    /// decompression is enabled; setting it by hand would turn automatic
    /// decompression off.
    ///
    /// # Errors
    ///
    /// Returns `FragmentCheckError::NetworkError` if the proxy URL is invalid
    /// or the TLS backend cannot be initialized.
    pub fn new(config: &CheckConfig) -> Result<Self, FragmentCheckError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static(ACCEPT_LANGUAGE_VALUE),
        );
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));

        let mut builder = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .gzip(true)
            .deflate(true)
            .timeout(config.timeout)
            .connect_timeout(config.timeout);

        if let Some(proxy_url) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy_url.as_str()).map_err(|e| {
                FragmentCheckError::network_with_source(
                    format!("Invalid proxy '{}'", proxy_url),
                    e.to_string(),
                )
            })?;
            builder = builder.proxy(proxy);
        }

        let http_client = builder.build().map_err(|e| {
            FragmentCheckError::network_with_source("Failed to create HTTP client", e.to_string())
        })?;

        Ok(Self {
            http_client,
            config: config.clone(),
        })
    }

    pub fn config(&self) -> &CheckConfig {
        &self.config
    }

    /// Fetch the profile page of one handle.
    pub async fn fetch(&self, handle: &Handle) -> Result<FetchedPage, FetchError> {
        let url = self.config.handle_url(handle);
        debug!(%handle, %url, "sending request");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let final_url = response.url().to_string();
        debug!(%handle, %final_url, status = %response.status(), "received response");

        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(self.config.timeout)
            } else {
                FetchError::Body(e.to_string())
            }
        })?;

        Ok(FetchedPage {
            final_url,
            body: body.to_vec(),
        })
    }

    fn request_error(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.config.timeout)
        } else if err.is_connect() {
            FetchError::Connect(err.to_string())
        } else {
            FetchError::Request(err.to_string())
        }
    }
}
