//! Main handle checker implementation.
//!
//! This module provides the `HandleChecker` struct that combines the
//! marketplace fetcher and the status extractor into a single check per
//! handle, plus the `StatusProbe` seam the dispatcher works against.

use crate::error::FragmentCheckError;
use crate::protocols::{MarketplaceClient, StatusExtractor};
use crate::types::{CheckConfig, Handle, Outcome, ResultLine};
use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};
use std::pin::Pin;

/// Something that can turn a handle into an outcome.
///
/// Implementations must never fail: every problem is expressed as an
/// `Outcome` so the dispatcher can record it like any other result.
#[async_trait]
pub trait StatusProbe: Send + Sync {
    async fn probe(&self, handle: &Handle) -> Outcome;
}

/// Checks handles against the marketplace.
///
/// # Example
///
/// ```rust,no_run
/// use fragment_check_lib::{Handle, HandleChecker};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let checker = HandleChecker::new()?;
///     let outcome = checker.check_handle(&Handle::parse("@alice")?).await;
///     println!("alice: {}", outcome);
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct HandleChecker {
    client: MarketplaceClient,
    extractor: StatusExtractor,
}

impl HandleChecker {
    /// Create a checker with the default configuration
    /// (fragment.com, 10 second timeout, no proxy).
    pub fn new() -> Result<Self, FragmentCheckError> {
        Self::with_config(CheckConfig::default())
    }

    /// Create a checker with custom configuration.
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be built, e.g. because the proxy URL
    /// is invalid.
    pub fn with_config(config: CheckConfig) -> Result<Self, FragmentCheckError> {
        let client = MarketplaceClient::new(&config)?;
        let extractor = StatusExtractor::for_config(&config);
        Ok(Self { client, extractor })
    }

    /// Check a single handle: one request, one classification.
    pub async fn check_handle(&self, handle: &Handle) -> Outcome {
        match self.client.fetch(handle).await {
            Ok(page) => self.extractor.classify(&page.final_url, &page.body, handle),
            Err(e) => e.into(),
        }
    }

    /// Check handles concurrently and yield lines as they complete.
    ///
    /// Runs at most `config().concurrency` checks at once. Nothing is
    /// persisted and there is no cancellation; use
    /// [`Dispatcher`](crate::Dispatcher) for full runs.
    pub fn check_handles_stream(
        &self,
        handles: &[Handle],
    ) -> Pin<Box<dyn Stream<Item = ResultLine> + Send + '_>> {
        let handles = handles.to_vec();
        let stream = futures::stream::iter(handles)
            .map(move |handle| async move {
                let outcome = self.check_handle(&handle).await;
                ResultLine::new(handle, outcome)
            })
            .buffer_unordered(self.config().concurrency);

        Box::pin(stream)
    }

    /// Get the configuration of this checker.
    pub fn config(&self) -> &CheckConfig {
        self.client.config()
    }
}

#[async_trait]
impl StatusProbe for HandleChecker {
    async fn probe(&self, handle: &Handle) -> Outcome {
        self.check_handle(handle).await
    }
}
