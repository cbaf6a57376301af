//! Error handling for handle checking operations.
//!
//! Only failures that stop a run before any handle is dispatched live here:
//! bad configuration, unreadable input, an output file that cannot be opened,
//! or an HTTP client that cannot be built. Anything that goes wrong while
//! checking a single handle is an [`Outcome`](crate::Outcome) instead.

use thiserror::Error;

/// Main error type for fragment checking operations.
#[derive(Debug, Clone, Error)]
pub enum FragmentCheckError {
    /// Handle is empty after normalization
    #[error("Invalid handle '{handle}': {reason}")]
    InvalidHandle { handle: String, reason: String },

    /// HTTP client construction or proxy setup failed
    #[error("Network error: {message}{}", detail_suffix(.detail))]
    NetworkError {
        message: String,
        detail: Option<String>,
    },

    /// Configuration errors (invalid settings, unparseable TOML, etc.)
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// File I/O errors when reading handle lists or config files
    #[error("File error at '{path}': {message}")]
    FileError { path: String, message: String },

    /// The durable result destination could not be opened
    #[error("Cannot open result sink '{path}': {message}")]
    SinkError { path: String, message: String },

    /// `Dispatcher::run` was called on a dispatcher that already ran
    #[error("Dispatcher has already been started")]
    AlreadyStarted,

    /// Generic internal errors that don't fit other categories
    #[error("Internal error: {message}")]
    Internal { message: String },
}

fn detail_suffix(detail: &Option<String>) -> String {
    match detail {
        Some(detail) => format!(" (source: {})", detail),
        None => String::new(),
    }
}

impl FragmentCheckError {
    /// Create a new invalid handle error.
    pub fn invalid_handle<H: Into<String>, R: Into<String>>(handle: H, reason: R) -> Self {
        Self::InvalidHandle {
            handle: handle.into(),
            reason: reason.into(),
        }
    }

    /// Create a new network error with source information.
    pub fn network_with_source<M: Into<String>, S: Into<String>>(message: M, source: S) -> Self {
        Self::NetworkError {
            message: message.into(),
            detail: Some(source.into()),
        }
    }

    pub fn config<M: Into<String>>(message: M) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create a new file error.
    pub fn file_error<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::FileError {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn sink<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::SinkError {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for FragmentCheckError {
    fn from(err: reqwest::Error) -> Self {
        Self::network_with_source("HTTP client error", err.to_string())
    }
}

impl From<toml::de::Error> for FragmentCheckError {
    fn from(err: toml::de::Error) -> Self {
        Self::config(format!("Failed to parse TOML configuration: {}", err))
    }
}

impl From<std::io::Error> for FragmentCheckError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal {
            message: format!("I/O error: {}", err),
        }
    }
}
