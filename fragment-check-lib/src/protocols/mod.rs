//! Marketplace protocol: fetching profile pages and reading their status.

/// HTTP fetcher for profile pages
pub mod fetcher;

/// Final-URL and status-badge classification
pub mod status;

// Re-export commonly used functions and types
pub use fetcher::{FetchError, FetchedPage, MarketplaceClient, USER_AGENT};
pub use status::{classify, StatusExtractor, STATUS_SELECTOR};
