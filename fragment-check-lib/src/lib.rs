//! # Fragment Check Library
//!
//! Checks the marketplace status of Telegram usernames on fragment.com and
//! records one result line per handle.
//!
//! The library provides a one-off API ([`HandleChecker`]) and a full run
//! engine ([`Dispatcher`]) with bounded concurrency, incremental result
//! persistence, progress reporting and cooperative cancellation.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fragment_check_lib::{Handle, HandleChecker};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let checker = HandleChecker::new()?;
//!     let handle = Handle::parse("@alice")?;
//!     let outcome = checker.check_handle(&handle).await;
//!
//!     println!("@{} | {}", handle, outcome);
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Redirect detection**: a handle nobody owns redirects to the search page
//! - **Status extraction**: sold / available / taken read from the lot page
//! - **Bounded dispatch**: a fixed number of checks in flight at once
//! - **Cancellation**: stop dispatching, let running checks finish
//! - **Configurable**: TOML files and `FC_*` environment variables

pub use cancel::CancellationFlag;
pub use checker::{HandleChecker, StatusProbe};
pub use concurrent::{DispatchState, Dispatcher, RunSummary};
pub use config::{load_env_config, ConfigManager, DefaultsConfig, EnvConfig, FileConfig};
pub use error::FragmentCheckError;
pub use progress::{ProgressSnapshot, ProgressTracker};
pub use protocols::{
    classify, FetchError, FetchedPage, MarketplaceClient, StatusExtractor, STATUS_SELECTOR,
    USER_AGENT,
};
pub use reporter::{RunReporter, TracingReporter};
pub use sink::ResultSink;
pub use types::{
    CheckConfig, Handle, Outcome, ResultLine, DEFAULT_CONCURRENCY, DEFAULT_MARKETPLACE_URL,
    MAX_CONCURRENCY,
};
pub use utils::{load_handles_from_file, parse_handles, parse_timeout_string};

mod cancel;
mod checker;
mod concurrent;
mod config;
mod error;
mod progress;
mod protocols;
mod reporter;
mod sink;
mod types;
mod utils;

pub type Result<T> = std::result::Result<T, FragmentCheckError>;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
