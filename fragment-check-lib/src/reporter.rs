//! Run event reporting.
//!
//! The dispatcher does not log through a global: it reports significant
//! events to a [`RunReporter`] handed to it at construction. The default
//! [`TracingReporter`] turns them into `tracing` events; the CLI decides where
//! those end up.

use crate::types::{Handle, ResultLine};
use tracing::{debug, error, info, warn};

/// Receiver of dispatcher events. All methods are called from worker tasks
/// as well as from the submission loop, so implementations must be cheap and
/// thread-safe.
pub trait RunReporter: Send + Sync {
    fn run_started(&self, total: usize, concurrency: usize);

    fn dispatching(&self, _handle: &Handle) {}

    fn outcome(&self, line: &ResultLine);

    /// Cancellation was observed; `skipped` handles will never be dispatched.
    fn cancelled(&self, dispatched: usize, skipped: usize);

    /// A unit of work failed outside the normal outcome path. `handle` is
    /// `None` when the failure could not be tied to a handle.
    fn unit_failed(&self, handle: Option<&Handle>, message: &str);

    fn run_finished(&self, processed: usize, total: usize);
}

/// Reports events through `tracing`, with the level matching the severity
/// of each outcome.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl RunReporter for TracingReporter {
    fn run_started(&self, total: usize, concurrency: usize) {
        info!(
            total,
            concurrency,
            "Starting check for {} handles with {} workers",
            total,
            concurrency
        );
    }

    fn dispatching(&self, handle: &Handle) {
        debug!(%handle, "dispatching");
    }

    fn outcome(&self, line: &ResultLine) {
        if line.outcome.is_error() {
            error!(handle = %line.handle, outcome = line.outcome.label(), "{}", line);
        } else if line.outcome.is_suspicious() {
            warn!(handle = %line.handle, outcome = line.outcome.label(), "{}", line);
        } else {
            info!(handle = %line.handle, outcome = line.outcome.label(), "{}", line);
        }
    }

    fn cancelled(&self, dispatched: usize, skipped: usize) {
        warn!(
            dispatched,
            skipped, "Received stop signal, no new handles will be dispatched"
        );
    }

    fn unit_failed(&self, handle: Option<&Handle>, message: &str) {
        match handle {
            Some(handle) => error!(critical = true, %handle, "worker failed: {}", message),
            None => error!(critical = true, "worker failed: {}", message),
        }
    }

    fn run_finished(&self, processed: usize, total: usize) {
        info!(processed, total, "Handle checking completed");
    }
}
