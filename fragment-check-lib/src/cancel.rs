//! One-shot cancellation flag observed by the dispatcher.

use tokio_util::sync::CancellationToken;

/// A one-shot, idempotent stop request.
///
/// Clones share the same state: triggering any clone sets the flag for all
/// of them, and once set it stays set. Setting it only stops new dispatches;
/// work already in flight runs to completion.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    token: CancellationToken,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop. Calling this more than once has no further effect.
    pub fn trigger(&self) {
        self.token.cancel();
    }

    pub fn is_set(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the flag has been set.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}
