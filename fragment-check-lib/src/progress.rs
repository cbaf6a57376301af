//! Progress counter shared between workers and the progress reporter.

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Point-in-time progress of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub processed: usize,
    pub total: usize,
}

impl ProgressSnapshot {
    /// Completion ratio in `0.0..=1.0`. An empty run counts as complete.
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.processed as f64 / self.total as f64
        }
    }

    pub fn percent(&self) -> f64 {
        self.ratio() * 100.0
    }

    pub fn is_complete(&self) -> bool {
        self.processed >= self.total
    }
}

/// Counts completed work items. `processed` never exceeds `total`.
#[derive(Debug)]
pub struct ProgressTracker {
    processed: AtomicUsize,
    total: usize,
}

impl ProgressTracker {
    /// Tracker for a run of `total` work items, none processed yet.
    pub fn new(total: usize) -> Self {
        Self {
            processed: AtomicUsize::new(0),
            total,
        }
    }

    /// Count one completed work item, whatever its outcome.
    pub fn increment(&self) {
        let _ = self
            .processed
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |processed| {
                (processed < self.total).then_some(processed + 1)
            });
    }

    /// Current counts. Safe to call from any task while the run is going.
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            processed: self.processed.load(Ordering::Acquire),
            total: self.total,
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }
}
