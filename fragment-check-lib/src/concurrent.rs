//! Bounded-concurrency dispatch of handle checks.
//!
//! The [`Dispatcher`] walks the handle list in input order, takes one
//! semaphore permit per handle and spawns the check into a task group. Each
//! unit probes its handle, records the line, bumps the progress counter and
//! drops its permit. A cancellation flag is consulted before every dispatch;
//! once it is set no further handle is started, and the dispatcher waits for
//! the units already running before it returns.

use crate::cancel::CancellationFlag;
use crate::checker::StatusProbe;
use crate::error::FragmentCheckError;
use crate::progress::{ProgressSnapshot, ProgressTracker};
use crate::reporter::{RunReporter, TracingReporter};
use crate::sink::ResultSink;
use crate::types::{Handle, Outcome, ResultLine, DEFAULT_CONCURRENCY, MAX_CONCURRENCY};
use futures::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};

/// Lifecycle of a dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchState {
    /// Constructed, not yet started
    Idle,
    /// Issuing work while slots, handles and no stop request remain
    Running,
    /// No new work; waiting for in-flight units
    Draining,
    /// Every issued unit has completed
    Done,
}

/// What a finished run did.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub dispatched: usize,
    pub processed: usize,
    pub cancelled: bool,
    /// Outcome label -> count
    pub counts: BTreeMap<&'static str, usize>,
    pub write_failures: usize,
    /// Most units the task group held at once, finished ones included
    pub peak_units: usize,
    #[serde(rename = "elapsed_secs", serialize_with = "serialize_secs")]
    pub elapsed: Duration,
    pub lines: Vec<String>,
}

fn serialize_secs<S: serde::Serializer>(duration: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(duration.as_secs_f64())
}

impl RunSummary {
    pub fn count(&self, label: &str) -> usize {
        self.counts.get(label).copied().unwrap_or(0)
    }

    /// Handles never dispatched because of cancellation.
    pub fn skipped(&self) -> usize {
        self.total - self.dispatched
    }
}

/// Fixed-size worker pool over a list of handles.
///
/// # Example
///
/// ```rust,no_run
/// use fragment_check_lib::{Dispatcher, Handle, HandleChecker, ResultSink};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let handles = vec![Handle::parse("@alice")?, Handle::parse("@bob")?];
///     let checker = Arc::new(HandleChecker::new()?);
///     let sink = Arc::new(ResultSink::open("results.txt")?);
///
///     let dispatcher = Dispatcher::new(handles, checker, sink).with_concurrency(4);
///     let summary = dispatcher.run().await?;
///     println!("{}/{} checked", summary.processed, summary.total);
///     Ok(())
/// }
/// ```
pub struct Dispatcher {
    handles: Vec<Handle>,
    probe: Arc<dyn StatusProbe>,
    sink: Arc<ResultSink>,
    progress: Arc<ProgressTracker>,
    cancel: CancellationFlag,
    reporter: Arc<dyn RunReporter>,
    concurrency: usize,
    state: Mutex<DispatchState>,
}

impl Dispatcher {
    pub fn new(handles: Vec<Handle>, probe: Arc<dyn StatusProbe>, sink: Arc<ResultSink>) -> Self {
        let progress = Arc::new(ProgressTracker::new(handles.len()));
        Self {
            handles,
            probe,
            sink,
            progress,
            cancel: CancellationFlag::new(),
            reporter: Arc::new(TracingReporter),
            concurrency: DEFAULT_CONCURRENCY,
            state: Mutex::new(DispatchState::Idle),
        }
    }

    /// Set the number of slots, clamped to 1..=100.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.clamp(1, MAX_CONCURRENCY);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn RunReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Shared progress counter, for a ticker to poll while `run` executes.
    pub fn progress(&self) -> Arc<ProgressTracker> {
        self.progress.clone()
    }

    pub fn cancellation(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    pub fn sink(&self) -> Arc<ResultSink> {
        self.sink.clone()
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn state(&self) -> DispatchState {
        *self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn set_state(&self, next: DispatchState) {
        *self.state.lock().unwrap_or_else(|p| p.into_inner()) = next;
    }

    fn start(&self) -> Result<(), FragmentCheckError> {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        if *state != DispatchState::Idle {
            return Err(FragmentCheckError::AlreadyStarted);
        }
        *state = DispatchState::Running;
        Ok(())
    }

    /// Check every handle and wait until all dispatched work has finished.
    ///
    /// # Errors
    ///
    /// Only `AlreadyStarted` when called a second time. Per-handle failures
    /// are recorded as outcomes.
    pub async fn run(&self) -> Result<RunSummary, FragmentCheckError> {
        self.start()?;
        let started = Instant::now();
        let total = self.handles.len();
        self.reporter.run_started(total, self.concurrency);

        let slots = Arc::new(Semaphore::new(self.concurrency));
        let mut units = JoinSet::new();
        let mut dispatched = 0usize;
        let mut peak_units = 0usize;
        let mut cancelled = false;

        for handle in &self.handles {
            if self.cancel.is_set() {
                cancelled = true;
                break;
            }

            // Waiting for a slot is the only place the loop suspends; a stop
            // request arriving meanwhile ends the loop without dispatching.
            let permit = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
                permit = slots.clone().acquire_owned() => permit,
            };
            // The semaphore is owned here and never closed.
            let Ok(permit) = permit else { break };

            // Reap finished units so the group stays bounded by the slot count.
            while let Some(joined) = units.try_join_next() {
                self.report_join(joined);
            }

            self.reporter.dispatching(handle);
            dispatched += 1;

            let handle = handle.clone();
            let probe = self.probe.clone();
            let sink = self.sink.clone();
            let progress = self.progress.clone();
            let reporter = self.reporter.clone();

            units.spawn(async move {
                let outcome = match AssertUnwindSafe(probe.probe(&handle)).catch_unwind().await {
                    Ok(outcome) => outcome,
                    Err(panic) => {
                        let message = panic_message(panic.as_ref());
                        reporter.unit_failed(Some(&handle), &message);
                        Outcome::RequestError(format!("check aborted: {}", message))
                    }
                };

                let line = ResultLine::new(handle, outcome);
                reporter.outcome(&line);
                sink.record(line);
                progress.increment();
                drop(permit);
            });
            peak_units = peak_units.max(units.len());
        }

        self.set_state(DispatchState::Draining);
        if cancelled {
            self.reporter.cancelled(dispatched, total - dispatched);
        }

        while let Some(joined) = units.join_next().await {
            self.report_join(joined);
        }

        self.set_state(DispatchState::Done);
        let ProgressSnapshot { processed, total } = self.progress.snapshot();
        self.reporter.run_finished(processed, total);

        Ok(self.summarize(dispatched, cancelled, peak_units, started.elapsed()))
    }

    fn report_join(&self, joined: Result<(), JoinError>) {
        if let Err(e) = joined {
            self.reporter.unit_failed(None, &e.to_string());
        }
    }

    fn summarize(
        &self,
        dispatched: usize,
        cancelled: bool,
        peak_units: usize,
        elapsed: Duration,
    ) -> RunSummary {
        let lines = self.sink.snapshot();
        let mut counts = BTreeMap::new();
        for line in &lines {
            *counts.entry(line.outcome.label()).or_insert(0) += 1;
        }
        let ProgressSnapshot { processed, total } = self.progress.snapshot();

        RunSummary {
            total,
            dispatched,
            processed,
            cancelled,
            counts,
            write_failures: self.sink.write_failures(),
            peak_units,
            elapsed,
            lines: lines.iter().map(ToString::to_string).collect(),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn handles(names: &[&str]) -> Vec<Handle> {
        names.iter().map(|n| Handle::parse(n).unwrap()).collect()
    }

    fn numbered(count: usize) -> Vec<Handle> {
        (0..count)
            .map(|i| Handle::parse(&format!("user{}", i)).unwrap())
            .collect()
    }

    /// Sleeps briefly and tracks the highest number of concurrent probes.
    #[derive(Default)]
    struct CountingProbe {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    #[async_trait]
    impl StatusProbe for CountingProbe {
        async fn probe(&self, _handle: &Handle) -> Outcome {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Outcome::Taken
        }
    }

    /// Records start/end events in order.
    #[derive(Default)]
    struct LoggingProbe {
        events: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl StatusProbe for LoggingProbe {
        async fn probe(&self, handle: &Handle) -> Outcome {
            self.events.lock().unwrap().push(format!("start {}", handle));
            tokio::time::sleep(Duration::from_millis(2)).await;
            self.events.lock().unwrap().push(format!("end {}", handle));
            Outcome::Free
        }
    }

    /// Triggers cancellation while probing the handle named `stop_at`.
    struct StoppingProbe {
        stop_at: &'static str,
        cancel: CancellationFlag,
        probed: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl StatusProbe for StoppingProbe {
        async fn probe(&self, handle: &Handle) -> Outcome {
            self.probed.lock().unwrap().push(handle.to_string());
            if handle.as_str() == self.stop_at {
                self.cancel.trigger();
            }
            Outcome::Sold
        }
    }

    struct YieldingProbe;

    #[async_trait]
    impl StatusProbe for YieldingProbe {
        async fn probe(&self, _handle: &Handle) -> Outcome {
            tokio::task::yield_now().await;
            Outcome::Free
        }
    }

    struct PanickingProbe;

    #[async_trait]
    impl StatusProbe for PanickingProbe {
        async fn probe(&self, handle: &Handle) -> Outcome {
            if handle.as_str() == "boom" {
                panic!("probe exploded");
            }
            Outcome::Available
        }
    }

    #[tokio::test]
    async fn test_every_handle_processed_once() {
        let probe = Arc::new(CountingProbe::default());
        let sink = Arc::new(ResultSink::in_memory());
        let dispatcher = Dispatcher::new(numbered(25), probe, sink.clone()).with_concurrency(4);

        let summary = dispatcher.run().await.unwrap();

        assert_eq!(summary.total, 25);
        assert_eq!(summary.dispatched, 25);
        assert_eq!(summary.processed, 25);
        assert!(!summary.cancelled);
        assert_eq!(summary.count("taken"), 25);
        assert_eq!(sink.len(), 25);
        assert_eq!(dispatcher.state(), DispatchState::Done);
        assert!(dispatcher.progress().snapshot().is_complete());
    }

    #[tokio::test]
    async fn test_concurrency_limit_respected() {
        let probe = Arc::new(CountingProbe::default());
        let sink = Arc::new(ResultSink::in_memory());
        let dispatcher =
            Dispatcher::new(numbered(40), probe.clone(), sink).with_concurrency(3);

        dispatcher.run().await.unwrap();

        let max = probe.max_in_flight.load(Ordering::SeqCst);
        assert!(max <= 3, "max in flight was {}", max);
        assert!(max >= 1);
    }

    #[tokio::test]
    async fn test_finished_units_reaped_during_dispatch() {
        let sink = Arc::new(ResultSink::in_memory());
        let dispatcher =
            Dispatcher::new(numbered(3000), Arc::new(YieldingProbe), sink).with_concurrency(4);

        let summary = dispatcher.run().await.unwrap();

        assert_eq!(summary.processed, 3000);
        assert!(
            summary.peak_units <= 4 + 1,
            "task group grew to {} units",
            summary.peak_units
        );
    }

    #[tokio::test]
    async fn test_single_slot_runs_in_input_order() {
        let probe = Arc::new(LoggingProbe::default());
        let sink = Arc::new(ResultSink::in_memory());
        let dispatcher =
            Dispatcher::new(handles(&["@alice", "@bob"]), probe.clone(), sink.clone())
                .with_concurrency(1);
        assert_eq!(dispatcher.state(), DispatchState::Idle);

        dispatcher.run().await.unwrap();

        assert_eq!(
            dispatcher.progress().snapshot(),
            ProgressSnapshot {
                processed: 2,
                total: 2
            }
        );
        assert_eq!(dispatcher.state(), DispatchState::Done);

        let events = probe.events.lock().unwrap().clone();
        assert_eq!(events, vec!["start alice", "end alice", "start bob", "end bob"]);

        let lines: Vec<String> = sink.snapshot().iter().map(ToString::to_string).collect();
        assert_eq!(lines, vec!["@alice | Free", "@bob | Free"]);
    }

    #[tokio::test]
    async fn test_cancellation_stops_new_dispatches() {
        let cancel = CancellationFlag::new();
        let probe = Arc::new(StoppingProbe {
            stop_at: "user2",
            cancel: cancel.clone(),
            probed: Mutex::new(Vec::new()),
        });
        let sink = Arc::new(ResultSink::in_memory());
        let dispatcher = Dispatcher::new(numbered(10), probe.clone(), sink.clone())
            .with_concurrency(1)
            .with_cancellation(cancel);

        let summary = dispatcher.run().await.unwrap();

        assert!(summary.cancelled);
        assert_eq!(summary.dispatched, 3);
        assert_eq!(summary.processed, 3);
        assert_eq!(summary.skipped(), 7);
        assert_eq!(sink.len(), summary.dispatched);
        assert_eq!(
            probe.probed.lock().unwrap().clone(),
            vec!["user0", "user1", "user2"]
        );
        assert_eq!(dispatcher.state(), DispatchState::Done);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_dispatches_nothing() {
        let cancel = CancellationFlag::new();
        cancel.trigger();
        let sink = Arc::new(ResultSink::in_memory());
        let dispatcher = Dispatcher::new(numbered(5), Arc::new(CountingProbe::default()), sink)
            .with_cancellation(cancel);

        let summary = dispatcher.run().await.unwrap();

        assert!(summary.cancelled);
        assert_eq!(summary.dispatched, 0);
        assert_eq!(summary.processed, 0);
        assert!(summary.lines.is_empty());
    }

    #[tokio::test]
    async fn test_empty_input_finishes_immediately() {
        let sink = Arc::new(ResultSink::in_memory());
        let dispatcher = Dispatcher::new(Vec::new(), Arc::new(CountingProbe::default()), sink);

        let summary = dispatcher.run().await.unwrap();

        assert_eq!(summary.total, 0);
        assert_eq!(summary.processed, 0);
        assert_eq!(dispatcher.state(), DispatchState::Done);
    }

    #[tokio::test]
    async fn test_second_run_rejected() {
        let sink = Arc::new(ResultSink::in_memory());
        let dispatcher =
            Dispatcher::new(numbered(2), Arc::new(CountingProbe::default()), sink.clone());

        dispatcher.run().await.unwrap();
        let second = dispatcher.run().await;

        assert!(matches!(second, Err(FragmentCheckError::AlreadyStarted)));
        assert_eq!(sink.len(), 2);
    }

    #[tokio::test]
    async fn test_panicking_probe_still_yields_line() {
        let sink = Arc::new(ResultSink::in_memory());
        let dispatcher = Dispatcher::new(
            handles(&["ok", "boom", "fine"]),
            Arc::new(PanickingProbe),
            sink.clone(),
        )
        .with_concurrency(2);

        let summary = dispatcher.run().await.unwrap();

        assert_eq!(summary.processed, 3);
        assert_eq!(summary.count("available"), 2);
        assert_eq!(summary.count("request_error"), 1);
        assert!(summary
            .lines
            .iter()
            .any(|l| l == "@boom | Error: check aborted: probe exploded"));
    }

    #[test]
    fn test_concurrency_clamped() {
        let sink = Arc::new(ResultSink::in_memory());
        let probe: Arc<dyn StatusProbe> = Arc::new(CountingProbe::default());
        assert_eq!(
            Dispatcher::new(Vec::new(), probe.clone(), sink.clone())
                .with_concurrency(0)
                .concurrency(),
            1
        );
        assert_eq!(
            Dispatcher::new(Vec::new(), probe, sink)
                .with_concurrency(500)
                .concurrency(),
            MAX_CONCURRENCY
        );
    }

    #[test]
    fn test_summary_serializes_elapsed_secs() {
        let summary = RunSummary {
            total: 1,
            dispatched: 1,
            processed: 1,
            cancelled: false,
            counts: BTreeMap::from([("free", 1)]),
            write_failures: 0,
            peak_units: 1,
            elapsed: Duration::from_millis(1500),
            lines: vec!["@alice | Free".to_string()],
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["elapsed_secs"], 1.5);
        assert_eq!(json["counts"]["free"], 1);
    }
}
