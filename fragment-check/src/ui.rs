//! Terminal display for the fragment-check CLI.
//!
//! The progress ticker keeps the terminal title up to date while a run is in
//! progress, and the summary printer renders the end-of-run report. Uses
//! only the `console` crate.

use console::{style, StyledObject, Term};
use fragment_check_lib::{ProgressSnapshot, ProgressTracker, RunSummary};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::debug;

const TICK: Duration = Duration::from_secs(1);

/// Order in which outcome counts are shown.
const OUTCOME_LABELS: &[&str] = &[
    "free",
    "available",
    "sold",
    "taken",
    "unknown",
    "not_found",
    "request_error",
    "parse_error",
];

// ── Progress ticker ──────────────────────────────────────────────────────────

/// Title shown while checking, e.g. `Fragment Checker - 5/20 (25.00%)`.
pub fn format_title(snapshot: ProgressSnapshot) -> String {
    format!(
        "Fragment Checker - {}/{} ({:.2}%)",
        snapshot.processed,
        snapshot.total,
        snapshot.percent()
    )
}

/// Polls a progress tracker once per second and reports it on stderr.
pub struct ProgressTicker {
    stop: Option<oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl ProgressTicker {
    /// Start ticking. The terminal title is only touched when stderr is a
    /// terminal.
    pub fn start(progress: Arc<ProgressTracker>) -> Self {
        let (stop_tx, mut stop_rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            let term = Term::stderr();
            let is_term = term.is_term();
            let mut interval = tokio::time::interval(TICK);

            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = interval.tick() => {
                        let snapshot = progress.snapshot();
                        debug!(
                            processed = snapshot.processed,
                            total = snapshot.total,
                            "progress {:.2}%",
                            snapshot.percent()
                        );
                        if is_term {
                            set_title(&term, &format_title(snapshot));
                        }
                    }
                }
            }

            if is_term {
                set_title(&term, &format_title(progress.snapshot()));
            }
        });

        Self {
            stop: Some(stop_tx),
            handle: Some(handle),
        }
    }

    /// Stop ticking; the title is refreshed one last time.
    pub async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(h) = self.handle.take() {
            let _ = h.await;
        }
    }
}

fn set_title(term: &Term, title: &str) {
    let _ = term.write_str(&format!("\x1b]0;{}\x07", title));
}

// ── Summary ──────────────────────────────────────────────────────────────────

fn styled_label(label: &str, text: String) -> StyledObject<String> {
    match label {
        "free" | "available" => style(text).green(),
        "sold" | "taken" => style(text).red(),
        "request_error" | "parse_error" => style(text).red().bold(),
        _ => style(text).yellow(),
    }
}

/// Non-zero outcome counts, in display order.
pub fn format_counts(summary: &RunSummary) -> Vec<(&'static str, usize)> {
    OUTCOME_LABELS
        .iter()
        .map(|label| (*label, summary.count(label)))
        .filter(|(_, count)| *count > 0)
        .collect()
}

/// Print the end-of-run summary with colored counts.
pub fn print_summary(summary: &RunSummary, output: &str) {
    println!(
        "  {}",
        style("────────────────────────────────────────────────────").dim()
    );
    println!(
        "  {}/{} handle{} checked in {:.2}s",
        style(summary.processed).bold(),
        summary.total,
        if summary.total == 1 { "" } else { "s" },
        summary.elapsed.as_secs_f64(),
    );

    let counts = format_counts(summary);
    if !counts.is_empty() {
        let parts: Vec<String> = counts
            .into_iter()
            .map(|(label, count)| styled_label(label, format!("{} {}", count, label)).to_string())
            .collect();
        println!("  {}", parts.join(&format!("  {}  ", style("|").dim())));
    }

    if summary.write_failures > 0 {
        println!(
            "  {}",
            style(format!(
                "{} line{} could not be written to {}",
                summary.write_failures,
                if summary.write_failures == 1 { "" } else { "s" },
                output
            ))
            .red()
        );
    }

    if summary.cancelled {
        println!(
            "  {}",
            style(format!(
                "Interrupted: {} handle{} not checked, results partially saved to {}",
                summary.skipped(),
                if summary.skipped() == 1 { "" } else { "s" },
                output
            ))
            .yellow()
        );
    } else {
        println!("  Results saved to {}", style(output).bold());
    }
}
