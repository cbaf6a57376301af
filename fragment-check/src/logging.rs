//! Logging setup: a console layer on stderr and a plain-text file layer.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const DEFAULT_LOG_FILE: &str = "fragment_checker.log";

const DEFAULT_LEVEL: &str = "info,fragment_check=debug,fragment_check_lib=debug";

/// Build the filter: explicit `--log-level` wins, then `RUST_LOG`, then debug.
pub fn build_filter(level: Option<&str>) -> Result<EnvFilter, Box<dyn std::error::Error>> {
    match level {
        Some(level) => EnvFilter::try_new(level)
            .map_err(|e| format!("Invalid log level '{}': {}", level, e).into()),
        None => Ok(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL))),
    }
}

/// Install the global subscriber. The log file is opened for appending.
pub fn init(
    log_file: &Path,
    no_color: bool,
    level: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let filter = build_filter(level)?;

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .map_err(|e| format!("Cannot open log file '{}': {}", log_file.display(), e))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(!no_color)
                .with_target(false)
                .compact(),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(false),
        )
        .try_init()?;

    Ok(())
}
