//! Thread-safe result accumulation with incremental persistence.
//!
//! Every recorded line is appended to the in-memory list and written to the
//! durable destination under the same lock, so the file and the list always
//! agree on completion order. A failed write is logged and counted but never
//! propagated: the check it belongs to still counts as done.

use crate::error::FragmentCheckError;
use crate::types::ResultLine;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::error;

struct SinkInner {
    lines: Vec<ResultLine>,
    writer: Option<Box<dyn Write + Send>>,
}

/// Append-only collection of result lines.
pub struct ResultSink {
    inner: Mutex<SinkInner>,
    path: Option<PathBuf>,
    write_failures: AtomicUsize,
}

impl ResultSink {
    /// Open `path` for appending (creating it if needed).
    ///
    /// The file is opened once here and never truncated. Failing to open it
    /// is fatal for the run, so this must happen before any dispatch.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, FragmentCheckError> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| FragmentCheckError::sink(path.to_string_lossy(), e.to_string()))?;

        Ok(Self {
            inner: Mutex::new(SinkInner {
                lines: Vec::new(),
                writer: Some(Box::new(file)),
            }),
            path: Some(path.to_path_buf()),
            write_failures: AtomicUsize::new(0),
        })
    }

    /// Sink backed by an arbitrary writer.
    pub fn with_writer<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            inner: Mutex::new(SinkInner {
                lines: Vec::new(),
                writer: Some(Box::new(writer)),
            }),
            path: None,
            write_failures: AtomicUsize::new(0),
        }
    }

    /// Sink that only keeps lines in memory.
    pub fn in_memory() -> Self {
        Self {
            inner: Mutex::new(SinkInner {
                lines: Vec::new(),
                writer: None,
            }),
            path: None,
            write_failures: AtomicUsize::new(0),
        }
    }

    /// Record one line: persist it, then keep it in memory.
    ///
    /// The line is written and flushed before this returns. A failed write
    /// is logged and counted in [`write_failures`](Self::write_failures);
    /// the line is still kept in memory and the run goes on.
    pub fn record(&self, line: ResultLine) {
        let mut inner = self.lock();

        if let Some(writer) = inner.writer.as_mut() {
            let written = writeln!(writer, "{}", line).and_then(|_| writer.flush());
            if let Err(e) = written {
                self.write_failures.fetch_add(1, Ordering::Relaxed);
                error!(
                    path = ?self.path,
                    handle = %line.handle,
                    error = %e,
                    "failed to write result line"
                );
            }
        }

        inner.lines.push(line);
    }

    /// Point-in-time copy of every recorded line, in completion order.
    pub fn snapshot(&self) -> Vec<ResultLine> {
        self.lock().lines.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of lines that could not be persisted.
    pub fn write_failures(&self) -> usize {
        self.write_failures.load(Ordering::Relaxed)
    }

    // A panic while holding the lock leaves the list intact, so keep going.
    fn lock(&self) -> MutexGuard<'_, SinkInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for ResultSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultSink")
            .field("path", &self.path)
            .field("lines", &self.len())
            .field("write_failures", &self.write_failures())
            .finish()
    }
}
