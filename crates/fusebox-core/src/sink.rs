//! Plain-text diagnostic sinks.
//!
//! A breaker with a sink attached writes one human-readable line per
//! noteworthy occurrence (state transitions, probe recovery, protocol
//! anomalies). A breaker without one writes nothing. This is independent of
//! the `tracing` feature and works without any subscriber installed.

use std::fmt;
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

/// Receives diagnostic lines. Lines carry no trailing newline.
pub trait LogSink: Send + Sync {
    fn write_line(&self, line: &str);
}

/// Shared, type-erased sink.
pub type SharedLogSink = Arc<dyn LogSink>;

impl<S: LogSink + ?Sized> LogSink for Arc<S> {
    fn write_line(&self, line: &str) {
        (**self).write_line(line)
    }
}

/// Adapts any [`std::io::Write`] into a sink, one line per write.
///
/// Write errors are discarded; diagnostics must never fail a call.
pub struct WriterSink<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Returns the wrapped writer.
    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send> LogSink for WriterSink<W> {
    fn write_line(&self, line: &str) {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = writeln!(writer, "{line}");
    }
}

impl<W> fmt::Debug for WriterSink<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriterSink").finish_non_exhaustive()
    }
}

/// A sink backed by a closure.
pub struct FnSink<F>(F);

impl<F> FnSink<F>
where
    F: Fn(&str) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> LogSink for FnSink<F>
where
    F: Fn(&str) + Send + Sync,
{
    fn write_line(&self, line: &str) {
        (self.0)(line)
    }
}

/// Collects lines in memory. Handy for asserting on diagnostics.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every line written so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl LogSink for MemorySink {
    fn write_line(&self, line: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_owned());
    }
}
