//! Logging sink for stdio pump output and lifecycle events.
//!
//! Mirrors the `tracing::{info, warn, error}` calls scattered through the
//! reference supervisor and session code, pulled behind a trait so tests can
//! assert on emitted records instead of scraping a subscriber.

/// The stream a log line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
    /// Lifecycle events synthesized by the supervisor itself, not a child's
    /// own output.
    System,
}

/// Severity, matching the `tracing` levels the reference implementation uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone)]
pub struct Record {
    pub tag: String,
    pub stream: Stream,
    pub level: Level,
    pub text: String,
}

pub trait LogSink: Send + Sync {
    fn emit(&self, record: Record);
}

/// Default sink: forwards everything to `tracing`.
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, record: Record) {
        let Record {
            tag, stream, level, text,
        } = record;
        let stream_tag = match stream {
            Stream::Stdout => "stdout",
            Stream::Stderr => "stderr",
            Stream::System => "system",
        };
        match level {
            Level::Debug => tracing::debug!(unit = %tag, stream = stream_tag, "{text}"),
            Level::Info => tracing::info!(unit = %tag, stream = stream_tag, "{text}"),
            Level::Warn => tracing::warn!(unit = %tag, stream = stream_tag, "{text}"),
            Level::Error => tracing::error!(unit = %tag, stream = stream_tag, "{text}"),
        }
    }
}

/// Sink that discards everything. Useful when embedding the supervisor as a
/// library without a `tracing` subscriber installed.
pub struct NullSink;

impl LogSink for NullSink {
    fn emit(&self, _record: Record) {}
}

/// Test-only sink that accumulates records for assertions.
#[cfg(test)]
pub struct RecordingSink {
    records: std::sync::Mutex<Vec<Record>>,
}

#[cfg(test)]
impl RecordingSink {
    pub fn new() -> Self {
        RecordingSink {
            records: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn records(&self) -> Vec<Record> {
        self.records.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl LogSink for RecordingSink {
    fn emit(&self, record: Record) {
        self.records.lock().unwrap().push(record);
    }
}
