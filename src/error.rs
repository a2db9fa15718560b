//! Error types shared across the supervisor.
//!
//! Parse errors and unit-construction errors are hard failures raised to
//! the caller; hook and main-process failures during `start()`/`stop()`
//! are contained by design (§7) and surfaced through the `started`/
//! `terminated` events rather than a `Result`, so they have no variant
//! here beyond the ones actually propagated.

use thiserror::Error;

/// A malformed unit file.
#[derive(Debug, Error)]
#[error("{path}:{line}: {message}")]
pub struct ParseError {
    pub path: String,
    pub line: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(path: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        ParseError {
            path: path.into(),
            line,
            message: message.into(),
        }
    }
}

/// Failure to spawn a command (hook or main process): exec lookup failed,
/// permission denied, or an empty argv slipped through config validation.
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("exec failed: {0}")]
    Exec(#[from] std::io::Error),
    #[error("empty command spec")]
    EmptyCommand,
}

/// Rejected at `ProcessUnit` construction time, before anything is spawned.
#[derive(Debug, Error)]
pub enum StartError {
    #[error("ExecStart should only have one entry for a Simple unit")]
    TooManyMainCommands,
    #[error("ExecStart must have at least one entry")]
    EmptyExecStart,
}

/// Kill escalation did not manage to reap the process within the configured
/// timeouts. `stop()` still completes; this is logged, not propagated as a
/// hard failure.
#[derive(Debug, Error)]
#[error("process group {pgid} did not exit after signal and SIGKILL, timeout {timeout_secs}s")]
pub struct KillEscalationExhausted {
    pub pgid: i32,
    pub timeout_secs: u64,
}
