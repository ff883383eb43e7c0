//! Error types for the orchestrator crate.

use std::fmt;
use std::time::Duration;

use itertools::Itertools;
use thiserror::Error;

/// Result type for orchestrator operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure reported by a single worker attempt.
///
/// Every variant is recoverable by retry; validation gate rejections are
/// treated the same as any other failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkerError {
    #[error("missing input '{key}'")]
    MissingInput { key: String },

    #[error("{gate} rejected the call: {reason}")]
    GateRejected { gate: String, reason: String },

    #[error("{reason}")]
    Failed { reason: String },
}

impl WorkerError {
    /// Create a missing input error.
    pub fn missing_input(key: impl Into<String>) -> Self {
        Self::MissingInput { key: key.into() }
    }

    /// Create a validation gate rejection.
    pub fn gate_rejected(gate: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::GateRejected {
            gate: gate.into(),
            reason: reason.into(),
        }
    }

    /// Create a generic failure.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }
}

/// Why one attempt did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttemptFailure {
    #[error("{0}")]
    Failed(WorkerError),

    #[error("timed out after {}ms", .timeout.as_millis())]
    TimedOut { timeout: Duration },
}

/// A worker that settled without a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerFailure {
    pub worker: String,
    pub reason: String,
}

impl fmt::Display for WorkerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.worker, self.reason)
    }
}

/// Errors that can occur while configuring or running an orchestration.
#[derive(Debug, Error)]
pub enum Error {
    /// An orchestrator needs at least one worker.
    #[error("orchestrator '{name}' has no workers")]
    NoWorkers { name: String },

    /// Two or more workers declared the same output key.
    #[error("duplicate output keys: {}", .keys.join(", "))]
    DuplicateOutputKeys { keys: Vec<String> },

    /// A worker spec is incomplete.
    #[error("invalid worker spec '{name}': {reason}")]
    InvalidWorkerSpec { name: String, reason: String },

    /// The seed scope already holds a key a worker is declared to write.
    #[error("seed scope already contains declared output keys: {}", .keys.join(", "))]
    SeedKeyConflict { keys: Vec<String> },

    /// All attempts failed and no fallback was configured.
    #[error("worker '{worker}' failed after {attempts} attempt(s): {last_error}")]
    Exhausted {
        worker: String,
        attempts: u32,
        last_error: AttemptFailure,
    },

    /// At least one worker produced no value; the reducer did not run.
    #[error(
        "join failed, {} worker(s) produced no value: {}",
        .failures.len(),
        .failures.iter().join("; ")
    )]
    JoinFailed { failures: Vec<WorkerFailure> },

    /// A scope key required by a reader is absent or not text.
    #[error("scope key '{key}' is missing or not text")]
    MissingScopeKey { key: String },

    /// A chunk stream failed after delivering some chunks.
    #[error("stream '{name}' interrupted after {delivered} chunk(s): {reason}")]
    StreamInterrupted {
        name: String,
        delivered: usize,
        reason: String,
    },

    /// Core error.
    #[error("core error: {0}")]
    Core(#[from] boardroom_core::Error),
}

impl Error {
    /// Create a no workers error.
    pub fn no_workers(name: impl Into<String>) -> Self {
        Self::NoWorkers { name: name.into() }
    }

    /// Create an invalid worker spec error.
    pub fn invalid_worker_spec(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidWorkerSpec {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create an exhausted error.
    pub fn exhausted(worker: impl Into<String>, attempts: u32, last_error: AttemptFailure) -> Self {
        Self::Exhausted {
            worker: worker.into(),
            attempts,
            last_error,
        }
    }

    /// Create a missing scope key error.
    pub fn missing_scope_key(key: impl Into<String>) -> Self {
        Self::MissingScopeKey { key: key.into() }
    }

    /// Create a stream interrupted error.
    pub fn stream_interrupted(
        name: impl Into<String>,
        delivered: usize,
        reason: impl Into<String>,
    ) -> Self {
        Self::StreamInterrupted {
            name: name.into(),
            delivered,
            reason: reason.into(),
        }
    }

    /// Names of the workers that failed terminally, if this is a join failure.
    #[must_use]
    pub fn failed_workers(&self) -> Vec<&str> {
        match self {
            Self::JoinFailed { failures } => failures.iter().map(|f| f.worker.as_str()).collect(),
            Self::Exhausted { worker, .. } => vec![worker.as_str()],
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_failed_lists_every_worker() {
        let err = Error::JoinFailed {
            failures: vec![
                WorkerFailure {
                    worker: "cfo".to_string(),
                    reason: "boom".to_string(),
                },
                WorkerFailure {
                    worker: "cto".to_string(),
                    reason: "timed out".to_string(),
                },
            ],
        };
        let text = err.to_string();
        assert!(text.contains("2 worker(s)"));
        assert!(text.contains("cfo (boom)"));
        assert!(text.contains("cto (timed out)"));
        assert_eq!(err.failed_workers(), vec!["cfo", "cto"]);
    }

    #[test]
    fn test_timeout_display() {
        let failure = AttemptFailure::TimedOut {
            timeout: Duration::from_millis(250),
        };
        assert_eq!(failure.to_string(), "timed out after 250ms");
    }

    #[test]
    fn test_duplicate_keys_display() {
        let err = Error::DuplicateOutputKeys {
            keys: vec!["cfoInput".to_string()],
        };
        assert_eq!(err.to_string(), "duplicate output keys: cfoInput");
    }
}
