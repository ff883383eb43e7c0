//! Error type for the Boardroom facade.

use thiserror::Error;

/// Result type for Boardroom operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the facade. Each layer keeps its own error type and
/// converts into this one at the boundary.
#[derive(Error, Debug)]
pub enum Error {
    /// Orchestration failed (join failure, exhausted retries, bad wiring).
    #[error(transparent)]
    Orchestrator(#[from] boardroom_orchestrator::Error),

    /// Memory or usage accounting failed.
    #[error(transparent)]
    Session(#[from] boardroom_session::Error),

    /// The text-generation backend failed outside a retried invocation.
    #[error(transparent)]
    Backend(#[from] boardroom_backend::Error),

    /// Core error.
    #[error(transparent)]
    Core(#[from] boardroom_core::Error),
}
