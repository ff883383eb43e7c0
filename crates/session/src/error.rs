//! Error types for the session crate.

use thiserror::Error;

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by memory and usage accounting.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// No pricing entry matches the model name.
    #[error("no pricing entry for model '{model}'")]
    UnknownModel { model: String },

    /// Cost arithmetic left the representable decimal range.
    #[error("cost overflow while pricing model '{model}'")]
    CostOverflow { model: String },

    /// A memory window must hold at least one turn.
    #[error("memory capacity must be at least 1, got {capacity}")]
    InvalidCapacity { capacity: usize },
}

impl Error {
    /// Create an unknown model error.
    pub fn unknown_model(model: impl Into<String>) -> Self {
        Self::UnknownModel {
            model: model.into(),
        }
    }

    /// Create a cost overflow error.
    pub fn cost_overflow(model: impl Into<String>) -> Self {
        Self::CostOverflow {
            model: model.into(),
        }
    }
}
