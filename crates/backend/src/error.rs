//! Error types for the backend crate.

use thiserror::Error;

/// Result type for backend operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to a text-generation backend.
#[derive(Error, Debug)]
pub enum Error {
    /// The environment variable holding the API key is unset or empty.
    #[error("API key not found in environment variable '{var}'")]
    MissingApiKey { var: String },

    /// Failed to reach the backend.
    #[error("connection failed: {reason}")]
    ConnectionFailed { reason: String },

    /// The backend answered with a non-success status.
    #[error("API returned {status}: {body}")]
    Api { status: u16, body: String },

    /// The backend answered with something we cannot interpret.
    #[error("invalid response: {reason}")]
    InvalidResponse { reason: String },

    /// Streaming error.
    #[error("stream error: {reason}")]
    StreamError { reason: String },

    /// HTTP error from reqwest.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parse error.
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a missing API key error.
    pub fn missing_api_key(var: impl Into<String>) -> Self {
        Self::MissingApiKey { var: var.into() }
    }

    /// Create a connection failed error.
    pub fn connection_failed(reason: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            reason: reason.into(),
        }
    }

    /// Create an API status error.
    pub fn api(status: u16, body: impl Into<String>) -> Self {
        Self::Api {
            status,
            body: body.into(),
        }
    }

    /// Create an invalid response error.
    pub fn invalid_response(reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            reason: reason.into(),
        }
    }

    /// Create a stream error.
    pub fn stream_error(reason: impl Into<String>) -> Self {
        Self::StreamError {
            reason: reason.into(),
        }
    }
}
