//! Inference adapter error types.

use thiserror::Error;

/// Result type for inference calls.
pub type InferenceResult<T> = Result<T, InferenceError>;

/// Errors returned by remote inference adapters.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    #[error("Empty response from {0}")]
    EmptyResponse(String),

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl InferenceError {
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Check if error is retryable.
    ///
    /// Connection failures, timeouts, 429 and 5xx are retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            InferenceError::Http(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            InferenceError::Status { status, .. } => *status == 429 || *status >= 500,
            InferenceError::Timeout(_) => true,
            _ => false,
        }
    }
}
