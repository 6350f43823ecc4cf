//! Pipeline error types.

use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Invalid rules, ratios or settings. Fatal at construction.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A single input failed validation; the caller skips it.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Nothing could be composed.
    #[error("Composition failed: {message} ({valid} valid, {invalid} invalid)")]
    Composition {
        message: String,
        valid: usize,
        invalid: usize,
    },

    #[error("Media error: {0}")]
    Media(#[from] adreel_media::MediaError),

    #[error("Inference error: {0}")]
    Inference(#[from] adreel_inference::InferenceError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn composition(msg: impl Into<String>, valid: usize, invalid: usize) -> Self {
        Self::Composition {
            message: msg.into(),
            valid,
            invalid,
        }
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::Inference(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Errors that end the whole run rather than one segment.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::Configuration(_) | PipelineError::Composition { .. }
        )
    }
}

impl From<adreel_models::RuleError> for PipelineError {
    fn from(e: adreel_models::RuleError) -> Self {
        Self::Configuration(e.to_string())
    }
}
