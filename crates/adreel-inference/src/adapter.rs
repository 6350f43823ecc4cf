//! Adapter contracts for remote inference collaborators.
//!
//! The pipeline only depends on these traits. Enable the `mocks` feature to
//! get mockall-generated `Mock*` implementations for tests.

use adreel_models::Transcript;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::error::InferenceResult;

/// Multimodal model that describes a set of frames.
#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait VisionAdapter: Send + Sync {
    /// Send `images` with `prompt` and return the model's free-text reply.
    async fn describe(&self, images: &[PathBuf], prompt: &str) -> InferenceResult<String>;
}

/// Speech-to-text service.
#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait TranscriptionAdapter: Send + Sync {
    async fn transcribe(&self, audio: &Path) -> InferenceResult<Transcript>;
}

/// Text-only chat model.
#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait ChatAdapter: Send + Sync {
    async fn complete(&self, system: &str, prompt: &str) -> InferenceResult<String>;
}

/// Object storage able to hand out time-limited public URLs.
#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn public_url(&self, path: &str, ttl: Duration) -> InferenceResult<Url>;
}
