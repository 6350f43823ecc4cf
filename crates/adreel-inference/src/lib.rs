//! Remote inference adapters for segment analysis and classification.
//!
//! The pipeline talks to vision, chat and transcription models only through
//! the traits in [`adapter`]. This crate ships reqwest clients for
//! OpenAI-compatible endpoints; the `mocks` feature exports mockall
//! implementations of every trait.

pub mod adapter;
pub mod chat;
pub mod config;
pub mod error;
mod openai;
pub mod transcription;
pub mod vision;

pub use adapter::{ChatAdapter, ObjectStorage, TranscriptionAdapter, VisionAdapter};
#[cfg(any(test, feature = "mocks"))]
pub use adapter::{MockChatAdapter, MockObjectStorage, MockTranscriptionAdapter, MockVisionAdapter};
pub use chat::OpenAiChatClient;
pub use config::{EndpointConfig, InferenceConfig};
pub use error::{InferenceError, InferenceResult};
pub use openai::strip_code_fences;
pub use transcription::OpenAiTranscriptionClient;
pub use vision::OpenAiVisionClient;
