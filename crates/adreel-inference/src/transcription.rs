//! Speech-to-text client for OpenAI-compatible `/audio/transcriptions`.

use adreel_models::{Transcript, TranscriptSegment};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

use crate::adapter::TranscriptionAdapter;
use crate::config::EndpointConfig;
use crate::error::{InferenceError, InferenceResult};
use crate::openai::{authorize, http_client, send_checked};

/// `verbose_json` transcription response.
#[derive(Debug, Deserialize)]
struct VerboseTranscription {
    #[serde(default)]
    text: String,
    #[serde(default)]
    segments: Option<Vec<VerboseSegment>>,
}

#[derive(Debug, Deserialize)]
struct VerboseSegment {
    start: f64,
    end: f64,
    #[serde(default)]
    text: String,
}

impl From<VerboseTranscription> for Transcript {
    fn from(v: VerboseTranscription) -> Self {
        let segments = v
            .segments
            .unwrap_or_default()
            .into_iter()
            .map(|s| TranscriptSegment {
                text: s.text.trim().to_string(),
                start_ms: (s.start.max(0.0) * 1000.0).round() as u64,
                end_ms: (s.end.max(0.0) * 1000.0).round() as u64,
            })
            .collect();
        Transcript {
            success: true,
            text: v.text.trim().to_string(),
            segments,
        }
    }
}

/// Transcription client using multipart upload.
pub struct OpenAiTranscriptionClient {
    endpoint: EndpointConfig,
    client: Client,
    language: Option<String>,
}

impl OpenAiTranscriptionClient {
    pub fn new(endpoint: EndpointConfig) -> InferenceResult<Self> {
        if !endpoint.is_configured() {
            return Err(InferenceError::config("transcription API key not set"));
        }
        Ok(Self {
            client: http_client(endpoint.timeout)?,
            endpoint,
            language: None,
        })
    }

    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.language = language;
        self
    }
}

#[async_trait]
impl TranscriptionAdapter for OpenAiTranscriptionClient {
    async fn transcribe(&self, audio: &Path) -> InferenceResult<Transcript> {
        let bytes = tokio::fs::read(audio).await?;
        let file_name = audio
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "audio.wav".to_string());

        debug!(model = %self.endpoint.model, bytes = bytes.len(), "Calling transcription");

        let file = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("audio/wav")?;
        let mut form = Form::new()
            .part("file", file)
            .text("model", self.endpoint.model.clone())
            .text("response_format", "verbose_json");
        if let Some(language) = &self.language {
            form = form.text("language", language.clone());
        }

        let request = authorize(
            self.client.post(self.endpoint.url("audio/transcriptions")),
            &self.endpoint,
        )
        .multipart(form);
        let response = send_checked(request).await?;
        let parsed: VerboseTranscription = response
            .json()
            .await
            .map_err(|e| InferenceError::parse(format!("transcription response: {}", e)))?;

        Ok(parsed.into())
    }
}
