//! Transcription results.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Transcript has no timed segments.
#[derive(Debug, Error)]
#[error("Transcript has no segment timestamps")]
pub struct MissingTimestamps;

/// One timed piece of a transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TranscriptSegment {
    pub text: String,
    pub start_ms: u64,
    pub end_ms: u64,
}

impl TranscriptSegment {
    pub fn duration_secs(&self) -> f64 {
        self.end_ms.saturating_sub(self.start_ms) as f64 / 1000.0
    }
}

/// Transcription adapter output.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Transcript {
    pub success: bool,
    pub text: String,
    #[serde(default)]
    pub segments: Vec<TranscriptSegment>,
}

impl Transcript {
    pub fn has_text(&self) -> bool {
        self.success && !self.text.trim().is_empty()
    }

    /// Timed segments, or an error when none were returned.
    pub fn require_timestamps(&self) -> Result<&[TranscriptSegment], MissingTimestamps> {
        if self.segments.is_empty() {
            Err(MissingTimestamps)
        } else {
            Ok(&self.segments)
        }
    }
}
