//! Segment and technical parameter types.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Technical parameters of a segment file, as reported by ffprobe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TechnicalParams {
    /// Frame rate (fps)
    pub fps: f64,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Video codec name (e.g. "h264")
    pub codec: String,
    /// Whether an audio stream is present
    pub has_audio: bool,
    /// Whether a video stream is present
    #[serde(default = "default_true")]
    pub has_video: bool,
    /// Duration in seconds
    #[serde(default)]
    pub duration: f64,
}

fn default_true() -> bool {
    true
}

impl TechnicalParams {
    /// Resolution as `(width, height)`.
    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Whether the video stream is H.264.
    pub fn is_h264(&self) -> bool {
        matches!(self.codec.as_str(), "h264" | "avc" | "avc1")
    }
}

/// A short pre-cut clip from the upstream pool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Segment {
    /// Unique id, `"{video_id}_{file_name}"`
    pub id: String,
    /// Source video id from the manifest
    pub source_video_id: String,
    /// Absolute path to the segment file
    pub file_path: PathBuf,
    /// Duration in seconds (0.0 if unknown)
    pub duration: f64,
    /// Probed technical parameters
    #[serde(default)]
    pub technical_params: Option<TechnicalParams>,
    /// Upstream transcription text, if any
    #[serde(default)]
    pub transcription: Option<String>,
}

impl Segment {
    /// Create a segment id from a source video id and a file name.
    pub fn make_id(video_id: &str, file_name: &str) -> String {
        format!("{}_{}", video_id, file_name)
    }

    /// File name component of the segment path.
    pub fn file_name(&self) -> String {
        self.file_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_id() {
        assert_eq!(Segment::make_id("vid01", "scene_003.mp4"), "vid01_scene_003.mp4");
    }

    #[test]
    fn test_is_h264() {
        let mut params = TechnicalParams {
            fps: 30.0,
            width: 1080,
            height: 1920,
            codec: "h264".to_string(),
            has_audio: true,
            has_video: true,
            duration: 3.0,
        };
        assert!(params.is_h264());
        params.codec = "hevc".to_string();
        assert!(!params.is_h264());
    }

    #[test]
    fn test_params_defaults_when_missing() {
        let json = r#"{"fps":25.0,"width":720,"height":1280,"codec":"h264","has_audio":false}"#;
        let params: TechnicalParams = serde_json::from_str(json).unwrap();
        assert!(params.has_video);
        assert_eq!(params.duration, 0.0);
    }
}
