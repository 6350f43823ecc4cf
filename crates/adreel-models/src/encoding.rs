//! Output and re-encode settings.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default video codec (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Default audio codec
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
/// Default encoding preset
pub const DEFAULT_PRESET: &str = "fast";
/// Default CRF (Constant Rate Factor)
pub const DEFAULT_CRF: u8 = 18;
/// Default audio bitrate
pub const DEFAULT_AUDIO_BITRATE: &str = "128k";

/// Default vertical output resolution
pub const DEFAULT_OUTPUT_WIDTH: u32 = 1080;
pub const DEFAULT_OUTPUT_HEIGHT: u32 = 1920;
/// Default output frame rate
pub const DEFAULT_OUTPUT_FPS: u32 = 30;
/// Default output video bitrate
pub const DEFAULT_VIDEO_BITRATE: &str = "2M";

/// Video encoding configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EncodingConfig {
    /// Video codec (e.g., "libx264")
    #[serde(default = "default_video_codec")]
    pub codec: String,

    /// Encoding preset (e.g., "ultrafast", "fast", "slow")
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Constant Rate Factor (quality, 0-51, lower is better)
    #[serde(default = "default_crf")]
    pub crf: u8,

    /// Audio codec
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// Audio bitrate
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,

    /// Peak video bitrate for capped CRF (e.g. "2M")
    #[serde(default)]
    pub max_bitrate: Option<String>,
}

fn default_video_codec() -> String {
    DEFAULT_VIDEO_CODEC.to_string()
}
fn default_preset() -> String {
    DEFAULT_PRESET.to_string()
}
fn default_crf() -> u8 {
    DEFAULT_CRF
}
fn default_audio_codec() -> String {
    DEFAULT_AUDIO_CODEC.to_string()
}
fn default_audio_bitrate() -> String {
    DEFAULT_AUDIO_BITRATE.to_string()
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            codec: DEFAULT_VIDEO_CODEC.to_string(),
            preset: DEFAULT_PRESET.to_string(),
            crf: DEFAULT_CRF,
            audio_codec: DEFAULT_AUDIO_CODEC.to_string(),
            audio_bitrate: DEFAULT_AUDIO_BITRATE.to_string(),
            max_bitrate: None,
        }
    }
}

impl EncodingConfig {
    /// Fast, lossy settings for bulk standardization.
    pub fn for_standardize() -> Self {
        Self {
            preset: "ultrafast".to_string(),
            crf: 28,
            audio_bitrate: "96k".to_string(),
            ..Default::default()
        }
    }

    /// Settings for looping video under a longer reference track.
    pub fn for_loop_fill() -> Self {
        Self {
            crf: 23,
            ..Default::default()
        }
    }

    /// Video codec arguments only.
    pub fn video_args(&self) -> Vec<String> {
        let mut args = vec![
            "-c:v".to_string(),
            self.codec.clone(),
            "-preset".to_string(),
            self.preset.clone(),
            "-crf".to_string(),
            self.crf.to_string(),
        ];
        if let Some(rate) = &self.max_bitrate {
            args.extend(["-maxrate".to_string(), rate.clone(), "-bufsize".to_string(), rate.clone()]);
        }
        args
    }

    pub fn with_max_bitrate(mut self, rate: impl Into<String>) -> Self {
        self.max_bitrate = Some(rate.into());
        self
    }

    /// Audio codec arguments only.
    pub fn audio_args(&self) -> Vec<String> {
        vec![
            "-c:a".to_string(),
            self.audio_codec.clone(),
            "-b:a".to_string(),
            self.audio_bitrate.clone(),
        ]
    }

    /// Full codec argument list.
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        let mut args = self.video_args();
        args.extend(self.audio_args());
        args
    }
}

/// Target technical parameters of the assembled video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OutputSpec {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_video_bitrate")]
    pub video_bitrate: String,
    /// Encoder settings for outlier re-encodes
    #[serde(default)]
    pub encoding: EncodingConfig,
}

fn default_width() -> u32 {
    DEFAULT_OUTPUT_WIDTH
}
fn default_height() -> u32 {
    DEFAULT_OUTPUT_HEIGHT
}
fn default_fps() -> u32 {
    DEFAULT_OUTPUT_FPS
}
fn default_video_bitrate() -> String {
    DEFAULT_VIDEO_BITRATE.to_string()
}

impl Default for OutputSpec {
    fn default() -> Self {
        Self {
            width: DEFAULT_OUTPUT_WIDTH,
            height: DEFAULT_OUTPUT_HEIGHT,
            fps: DEFAULT_OUTPUT_FPS,
            video_bitrate: DEFAULT_VIDEO_BITRATE.to_string(),
            encoding: EncodingConfig::default(),
        }
    }
}

impl OutputSpec {
    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    pub fn with_video_bitrate(mut self, bitrate: impl Into<String>) -> Self {
        self.video_bitrate = bitrate.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standardize_profile_trades_quality_for_speed() {
        let fast = EncodingConfig::for_standardize();
        let careful = EncodingConfig::default();
        assert!(fast.crf > careful.crf);
        assert_eq!(fast.video_args()[3], "ultrafast");
        assert_eq!(fast.audio_args(), vec!["-c:a", "aac", "-b:a", "96k"]);

        let capped = fast.with_max_bitrate("2M").video_args();
        assert_eq!(&capped[6..], ["-maxrate", "2M", "-bufsize", "2M"]);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: EncodingConfig = serde_json::from_str(r#"{"crf": 23}"#).unwrap();
        assert_eq!(config.crf, 23);
        assert_eq!(config.codec, DEFAULT_VIDEO_CODEC);
        assert_eq!(config.preset, DEFAULT_PRESET);
    }

    #[test]
    fn test_output_spec_defaults_from_empty_json() {
        let spec: OutputSpec = serde_json::from_str("{}").unwrap();
        assert_eq!(spec.resolution(), (1080, 1920));
        assert_eq!(spec.fps, 30);
        assert_eq!(spec.video_bitrate, "2M");
        assert_eq!(
            spec.encoding.to_ffmpeg_args(),
            vec!["-c:v", "libx264", "-preset", "fast", "-crf", "18", "-c:a", "aac", "-b:a", "128k"]
        );
    }
}
