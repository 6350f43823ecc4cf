//! Analyzer tunables.

use adreel_media::FrameSampling;
use serde::{Deserialize, Serialize};

use super::quality::QualityWeights;

/// Prompt and tag language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Zh,
    En,
}

impl std::str::FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "zh" | "zh-cn" | "cn" | "chinese" => Ok(Language::Zh),
            "en" | "english" => Ok(Language::En),
            other => Err(format!("unsupported language: {}", other)),
        }
    }
}

/// Settings for [`super::SegmentAnalyzer`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    pub language: Language,
    pub sampling: FrameSampling,
    /// Frames sent per vision call
    pub max_frames_per_call: usize,

    pub quality_weights: QualityWeights,
    pub quality_threshold: f64,
    pub max_quality_retries: u32,
    pub post_process_bonus: f64,
    /// Distinct tag count at which richness is 1.0
    pub richness_saturation: usize,

    /// Confidence assigned to an accepted visual result
    pub visual_confidence: f64,
    /// Confidence assigned to an audio-only result
    pub audio_confidence: f64,
    pub fusion_confidence_step: f64,
    pub confidence_penalty: f64,

    pub face_area_threshold: f64,
    pub face_sample_frames: usize,
    pub face_closeup_quality_floor: f64,

    pub max_parallel_analyses: usize,
    pub reuse_manifest_tags: bool,

    pub vision_timeout_secs: u64,
    pub transcription_timeout_secs: u64,
    pub chat_timeout_secs: u64,
    pub audio_extract_timeout_secs: u64,
    pub remote_max_retries: u32,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            language: Language::Zh,
            sampling: FrameSampling::default(),
            max_frames_per_call: 10,
            quality_weights: QualityWeights::default(),
            quality_threshold: 0.6,
            max_quality_retries: 2,
            post_process_bonus: 0.05,
            richness_saturation: 8,
            visual_confidence: 0.8,
            audio_confidence: 0.6,
            fusion_confidence_step: 0.05,
            confidence_penalty: 0.2,
            face_area_threshold: 0.3,
            face_sample_frames: 3,
            face_closeup_quality_floor: 0.1,
            max_parallel_analyses: 4,
            reuse_manifest_tags: true,
            vision_timeout_secs: 30,
            transcription_timeout_secs: 60,
            chat_timeout_secs: 30,
            audio_extract_timeout_secs: 30,
            remote_max_retries: 2,
        }
    }
}

impl AnalyzerConfig {
    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    pub fn with_quality_threshold(mut self, threshold: f64) -> Self {
        self.quality_threshold = threshold;
        self
    }

    pub fn with_max_quality_retries(mut self, retries: u32) -> Self {
        self.max_quality_retries = retries;
        self
    }

    pub fn with_max_parallel_analyses(mut self, n: usize) -> Self {
        self.max_parallel_analyses = n.max(1);
        self
    }

    pub fn with_reuse_manifest_tags(mut self, reuse: bool) -> Self {
        self.reuse_manifest_tags = reuse;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_parsing() {
        assert_eq!("ZH".parse::<Language>().unwrap(), Language::Zh);
        assert_eq!("english".parse::<Language>().unwrap(), Language::En);
        assert!("fr".parse::<Language>().is_err());
    }

    #[test]
    fn test_parallelism_floor() {
        let config = AnalyzerConfig::default().with_max_parallel_analyses(0);
        assert_eq!(config.max_parallel_analyses, 1);
    }
}
