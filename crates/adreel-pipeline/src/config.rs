//! Pipeline configuration.

use adreel_media::{BenchmarkAudioConfig, CompatibilityThresholds, StandardizeConfig};

use crate::analyzer::{AnalyzerConfig, Language};
use crate::manifest::ManifestLoaderConfig;
use crate::selector::SelectorConfig;

/// Tunables for every pipeline stage.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub analyzer: AnalyzerConfig,
    pub selector: SelectorConfig,
    pub loader: ManifestLoaderConfig,
    pub thresholds: CompatibilityThresholds,
    pub standardize: StandardizeConfig,
    pub benchmark_audio: BenchmarkAudioConfig,
}

impl PipelineConfig {
    /// Create config from `ADREEL_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source; unset or unparseable values keep their defaults.
    pub fn from_lookup<F>(var: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let mut analyzer = defaults.analyzer;
        let mut selector = defaults.selector;
        let mut loader = defaults.loader;
        let mut thresholds = defaults.thresholds;
        let mut standardize = defaults.standardize;
        let mut benchmark_audio = defaults.benchmark_audio;

        analyzer.language = var("ADREEL_LANGUAGE")
            .and_then(|s| s.parse::<Language>().ok())
            .unwrap_or(analyzer.language);
        analyzer.quality_threshold = var("ADREEL_QUALITY_THRESHOLD")
            .and_then(|s| s.parse().ok())
            .unwrap_or(analyzer.quality_threshold);
        analyzer.max_quality_retries = var("ADREEL_MAX_QUALITY_RETRIES")
            .and_then(|s| s.parse().ok())
            .unwrap_or(analyzer.max_quality_retries);
        analyzer.max_parallel_analyses = var("ADREEL_MAX_PARALLEL_ANALYSES")
            .and_then(|s| s.parse::<usize>().ok())
            .map(|n| n.max(1))
            .unwrap_or(analyzer.max_parallel_analyses);
        analyzer.remote_max_retries = var("ADREEL_REMOTE_MAX_RETRIES")
            .and_then(|s| s.parse().ok())
            .unwrap_or(analyzer.remote_max_retries);
        analyzer.face_area_threshold = var("ADREEL_FACE_AREA_THRESHOLD")
            .and_then(|s| s.parse().ok())
            .unwrap_or(analyzer.face_area_threshold);

        selector.overshoot_tolerance = var("ADREEL_OVERSHOOT_TOLERANCE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(selector.overshoot_tolerance);
        selector.default_segment_duration = var("ADREEL_DEFAULT_SEGMENT_DURATION")
            .and_then(|s| s.parse().ok())
            .unwrap_or(selector.default_segment_duration);

        loader.max_segment_duration = var("ADREEL_MAX_SEGMENT_DURATION")
            .and_then(|s| s.parse().ok())
            .unwrap_or(loader.max_segment_duration);

        thresholds.fps_variance_tolerance = var("ADREEL_FPS_VARIANCE_TOLERANCE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(thresholds.fps_variance_tolerance);

        standardize.timeout_secs = var("ADREEL_STANDARDIZE_TIMEOUT_SECS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(standardize.timeout_secs);
        standardize.max_duration = var("ADREEL_STANDARDIZE_MAX_DURATION")
            .and_then(|s| s.parse().ok())
            .unwrap_or(standardize.max_duration);

        benchmark_audio.sync_tolerance_secs = var("ADREEL_AUDIO_SYNC_TOLERANCE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(benchmark_audio.sync_tolerance_secs);

        Self {
            analyzer,
            selector,
            loader,
            thresholds,
            standardize,
            benchmark_audio,
        }
    }
}
