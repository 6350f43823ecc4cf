//! Composition report written next to the assembled video.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::compat::{CompatibilityReport, ConcatStrategy, StandardizationOutcome};
use crate::module::Module;
use crate::selection::{ModulePlan, SelectionPlan};

/// File that was excluded from composition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct InvalidFile {
    pub path: PathBuf,
    pub reason: String,
}

impl InvalidFile {
    pub fn new(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Per-module section of the report.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ModuleBreakdown {
    pub module: Module,
    pub module_name: String,
    pub target_duration: f64,
    pub actual_duration: f64,
    pub coverage_ratio: f64,
    pub segment_count: usize,
    pub available_segments: usize,
    pub avg_quality: f64,
    pub selected_ids: Vec<String>,
    /// Ids whose duration was an injected default
    #[serde(default)]
    pub default_duration_ids: Vec<String>,
}

impl From<&ModulePlan> for ModuleBreakdown {
    fn from(plan: &ModulePlan) -> Self {
        Self {
            module: plan.module,
            module_name: plan.module.canonical_name().to_string(),
            target_duration: plan.target_duration,
            actual_duration: plan.actual_duration,
            coverage_ratio: plan.coverage_ratio,
            segment_count: plan.segment_count(),
            available_segments: plan.available_segments,
            avg_quality: plan.avg_quality,
            selected_ids: plan.selected_ids(),
            default_duration_ids: plan
                .selected
                .iter()
                .filter(|s| s.is_default_duration)
                .map(|s| s.id().to_string())
                .collect(),
        }
    }
}

/// Headline numbers.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CompositionSummary {
    pub total_target_duration: f64,
    pub total_actual_duration: f64,
    pub segment_count: usize,
    pub module_count: usize,
    pub output_duration: Option<f64>,
}

/// Technical section of the report.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TechnicalDetails {
    pub strategy: ConcatStrategy,
    pub compatibility: CompatibilityReport,
    pub prepared: Vec<StandardizationOutcome>,
    pub reencoded_count: usize,
}

/// How the reference audio was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AudioSyncMode {
    /// Durations match, audio substituted.
    Direct,
    /// Video looped to cover the audio.
    LoopVideo,
    /// Video cut to the audio duration.
    TruncateVideo,
}

/// Benchmark-audio section of the report.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BenchmarkAudioOutcome {
    pub audio_path: PathBuf,
    pub mode: AudioSyncMode,
    pub video_duration: f64,
    pub audio_duration: f64,
    pub output_duration: Option<f64>,
    /// Output duration drifted from the reference by more than the tolerance
    pub drift_warning: bool,
}

/// Full report for one composition run.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CompositionReport {
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    pub output_path: PathBuf,
    pub summary: CompositionSummary,
    pub module_breakdown: Vec<ModuleBreakdown>,
    pub technical_details: Option<TechnicalDetails>,
    pub invalid_files: Vec<InvalidFile>,
    pub benchmark_audio: Option<BenchmarkAudioOutcome>,
    #[serde(default)]
    pub error: Option<String>,
}

impl CompositionReport {
    /// Start a report from a selection plan.
    pub fn from_plan(run_id: Uuid, output_path: impl Into<PathBuf>, plan: &SelectionPlan) -> Self {
        Self {
            run_id,
            timestamp: Utc::now(),
            success: false,
            output_path: output_path.into(),
            summary: CompositionSummary {
                total_target_duration: plan.total_target(),
                total_actual_duration: plan.total_actual(),
                segment_count: plan.segment_count(),
                module_count: plan.modules.iter().filter(|m| m.segment_count() > 0).count(),
                output_duration: None,
            },
            module_breakdown: plan.modules.iter().map(ModuleBreakdown::from).collect(),
            technical_details: None,
            invalid_files: Vec::new(),
            benchmark_audio: None,
            error: None,
        }
    }
}
