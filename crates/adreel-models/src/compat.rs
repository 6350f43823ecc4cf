//! Technical compatibility findings for a set of segments.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::segment::TechnicalParams;

/// Probed parameters of one segment file.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SegmentParams {
    pub path: PathBuf,
    pub params: TechnicalParams,
}

/// Compatibility across all selected segments.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CompatibilityReport {
    pub segments: Vec<SegmentParams>,
    /// `max(fps) - min(fps)`
    pub fps_variance: f64,
    pub resolution_consistent: bool,
    pub codec_consistent: bool,
    pub needs_standardization: bool,
    #[serde(default)]
    pub issues: Vec<String>,
}

/// How the segments are joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConcatStrategy {
    /// Lossless concat, no re-encode.
    StreamCopy,
    /// Re-encode only the outlier segments.
    MinimalReencode,
    /// Re-encode every deviating segment to the output spec.
    Standardize,
}

impl ConcatStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConcatStrategy::StreamCopy => "stream_copy",
            ConcatStrategy::MinimalReencode => "minimal_reencode",
            ConcatStrategy::Standardize => "standardize",
        }
    }
}

/// What happened to one segment during preparation for concat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PreparedAction {
    /// Used as is.
    Copied,
    /// Re-encoded successfully.
    Reencoded,
    /// Standardization skipped, original used.
    Skipped { reason: String },
    /// Re-encode failed or timed out, original used.
    FailedKeptOriginal { reason: String },
}

/// Outcome of preparing one segment.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StandardizationOutcome {
    pub source: PathBuf,
    pub used: PathBuf,
    #[serde(flatten)]
    pub action: PreparedAction,
}

impl StandardizationOutcome {
    pub fn was_reencoded(&self) -> bool {
        matches!(self.action, PreparedAction::Reencoded)
    }
}
