//! Technical compatibility analysis and concat strategy selection.
//!
//! ```text
//!   probe all segments
//!          │
//!          ▼
//!   needs_standardization? ──no──▶ StreamCopy (zero re-encodes)
//!          │ yes
//!          ▼
//!   resolution consistent and
//!   fps variance ≤ minimal limit? ──yes──▶ MinimalReencode (outliers only)
//!          │ no
//!          ▼
//!      Standardize (every deviating segment, bounded by skip rules)
//! ```

use adreel_models::{CompatibilityReport, ConcatStrategy, OutputSpec, SegmentParams, TechnicalParams};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Tunable tolerances for the compatibility decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompatibilityThresholds {
    /// fps spread (max - min) above which segments are considered inconsistent.
    pub fps_variance_tolerance: f64,
    /// fps spread up to which only outliers are re-encoded.
    pub minimal_reencode_fps_variance: f64,
    /// Relative fps distance from the reference that marks an outlier.
    pub fps_outlier_ratio: f64,
    /// Relative fps distance from the output fps that requires standardization.
    pub standardize_fps_ratio: f64,
}

impl Default for CompatibilityThresholds {
    fn default() -> Self {
        Self {
            fps_variance_tolerance: 1.0,
            minimal_reencode_fps_variance: 30.0,
            fps_outlier_ratio: 0.15,
            standardize_fps_ratio: 0.20,
        }
    }
}

impl CompatibilityThresholds {
    pub fn with_fps_variance_tolerance(mut self, value: f64) -> Self {
        self.fps_variance_tolerance = value;
        self
    }

    pub fn with_minimal_reencode_fps_variance(mut self, value: f64) -> Self {
        self.minimal_reencode_fps_variance = value;
        self
    }
}

/// Target a segment is re-encoded towards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReencodeTarget {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

impl From<&OutputSpec> for ReencodeTarget {
    fn from(spec: &OutputSpec) -> Self {
        Self {
            width: spec.width,
            height: spec.height,
            fps: spec.fps as f64,
        }
    }
}

/// Build the compatibility report for probed segments.
pub fn analyze_compatibility(
    segments: Vec<SegmentParams>,
    thresholds: &CompatibilityThresholds,
) -> CompatibilityReport {
    let mut issues = Vec::new();

    let video: Vec<&TechnicalParams> = segments
        .iter()
        .map(|s| &s.params)
        .filter(|p| p.has_video)
        .collect();

    let missing_video = segments.len() - video.len();
    if missing_video > 0 {
        issues.push(format!("{} file(s) without a video stream", missing_video));
    }

    let fps_variance = if video.is_empty() {
        0.0
    } else {
        let max = video.iter().map(|p| p.fps).fold(f64::MIN, f64::max);
        let min = video.iter().map(|p| p.fps).fold(f64::MAX, f64::min);
        max - min
    };

    let resolutions: BTreeSet<(u32, u32)> = video.iter().map(|p| p.resolution()).collect();
    let codecs: BTreeSet<&str> = video.iter().map(|p| p.codec.as_str()).collect();

    let resolution_consistent = resolutions.len() <= 1;
    let codec_consistent = codecs.len() <= 1;

    if fps_variance > thresholds.fps_variance_tolerance {
        issues.push(format!("fps variance {:.2} exceeds {:.2}", fps_variance, thresholds.fps_variance_tolerance));
    }
    if !resolution_consistent {
        let list: Vec<String> = resolutions.iter().map(|(w, h)| format!("{}x{}", w, h)).collect();
        issues.push(format!("mixed resolutions: {}", list.join(", ")));
    }
    if !codec_consistent {
        let list: Vec<&str> = codecs.iter().copied().collect();
        issues.push(format!("mixed codecs: {}", list.join(", ")));
    }

    let needs_standardization = fps_variance > thresholds.fps_variance_tolerance
        || !resolution_consistent
        || !codec_consistent
        || missing_video > 0;

    CompatibilityReport {
        segments,
        fps_variance,
        resolution_consistent,
        codec_consistent,
        needs_standardization,
        issues,
    }
}

/// Pick the concat strategy for a report.
pub fn choose_strategy(report: &CompatibilityReport, thresholds: &CompatibilityThresholds) -> ConcatStrategy {
    if !report.needs_standardization {
        ConcatStrategy::StreamCopy
    } else if report.resolution_consistent
        && report.fps_variance <= thresholds.minimal_reencode_fps_variance
        && report.segments.iter().all(|s| s.params.has_video)
    {
        ConcatStrategy::MinimalReencode
    } else {
        ConcatStrategy::Standardize
    }
}

/// Reference parameters for minimal re-encode: the most common fps among
/// segments (ties go to the value closest to the output fps) at the shared
/// resolution.
pub fn reference_target(report: &CompatibilityReport, output: &OutputSpec) -> ReencodeTarget {
    let mut counts: BTreeMap<i64, (usize, f64)> = BTreeMap::new();
    for p in report.segments.iter().map(|s| &s.params).filter(|p| p.has_video) {
        let key = (p.fps * 100.0).round() as i64;
        let entry = counts.entry(key).or_insert((0, p.fps));
        entry.0 += 1;
    }

    let out_fps = output.fps as f64;
    let fps = counts
        .values()
        .max_by(|a, b| {
            a.0.cmp(&b.0).then_with(|| {
                (b.1 - out_fps)
                    .abs()
                    .partial_cmp(&(a.1 - out_fps).abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
        })
        .map(|(_, fps)| *fps)
        .unwrap_or(out_fps);

    let (width, height) = report
        .segments
        .iter()
        .find(|s| s.params.has_video)
        .map(|s| s.params.resolution())
        .unwrap_or(output.resolution());

    ReencodeTarget { width, height, fps }
}

/// Whether a segment is an outlier under minimal re-encode.
pub fn is_outlier(params: &TechnicalParams, target: &ReencodeTarget, thresholds: &CompatibilityThresholds) -> bool {
    let fps_off = target.fps > 0.0 && (params.fps - target.fps).abs() / target.fps > thresholds.fps_outlier_ratio;
    fps_off || !params.is_h264() || params.resolution() != (target.width, target.height)
}

/// Whether a segment deviates from the output spec under standardization.
pub fn deviates(params: &TechnicalParams, target: &ReencodeTarget, thresholds: &CompatibilityThresholds) -> bool {
    let fps_off =
        target.fps > 0.0 && (params.fps - target.fps).abs() > target.fps * thresholds.standardize_fps_ratio;
    fps_off || params.resolution() != (target.width, target.height) || !params.is_h264()
}
