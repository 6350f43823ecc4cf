//! Analyzer stages and the predicates that move between them.

use adreel_models::{TagDimension, TagSet};
use std::fmt;

use super::quality::effectively_empty;

/// Stages of a single segment analysis, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisStage {
    VisualPass,
    QualityGate,
    Accept,
    AudioFallback,
    BrandTrigger,
    Fusion,
    AntiHallucination,
    FaceCloseupCheck,
    Done,
}

impl AnalysisStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStage::VisualPass => "visual_pass",
            AnalysisStage::QualityGate => "quality_gate",
            AnalysisStage::Accept => "accept",
            AnalysisStage::AudioFallback => "audio_fallback",
            AnalysisStage::BrandTrigger => "brand_trigger",
            AnalysisStage::Fusion => "fusion",
            AnalysisStage::AntiHallucination => "anti_hallucination",
            AnalysisStage::FaceCloseupCheck => "face_closeup_check",
            AnalysisStage::Done => "done",
        }
    }
}

impl fmt::Display for AnalysisStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the visual result was sent to the audio fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    AllEmpty,
    AllPlaceholder,
    BelowThreshold,
    CoreDimensionsEmpty,
    MostDimensionsEmpty,
}

impl FallbackReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackReason::AllEmpty => "all_empty",
            FallbackReason::AllPlaceholder => "all_placeholder",
            FallbackReason::BelowThreshold => "below_threshold",
            FallbackReason::CoreDimensionsEmpty => "core_dimensions_empty",
            FallbackReason::MostDimensionsEmpty => "most_dimensions_empty",
        }
    }
}

const CORE_DIMENSIONS: [TagDimension; 3] =
    [TagDimension::Object, TagDimension::Brand, TagDimension::Scene];

pub fn all_empty(tags: &TagSet) -> bool {
    tags.is_empty()
}

/// Tags were returned but every one is a placeholder.
pub fn all_placeholder(tags: &TagSet) -> bool {
    !tags.is_empty() && effectively_empty(tags).len() == TagDimension::ALL.len()
}

pub fn below_threshold(score: f64, threshold: f64) -> bool {
    score < threshold
}

/// At least two of object, brand and scene are empty.
pub fn core_dimensions_empty(tags: &TagSet) -> bool {
    let empty = effectively_empty(tags);
    CORE_DIMENSIONS.iter().filter(|d| empty.contains(d)).count() >= 2
}

/// At least three of the four dimensions are empty.
pub fn most_dimensions_empty(tags: &TagSet) -> bool {
    effectively_empty(tags).len() >= 3
}

/// First fallback predicate that holds, if any.
pub fn fallback_reason(tags: &TagSet, score: f64, threshold: f64) -> Option<FallbackReason> {
    if all_empty(tags) {
        Some(FallbackReason::AllEmpty)
    } else if all_placeholder(tags) {
        Some(FallbackReason::AllPlaceholder)
    } else if below_threshold(score, threshold) {
        Some(FallbackReason::BelowThreshold)
    } else if core_dimensions_empty(tags) {
        Some(FallbackReason::CoreDimensionsEmpty)
    } else if most_dimensions_empty(tags) {
        Some(FallbackReason::MostDimensionsEmpty)
    } else {
        None
    }
}

/// Dimensions a targeted fusion pass should fill. Brand has its own pass.
pub fn fusion_dimensions(tags: &TagSet) -> Vec<TagDimension> {
    effectively_empty(tags)
        .into_iter()
        .filter(|d| *d != TagDimension::Brand)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(TagDimension, &str)]) -> TagSet {
        let mut t = TagSet::new();
        for (d, v) in pairs {
            t.push(*d, v);
        }
        t
    }

    #[test]
    fn test_all_empty() {
        assert_eq!(
            fallback_reason(&TagSet::new(), 0.0, 0.6),
            Some(FallbackReason::AllEmpty)
        );
    }

    #[test]
    fn test_all_placeholder() {
        let t = tags(&[(TagDimension::Object, "无"), (TagDimension::Scene, "none")]);
        assert!(all_placeholder(&t));
        assert_eq!(fallback_reason(&t, 0.9, 0.6), Some(FallbackReason::AllPlaceholder));
    }

    #[test]
    fn test_below_threshold() {
        let t = tags(&[
            (TagDimension::Object, "奶瓶"),
            (TagDimension::Scene, "客厅"),
            (TagDimension::Brand, "贝因美"),
        ]);
        assert_eq!(fallback_reason(&t, 0.5, 0.6), Some(FallbackReason::BelowThreshold));
        assert_eq!(fallback_reason(&t, 0.7, 0.6), None);
    }

    #[test]
    fn test_core_dimensions_empty() {
        let t = tags(&[
            (TagDimension::Object, "奶瓶"),
            (TagDimension::Emotion, "开心"),
        ]);
        assert!(core_dimensions_empty(&t));
        assert!(!most_dimensions_empty(&t));
        assert_eq!(
            fallback_reason(&t, 0.9, 0.6),
            Some(FallbackReason::CoreDimensionsEmpty)
        );
    }

    #[test]
    fn test_most_dimensions_empty() {
        let t = tags(&[(TagDimension::Emotion, "开心")]);
        assert!(most_dimensions_empty(&t));
    }

    #[test]
    fn test_fusion_dimensions_skip_brand() {
        let t = tags(&[(TagDimension::Object, "奶瓶"), (TagDimension::Scene, "客厅")]);
        assert_eq!(fusion_dimensions(&t), vec![TagDimension::Emotion]);
    }
}
