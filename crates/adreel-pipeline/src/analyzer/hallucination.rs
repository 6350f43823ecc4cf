//! Anti-hallucination filter for product and container tags.
//!
//! Vision models often report a bottle or formula can in scenes where one is
//! implausible. The filter looks at (recognized brand) × (scene risk tier):
//!
//! |          | high risk        | low/medium risk   |
//! |----------|------------------|-------------------|
//! | no brand | remove the tags  | lower confidence  |
//! | brand    | lower confidence | keep, add a note  |

use adreel_models::{AnalysisResult, TagDimension};

use super::vocabulary::{is_sensitive_object, scene_risk, SceneRisk};

/// What the filter did to a result.
#[derive(Debug, Clone, PartialEq)]
pub enum HallucinationAction {
    Untouched,
    RemovedObjects(Vec<String>),
    ConfidencePenalty,
    PassThrough,
}

/// Apply the filter in place. Brand tags are assumed already allow-listed.
pub fn apply(result: &mut AnalysisResult, confidence_penalty: f64) -> HallucinationAction {
    let sensitive: Vec<String> = result
        .tags
        .object
        .iter()
        .filter(|t| is_sensitive_object(t))
        .cloned()
        .collect();
    if sensitive.is_empty() {
        return HallucinationAction::Untouched;
    }
    let Some(risk) = scene_risk(&result.tags.scene) else {
        return HallucinationAction::Untouched;
    };
    let has_brand = !result.tags.brand.is_empty();

    match (has_brand, risk) {
        (false, SceneRisk::High) => {
            let kept: Vec<String> = result
                .tags
                .object
                .iter()
                .filter(|t| !sensitive.contains(t))
                .cloned()
                .collect();
            result.tags.set(TagDimension::Object, kept);
            result.note(format!(
                "removed implausible objects {:?} in high-risk scene",
                sensitive
            ));
            HallucinationAction::RemovedObjects(sensitive)
        }
        (false, SceneRisk::Low) | (true, SceneRisk::High) => {
            let lowered = result.confidence() - confidence_penalty;
            result.set_confidence(lowered);
            result.note(format!(
                "confidence lowered by {:.2} for {:?} in {:?}-risk scene",
                confidence_penalty, sensitive, risk
            ));
            HallucinationAction::ConfidencePenalty
        }
        (true, SceneRisk::Low) => {
            result.note(format!("kept {:?} with recognized brand", sensitive));
            HallucinationAction::PassThrough
        }
    }
}
