//! Classified segments and the audit record of how they were classified.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::analysis::AnalysisResult;
use crate::module::Module;
use crate::segment::Segment;

/// Why a segment ended up in its module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ClassificationDecision {
    /// A keyword rule cleared its threshold.
    RuleMatch {
        matched_keywords: Vec<String>,
        score: f64,
        rule_priority: u32,
    },
    /// No rule matched; the AI reply decided.
    AiFallback { raw_reply: String },
    /// A global exclusion keyword matched.
    Excluded { keyword: String },
    /// No rule matched and no AI decision was available.
    NoMatch,
}

impl ClassificationDecision {
    pub fn source_str(&self) -> &'static str {
        match self {
            ClassificationDecision::RuleMatch { .. } => "rule",
            ClassificationDecision::AiFallback { .. } => "ai",
            ClassificationDecision::Excluded { .. } => "excluded",
            ClassificationDecision::NoMatch => "no_match",
        }
    }
}

/// Segment with its analysis and assigned module.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClassifiedSegment {
    pub segment: Segment,
    pub analysis: AnalysisResult,
    pub module: Module,
    pub decision: ClassificationDecision,
}

impl ClassifiedSegment {
    pub fn id(&self) -> &str {
        &self.segment.id
    }

    pub fn duration(&self) -> f64 {
        self.segment.duration
    }

    pub fn quality_score(&self) -> f64 {
        self.analysis.quality_score()
    }

    pub fn combined_quality(&self) -> f64 {
        self.analysis.combined_quality()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_serialization() {
        let decision = ClassificationDecision::AiFallback {
            raw_reply: "促销机制".to_string(),
        };
        let json = serde_json::to_value(&decision).unwrap();
        assert_eq!(json["source"], "ai_fallback");
        assert_eq!(decision.source_str(), "ai");
    }
}
