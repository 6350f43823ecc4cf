//! Declarative classification rules.
//!
//! Rule sets are authored externally (JSON) and are read-only to the
//! pipeline. Field-level bounds are checked with `validator`; structural
//! checks that span several rules live in [`RuleSet::check`].

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use validator::{Validate, ValidationError};

use crate::module::Module;

/// Default per-module segment cap.
pub const DEFAULT_MAX_SEGMENTS_PER_MODULE: usize = 3;
/// Default module ratios in [`Module::ORDERED`] order.
pub const DEFAULT_MODULE_RATIOS: [f64; 4] = [25.0, 28.0, 32.0, 15.0];

/// Rule set configuration problem.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("Invalid rule set: {0}")]
    Invalid(String),

    #[error("Rule validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// A keyword with a match weight.
///
/// Plain strings in JSON deserialize with weight `1.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum WeightedKeyword {
    Weighted { word: String, weight: f64 },
    Plain(String),
}

impl WeightedKeyword {
    pub fn new(word: impl Into<String>, weight: f64) -> Self {
        Self::Weighted {
            word: word.into(),
            weight,
        }
    }

    pub fn word(&self) -> &str {
        match self {
            WeightedKeyword::Weighted { word, .. } => word,
            WeightedKeyword::Plain(word) => word,
        }
    }

    pub fn weight(&self) -> f64 {
        match self {
            WeightedKeyword::Weighted { weight, .. } => *weight,
            WeightedKeyword::Plain(_) => 1.0,
        }
    }
}

/// Positive keywords per scoring dimension.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct PositiveKeywords {
    #[serde(default)]
    pub object: Vec<WeightedKeyword>,
    #[serde(default)]
    pub scene: Vec<WeightedKeyword>,
    #[serde(default)]
    pub emotion: Vec<WeightedKeyword>,
}

impl PositiveKeywords {
    pub fn is_empty(&self) -> bool {
        self.object.is_empty() && self.scene.is_empty() && self.emotion.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WeightedKeyword> {
        self.object.iter().chain(&self.scene).chain(&self.emotion)
    }
}

/// One module rule.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, JsonSchema)]
pub struct ClassificationRule {
    pub module: Module,
    #[validate(custom(function = "validate_positive_keywords"))]
    pub positive_keywords: PositiveKeywords,
    #[serde(default)]
    pub negative_keywords: Vec<String>,
    #[validate(range(min = 0.0))]
    pub min_score_threshold: f64,
    /// Lower ranks are evaluated first.
    pub priority_rank: u32,
}

fn validate_positive_keywords(keywords: &PositiveKeywords) -> Result<(), ValidationError> {
    if keywords.is_empty() {
        return Err(ValidationError::new("empty_positive_keywords"));
    }
    let bad_weight = keywords
        .iter()
        .any(|k| !k.weight().is_finite() || k.weight() < 0.0 || k.word().trim().is_empty());
    if bad_weight {
        return Err(ValidationError::new("invalid_keyword"));
    }
    Ok(())
}

/// Complete rule configuration consumed by the classifier, analyzer and selector.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, JsonSchema)]
pub struct RuleSet {
    #[validate(length(min = 1), nested)]
    pub rules: Vec<ClassificationRule>,
    /// Any segment matching one of these is never assigned a module.
    #[serde(default)]
    pub global_exclusion_keywords: Vec<String>,
    #[serde(default = "default_max_segments")]
    #[validate(range(min = 1))]
    pub max_segments_per_module: usize,
    /// Brands that may appear in analysis results.
    #[serde(default)]
    pub brand_allow_list: Vec<String>,
    /// Words that justify running a brand detection pass.
    #[serde(default)]
    pub brand_trigger_keywords: Vec<String>,
    /// Duration ratios in module order.
    #[serde(default = "default_ratios")]
    #[validate(length(equal = 4))]
    pub module_ratios: Vec<f64>,
}

fn default_max_segments() -> usize {
    DEFAULT_MAX_SEGMENTS_PER_MODULE
}

fn default_ratios() -> Vec<f64> {
    DEFAULT_MODULE_RATIOS.to_vec()
}

impl RuleSet {
    /// Parse and check a JSON rule document.
    pub fn from_json(json: &str) -> Result<Self, RuleError> {
        let rules: RuleSet =
            serde_json::from_str(json).map_err(|e| RuleError::Invalid(e.to_string()))?;
        rules.check()?;
        Ok(rules)
    }

    /// Run field validation plus cross-rule checks.
    pub fn check(&self) -> Result<(), RuleError> {
        self.validate()?;

        let mut ranks = HashSet::new();
        for rule in &self.rules {
            if rule.module == Module::Other {
                return Err(RuleError::Invalid(
                    "rules cannot target the Other module".to_string(),
                ));
            }
            if !ranks.insert(rule.priority_rank) {
                return Err(RuleError::Invalid(format!(
                    "duplicate priority_rank {}",
                    rule.priority_rank
                )));
            }
        }

        if self.module_ratios.iter().any(|r| !r.is_finite() || *r < 0.0)
            || self.module_ratios.iter().sum::<f64>() <= 0.0
        {
            return Err(RuleError::Invalid(
                "module_ratios must be non-negative with a positive sum".to_string(),
            ));
        }

        if !self.brand_trigger_keywords.is_empty() && self.brand_allow_list.is_empty() {
            return Err(RuleError::Invalid(
                "brand_trigger_keywords configured without a brand_allow_list".to_string(),
            ));
        }

        Ok(())
    }

    /// Rules sorted by ascending priority rank.
    pub fn ordered_rules(&self) -> Vec<&ClassificationRule> {
        let mut rules: Vec<&ClassificationRule> = self.rules.iter().collect();
        rules.sort_by_key(|r| r.priority_rank);
        rules
    }

    pub fn rule_for(&self, module: Module) -> Option<&ClassificationRule> {
        self.rules.iter().find(|r| r.module == module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "rules": [
            {
                "module": "selling_point",
                "positive_keywords": {
                    "object": [{"word": "奶粉罐", "weight": 2.0}, "配方表"],
                    "scene": ["实验室"]
                },
                "negative_keywords": ["游乐场"],
                "min_score_threshold": 1.5,
                "priority_rank": 2
            },
            {
                "module": "pain_point",
                "positive_keywords": {"emotion": ["哭闹", "焦虑"]},
                "min_score_threshold": 1.0,
                "priority_rank": 1
            }
        ],
        "global_exclusion_keywords": ["水印"],
        "brand_allow_list": ["启赋"],
        "brand_trigger_keywords": ["奶粉"]
    }"#;

    #[test]
    fn test_parse_sample() {
        let rules = RuleSet::from_json(SAMPLE).unwrap();
        assert_eq!(rules.rules.len(), 2);
        assert_eq!(rules.max_segments_per_module, DEFAULT_MAX_SEGMENTS_PER_MODULE);
        assert_eq!(rules.module_ratios, DEFAULT_MODULE_RATIOS.to_vec());

        let ordered = rules.ordered_rules();
        assert_eq!(ordered[0].module, Module::PainPoint);

        let selling = rules.rule_for(Module::SellingPoint).unwrap();
        assert_eq!(selling.positive_keywords.object[0].weight(), 2.0);
        assert_eq!(selling.positive_keywords.object[1].weight(), 1.0);
        assert_eq!(selling.positive_keywords.object[1].word(), "配方表");
    }

    #[test]
    fn test_empty_rules_rejected() {
        let err = RuleSet::from_json(r#"{"rules": []}"#).unwrap_err();
        assert!(matches!(err, RuleError::Validation(_)));
    }

    #[test]
    fn test_empty_positive_keywords_rejected() {
        let json = r#"{"rules": [{
            "module": "promotion",
            "positive_keywords": {},
            "min_score_threshold": 1.0,
            "priority_rank": 1
        }]}"#;
        assert!(RuleSet::from_json(json).is_err());
    }

    #[test]
    fn test_duplicate_priority_rejected() {
        let json = r#"{"rules": [
            {"module": "promotion", "positive_keywords": {"object": ["优惠券"]}, "min_score_threshold": 1.0, "priority_rank": 1},
            {"module": "pain_point", "positive_keywords": {"object": ["哭"]}, "min_score_threshold": 1.0, "priority_rank": 1}
        ]}"#;
        let err = RuleSet::from_json(json).unwrap_err();
        assert!(err.to_string().contains("duplicate priority_rank"));
    }

    #[test]
    fn test_trigger_without_allow_list_rejected() {
        let json = r#"{"rules": [
            {"module": "promotion", "positive_keywords": {"object": ["优惠券"]}, "min_score_threshold": 1.0, "priority_rank": 1}
        ], "brand_trigger_keywords": ["奶粉"]}"#;
        assert!(RuleSet::from_json(json).is_err());
    }

    #[test]
    fn test_bad_ratio_length_rejected() {
        let json = r#"{"rules": [
            {"module": "promotion", "positive_keywords": {"object": ["优惠券"]}, "min_score_threshold": 1.0, "priority_rank": 1}
        ], "module_ratios": [50, 50]}"#;
        assert!(RuleSet::from_json(json).is_err());
    }
}
