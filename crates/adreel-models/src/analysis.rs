//! Segment analysis results.
//!
//! An [`AnalysisResult`] is produced once per segment by the analyzer and
//! carries tags along four fixed dimensions plus quality and confidence
//! scores. Scores are clamped to `[0, 1]` on every write.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Tag dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TagDimension {
    Object,
    Scene,
    Emotion,
    Brand,
}

impl TagDimension {
    pub const ALL: [TagDimension; 4] = [
        TagDimension::Object,
        TagDimension::Scene,
        TagDimension::Emotion,
        TagDimension::Brand,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TagDimension::Object => "object",
            TagDimension::Scene => "scene",
            TagDimension::Emotion => "emotion",
            TagDimension::Brand => "brand",
        }
    }

    /// Chinese label used in prompts and legacy responses.
    pub fn label_zh(&self) -> &'static str {
        match self {
            TagDimension::Object => "物体",
            TagDimension::Scene => "场景",
            TagDimension::Emotion => "情绪",
            TagDimension::Brand => "品牌",
        }
    }
}

/// Tags grouped by dimension. Each list is deduplicated and keeps insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TagSet {
    #[serde(default)]
    pub object: Vec<String>,
    #[serde(default)]
    pub scene: Vec<String>,
    #[serde(default)]
    pub emotion: Vec<String>,
    #[serde(default)]
    pub brand: Vec<String>,
}

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, dimension: TagDimension) -> &[String] {
        match dimension {
            TagDimension::Object => &self.object,
            TagDimension::Scene => &self.scene,
            TagDimension::Emotion => &self.emotion,
            TagDimension::Brand => &self.brand,
        }
    }

    pub fn get_mut(&mut self, dimension: TagDimension) -> &mut Vec<String> {
        match dimension {
            TagDimension::Object => &mut self.object,
            TagDimension::Scene => &mut self.scene,
            TagDimension::Emotion => &mut self.emotion,
            TagDimension::Brand => &mut self.brand,
        }
    }

    /// Add a tag, ignoring blanks and duplicates.
    pub fn push(&mut self, dimension: TagDimension, tag: impl AsRef<str>) {
        let tag = tag.as_ref().trim();
        if tag.is_empty() {
            return;
        }
        let list = self.get_mut(dimension);
        if !list.iter().any(|t| t == tag) {
            list.push(tag.to_string());
        }
    }

    /// Replace a dimension with the given tags (deduplicated).
    pub fn set<I, S>(&mut self, dimension: TagDimension, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.get_mut(dimension).clear();
        for tag in tags {
            self.push(dimension, tag);
        }
    }

    pub fn clear(&mut self, dimension: TagDimension) {
        self.get_mut(dimension).clear();
    }

    pub fn is_empty(&self) -> bool {
        TagDimension::ALL.iter().all(|d| self.get(*d).is_empty())
    }

    /// Dimensions with no tags, in [`TagDimension::ALL`] order.
    pub fn empty_dimensions(&self) -> Vec<TagDimension> {
        TagDimension::ALL
            .iter()
            .copied()
            .filter(|d| self.get(*d).is_empty())
            .collect()
    }

    pub fn empty_count(&self) -> usize {
        self.empty_dimensions().len()
    }

    /// Merge another tag set into this one without duplicates.
    pub fn union(&mut self, other: &TagSet) {
        for dim in TagDimension::ALL {
            for tag in other.get(dim) {
                self.push(dim, tag);
            }
        }
    }

    /// All tags flattened in dimension order, without duplicates.
    pub fn all_tags(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for dim in TagDimension::ALL {
            for tag in self.get(dim) {
                if !out.contains(tag) {
                    out.push(tag.clone());
                }
            }
        }
        out
    }

    /// Lowercased, space-joined tag text used for keyword matching.
    pub fn joined_lowercase(&self) -> String {
        self.all_tags().join(" ").to_lowercase()
    }

    pub fn total_count(&self) -> usize {
        TagDimension::ALL.iter().map(|d| self.get(*d).len()).sum()
    }
}

/// How an analysis result was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMethod {
    /// Tags come from the visual pass only.
    Visual,
    /// Visual pass was discarded in favor of the transcript.
    AudioOnly,
    /// Visual tags completed with targeted audio tags.
    Fusion,
}

impl AnalysisMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisMethod::Visual => "visual",
            AnalysisMethod::AudioOnly => "audio_only",
            AnalysisMethod::Fusion => "fusion",
        }
    }
}

/// Result of analyzing a single segment.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisResult {
    pub tags: TagSet,
    quality_score: f64,
    confidence: f64,
    pub method: AnalysisMethod,
    /// Segment must not be used (e.g. face close-up)
    #[serde(default)]
    pub unusable: bool,
    /// Transcript obtained during audio passes
    #[serde(default)]
    pub transcript: Option<String>,
    /// Audit trail of decisions taken during analysis
    #[serde(default)]
    pub notes: Vec<String>,
}

/// Quality assigned to results that could not be analyzed.
pub const CONSERVATIVE_QUALITY: f64 = 0.1;
/// Confidence assigned to results that could not be analyzed.
pub const CONSERVATIVE_CONFIDENCE: f64 = 0.1;

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

impl AnalysisResult {
    pub fn new(tags: TagSet, quality_score: f64, confidence: f64, method: AnalysisMethod) -> Self {
        Self {
            tags,
            quality_score: clamp_unit(quality_score),
            confidence: clamp_unit(confidence),
            method,
            unusable: false,
            transcript: None,
            notes: Vec::new(),
        }
    }

    /// Empty, low-quality result used when analysis could not complete.
    pub fn conservative() -> Self {
        Self::new(
            TagSet::default(),
            CONSERVATIVE_QUALITY,
            CONSERVATIVE_CONFIDENCE,
            AnalysisMethod::Visual,
        )
    }

    pub fn quality_score(&self) -> f64 {
        self.quality_score
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn set_quality_score(&mut self, value: f64) {
        self.quality_score = clamp_unit(value);
    }

    pub fn set_confidence(&mut self, value: f64) {
        self.confidence = clamp_unit(value);
    }

    /// `quality_score * confidence`, used to rank candidates.
    pub fn combined_quality(&self) -> f64 {
        self.quality_score * self.confidence
    }

    pub fn note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_dedups_and_trims() {
        let mut tags = TagSet::new();
        tags.push(TagDimension::Object, " 奶瓶 ");
        tags.push(TagDimension::Object, "奶瓶");
        tags.push(TagDimension::Object, "");
        assert_eq!(tags.object, vec!["奶瓶".to_string()]);
    }

    #[test]
    fn test_empty_dimensions() {
        let mut tags = TagSet::new();
        tags.push(TagDimension::Scene, "客厅");
        assert_eq!(
            tags.empty_dimensions(),
            vec![TagDimension::Object, TagDimension::Emotion, TagDimension::Brand]
        );
        assert_eq!(tags.empty_count(), 3);
        assert!(!tags.is_empty());
    }

    #[test]
    fn test_union_and_all_tags() {
        let mut a = TagSet::new();
        a.push(TagDimension::Object, "奶粉罐");
        let mut b = TagSet::new();
        b.push(TagDimension::Object, "奶粉罐");
        b.push(TagDimension::Emotion, "开心");
        a.union(&b);
        assert_eq!(a.all_tags(), vec!["奶粉罐".to_string(), "开心".to_string()]);
        assert_eq!(a.total_count(), 2);
    }

    #[test]
    fn test_scores_are_clamped() {
        let mut result = AnalysisResult::new(TagSet::new(), 1.7, -0.2, AnalysisMethod::Visual);
        assert_eq!(result.quality_score(), 1.0);
        assert_eq!(result.confidence(), 0.0);
        result.set_confidence(f64::NAN);
        assert_eq!(result.confidence(), 0.0);
    }

    #[test]
    fn test_method_serialization() {
        let json = serde_json::to_string(&AnalysisMethod::AudioOnly).unwrap();
        assert_eq!(json, "\"audio_only\"");
    }

    #[test]
    fn test_conservative() {
        let result = AnalysisResult::conservative();
        assert!(result.tags.is_empty());
        assert!(!result.unusable);
        assert!(result.quality_score() < 0.5);
    }
}
