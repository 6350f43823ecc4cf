//! Response quality scoring.

use adreel_models::{is_placeholder, TagDimension, TagSet};
use serde::{Deserialize, Serialize};

/// Weights of the three quality components. They should sum to 1.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QualityWeights {
    pub completeness: f64,
    pub cleanliness: f64,
    pub richness: f64,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            completeness: 0.5,
            cleanliness: 0.2,
            richness: 0.3,
        }
    }
}

fn real_tags(tags: &[String]) -> impl Iterator<Item = &String> {
    tags.iter().filter(|t| !is_placeholder(t))
}

/// Number of placeholder values across all dimensions.
pub fn placeholder_count(tags: &TagSet) -> usize {
    TagDimension::ALL
        .iter()
        .map(|d| tags.get(*d).iter().filter(|t| is_placeholder(t)).count())
        .sum()
}

/// Dimensions with no real (non-placeholder) tag.
pub fn effectively_empty(tags: &TagSet) -> Vec<TagDimension> {
    TagDimension::ALL
        .into_iter()
        .filter(|d| real_tags(tags.get(*d)).next().is_none())
        .collect()
}

/// Score a parsed reply in `[0, 1]`.
///
/// An empty reply scores 0.
pub fn score_tags(tags: &TagSet, weights: &QualityWeights, richness_saturation: usize) -> f64 {
    let total = tags.total_count();
    if total == 0 {
        return 0.0;
    }

    let filled = TagDimension::ALL.len() - effectively_empty(tags).len();
    let completeness = filled as f64 / TagDimension::ALL.len() as f64;
    let cleanliness = 1.0 - placeholder_count(tags) as f64 / total as f64;

    let distinct = strip_placeholders(tags).all_tags().len();
    let richness = (distinct as f64 / richness_saturation.max(1) as f64).min(1.0);

    let score = weights.completeness * completeness
        + weights.cleanliness * cleanliness
        + weights.richness * richness;
    score.clamp(0.0, 1.0)
}

/// Copy of `tags` without placeholder values.
pub fn strip_placeholders(tags: &TagSet) -> TagSet {
    let mut out = TagSet::new();
    for dim in TagDimension::ALL {
        for tag in real_tags(tags.get(dim)) {
            out.push(dim, tag);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(object: &[&str], scene: &[&str], emotion: &[&str], brand: &[&str]) -> TagSet {
        let mut t = TagSet::new();
        t.set(TagDimension::Object, object);
        t.set(TagDimension::Scene, scene);
        t.set(TagDimension::Emotion, emotion);
        t.set(TagDimension::Brand, brand);
        t
    }

    #[test]
    fn test_empty_scores_zero() {
        assert_eq!(score_tags(&TagSet::new(), &QualityWeights::default(), 8), 0.0);
    }

    #[test]
    fn test_full_clean_rich_reply_scores_one() {
        let t = tags(
            &["奶瓶", "宝宝", "妈妈"],
            &["客厅", "卧室"],
            &["开心", "微笑"],
            &["贝因美"],
        );
        let score = score_tags(&t, &QualityWeights::default(), 8);
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_placeholders_lower_score() {
        let clean = tags(&["奶瓶"], &["客厅"], &[], &[]);
        let noisy = tags(&["奶瓶"], &["客厅"], &["无"], &["none"]);
        let w = QualityWeights::default();
        assert!(score_tags(&noisy, &w, 8) < score_tags(&clean, &w, 8));
        assert_eq!(effectively_empty(&noisy).len(), 2);
        assert_eq!(strip_placeholders(&noisy).total_count(), 2);
    }

    #[test]
    fn test_sparse_reply_below_default_threshold() {
        let t = tags(&["奶瓶"], &[], &[], &[]);
        // 0.5 * 0.25 + 0.2 + 0.3 / 8
        let score = score_tags(&t, &QualityWeights::default(), 8);
        assert!(score < 0.6);
    }
}
