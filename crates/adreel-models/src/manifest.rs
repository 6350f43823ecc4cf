//! Upstream manifest documents.
//!
//! One JSON document per source video. Older documents carry comma-joined
//! per-dimension strings instead of `all_tags`; both shapes are accepted and
//! normalized here.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::analysis::{TagDimension, TagSet};

/// Placeholder values that mean "no tag".
pub const PLACEHOLDER_VALUES: [&str; 7] = ["无", "n/a", "none", "null", "-", "未知", "unknown"];

/// Whether a tag value is a placeholder rather than content.
pub fn is_placeholder(value: &str) -> bool {
    let v = value.trim().to_lowercase();
    v.is_empty() || PLACEHOLDER_VALUES.contains(&v.as_str())
}

/// Manifest for one source video.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ManifestDocument {
    pub video_id: String,
    #[serde(default)]
    pub segments: Vec<ManifestSegment>,
}

/// Segment descriptor as written by the upstream splitter.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ManifestSegment {
    pub file_path: String,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub all_tags: Option<Vec<String>>,
    #[serde(default)]
    pub object: Option<String>,
    #[serde(default)]
    pub scene: Option<String>,
    #[serde(default)]
    pub emotion: Option<String>,
    #[serde(default)]
    pub brand_elements: Option<String>,
    #[serde(default)]
    pub quality_score: Option<f64>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub transcription: Option<String>,
    #[serde(default)]
    pub is_face_close_up: Option<bool>,
    #[serde(default)]
    pub unusable: Option<bool>,
    #[serde(default)]
    pub analysis_method: Option<String>,
}

fn split_legacy(value: &str) -> impl Iterator<Item = &str> {
    value
        .split([',', '，', '、'])
        .map(str::trim)
        .filter(|t| !is_placeholder(t))
}

impl ManifestSegment {
    /// Legacy per-dimension fields as a tag set.
    pub fn legacy_tags(&self) -> TagSet {
        let mut tags = TagSet::new();
        let fields = [
            (TagDimension::Object, &self.object),
            (TagDimension::Scene, &self.scene),
            (TagDimension::Emotion, &self.emotion),
            (TagDimension::Brand, &self.brand_elements),
        ];
        for (dim, field) in fields {
            if let Some(value) = field {
                for tag in split_legacy(value) {
                    tags.push(dim, tag);
                }
            }
        }
        tags
    }

    /// `all_tags` if present and non-empty, else the flattened legacy fields.
    pub fn normalized_tags(&self) -> Vec<String> {
        if let Some(tags) = &self.all_tags {
            let mut out: Vec<String> = Vec::new();
            for tag in tags.iter().map(|t| t.trim()).filter(|t| !is_placeholder(t)) {
                if !out.iter().any(|o| o == tag) {
                    out.push(tag.to_string());
                }
            }
            if !out.is_empty() {
                return out;
            }
        }
        self.legacy_tags().all_tags()
    }

    /// File name from `file_name` or the last path component.
    pub fn resolved_file_name(&self) -> String {
        if let Some(name) = self.file_name.as_ref().filter(|n| !n.trim().is_empty()) {
            return name.clone();
        }
        std::path::Path::new(&self.file_path)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.file_path.clone())
    }

    pub fn is_flagged_unusable(&self) -> bool {
        self.unusable.unwrap_or(false) || self.is_face_close_up.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders() {
        assert!(is_placeholder("无"));
        assert!(is_placeholder(" N/A "));
        assert!(is_placeholder(""));
        assert!(!is_placeholder("奶瓶"));
    }

    #[test]
    fn test_legacy_normalization() {
        let seg = ManifestSegment {
            file_path: "clips/a.mp4".to_string(),
            object: Some("奶瓶, 奶粉罐，奶瓶".to_string()),
            scene: Some("无".to_string()),
            emotion: Some("开心".to_string()),
            ..Default::default()
        };
        assert_eq!(seg.normalized_tags(), vec!["奶瓶", "奶粉罐", "开心"]);
        let legacy = seg.legacy_tags();
        assert!(legacy.scene.is_empty());
        assert_eq!(legacy.object.len(), 2);
    }

    #[test]
    fn test_all_tags_preferred() {
        let seg = ManifestSegment {
            file_path: "a.mp4".to_string(),
            all_tags: Some(vec!["客厅".to_string(), "客厅".to_string(), "none".to_string()]),
            object: Some("奶瓶".to_string()),
            ..Default::default()
        };
        assert_eq!(seg.normalized_tags(), vec!["客厅"]);
    }

    #[test]
    fn test_resolved_file_name() {
        let seg = ManifestSegment {
            file_path: "/data/pool/vid1/scene_01.mp4".to_string(),
            ..Default::default()
        };
        assert_eq!(seg.resolved_file_name(), "scene_01.mp4");
    }

    #[test]
    fn test_document_parse() {
        let json = r#"{"video_id":"v1","segments":[{"file_path":"a.mp4","duration":3.2,"is_face_close_up":true}]}"#;
        let doc: ManifestDocument = serde_json::from_str(json).unwrap();
        assert_eq!(doc.segments.len(), 1);
        assert!(doc.segments[0].is_flagged_unusable());
    }
}
