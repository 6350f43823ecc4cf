//! Tag vocabulary used for prompts, keyword scans and tag placement.

use adreel_models::{TagDimension, TagSet};

use super::config::Language;

const OBJECTS_ZH: &[&str] = &[
    "婴儿", "宝宝", "妈妈", "爸爸", "奶瓶", "奶粉罐", "奶粉", "奶嘴", "学饮杯", "围嘴",
    "奶粉勺", "储奶袋", "婴儿床", "婴儿车", "尿布", "玩具", "手机", "桌子", "沙发",
];
const SCENES_ZH: &[&str] = &[
    "客厅", "厨房", "卧室", "婴儿房", "浴室", "公园", "花园", "街道", "商场", "医院",
    "游乐场", "超市", "母婴店", "车内", "户外", "室内", "病房", "厕所",
];
const EMOTIONS_ZH: &[&str] = &[
    "开心", "微笑", "大笑", "满足", "哭泣", "哭闹", "难过", "生气", "焦虑", "担心",
    "疲倦", "专注", "平静", "亲密", "关爱", "安抚", "温馨",
];

const OBJECTS_EN: &[&str] = &[
    "baby", "infant", "mother", "father", "bottle", "formula can", "formula", "pacifier",
    "sippy cup", "bib", "crib", "stroller", "diaper", "toy", "phone", "table", "sofa",
];
const SCENES_EN: &[&str] = &[
    "living room", "kitchen", "bedroom", "nursery", "bathroom", "park", "garden", "street",
    "mall", "hospital", "playground", "supermarket", "baby store", "car seat", "outdoor", "indoor",
    "ward", "toilet",
];
const EMOTIONS_EN: &[&str] = &[
    "happy", "smile", "laugh", "satisfied", "crying", "sad", "angry", "anxious", "worried",
    "tired", "focused", "calm", "intimate", "caring", "soothing", "warm",
];

const FACE_TERMS: &[&str] = &[
    "人脸", "面部", "头像", "肖像", "脸部", "眼睛", "嘴唇", "鼻子", "面孔", "头部特写",
    "face", "portrait", "headshot",
];

/// Product and container terms that vision models tend to hallucinate.
const SENSITIVE_OBJECTS: &[&str] = &["奶瓶", "奶粉罐", "奶粉", "bottle", "formula can", "formula"];

const HIGH_RISK_SCENES: &[&str] = &["医院", "病房", "厕所", "诊所", "急诊", "hospital", "ward", "toilet", "clinic"];
const LOW_RISK_SCENES: &[&str] = &["户外", "游乐场", "厨房", "街道", "outdoor", "playground", "kitchen", "street"];

/// Scene risk tier for the anti-hallucination filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneRisk {
    High,
    Low,
}

/// Per-language dimension vocabulary.
#[derive(Debug, Clone)]
pub struct TagVocabulary {
    pub object: Vec<String>,
    pub scene: Vec<String>,
    pub emotion: Vec<String>,
    /// Canonical brand names, usually the rule file's allow-list
    pub brand: Vec<String>,
}

fn owned(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

fn contains_any(text: &str, terms: &[&str]) -> bool {
    terms.iter().any(|t| text.contains(t))
}

impl TagVocabulary {
    pub fn for_language(language: Language, brands: &[String]) -> Self {
        let (object, scene, emotion) = match language {
            Language::Zh => (OBJECTS_ZH, SCENES_ZH, EMOTIONS_ZH),
            Language::En => (OBJECTS_EN, SCENES_EN, EMOTIONS_EN),
        };
        Self {
            object: owned(object),
            scene: owned(scene),
            emotion: owned(emotion),
            brand: brands.to_vec(),
        }
    }

    pub fn words(&self, dimension: TagDimension) -> &[String] {
        match dimension {
            TagDimension::Object => &self.object,
            TagDimension::Scene => &self.scene,
            TagDimension::Emotion => &self.emotion,
            TagDimension::Brand => &self.brand,
        }
    }

    /// Dimension a known tag belongs to.
    pub fn dimension_of(&self, tag: &str) -> Option<TagDimension> {
        let tag = tag.trim().to_lowercase();
        TagDimension::ALL
            .into_iter()
            .find(|d| self.words(*d).iter().any(|w| w.to_lowercase() == tag))
    }

    /// Place free tags into dimensions; unknown tags go to `object`.
    pub fn place(&self, tags: &[String]) -> TagSet {
        let mut set = TagSet::new();
        for tag in tags {
            let dim = self.dimension_of(tag).unwrap_or(TagDimension::Object);
            set.push(dim, tag);
        }
        set
    }

    /// Vocabulary words found in `text`, restricted to `dimensions`.
    pub fn scan(&self, text: &str, dimensions: &[TagDimension]) -> TagSet {
        let haystack = text.to_lowercase();
        let mut set = TagSet::new();
        for dim in dimensions {
            for word in self.words(*dim) {
                if haystack.contains(&word.to_lowercase()) {
                    set.push(*dim, word);
                }
            }
        }
        set
    }
}

pub fn mentions_face(text: &str) -> bool {
    contains_any(&text.to_lowercase(), FACE_TERMS)
}

pub fn is_sensitive_object(tag: &str) -> bool {
    let tag = tag.to_lowercase();
    SENSITIVE_OBJECTS.iter().any(|t| tag.contains(t))
}

/// Highest risk tier among the given scene tags.
pub fn scene_risk(scenes: &[String]) -> Option<SceneRisk> {
    let joined = scenes.join(" ").to_lowercase();
    if contains_any(&joined, HIGH_RISK_SCENES) {
        Some(SceneRisk::High)
    } else if contains_any(&joined, LOW_RISK_SCENES) {
        Some(SceneRisk::Low)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_place_uses_vocabulary_then_object() {
        let vocab = TagVocabulary::for_language(Language::Zh, &["贝因美".to_string()]);
        let tags = vocab.place(&[
            "客厅".to_string(),
            "开心".to_string(),
            "贝因美".to_string(),
            "未知物件".to_string(),
        ]);
        assert_eq!(tags.scene, vec!["客厅"]);
        assert_eq!(tags.emotion, vec!["开心"]);
        assert_eq!(tags.brand, vec!["贝因美"]);
        assert_eq!(tags.object, vec!["未知物件"]);
    }

    #[test]
    fn test_scan_respects_dimensions() {
        let vocab = TagVocabulary::for_language(Language::Zh, &[]);
        let text = "宝宝在客厅里开心地玩玩具";
        let only_scene = vocab.scan(text, &[TagDimension::Scene]);
        assert_eq!(only_scene.scene, vec!["客厅"]);
        assert!(only_scene.object.is_empty());

        let all = vocab.scan(text, &TagDimension::ALL);
        assert!(all.object.contains(&"宝宝".to_string()));
        assert!(all.emotion.contains(&"开心".to_string()));
    }

    #[test]
    fn test_scene_risk_prefers_high() {
        let scenes = vec!["户外".to_string(), "医院".to_string()];
        assert_eq!(scene_risk(&scenes), Some(SceneRisk::High));
        assert_eq!(scene_risk(&["厨房".to_string()]), Some(SceneRisk::Low));
        assert_eq!(scene_risk(&["客厅".to_string()]), None);
    }

    #[test]
    fn test_face_and_sensitive_terms() {
        assert!(mentions_face("面部特写"));
        assert!(mentions_face("Portrait shot"));
        assert!(!mentions_face("奶粉罐"));
        assert!(!mentions_face("奶粉罐特写"));
        assert!(is_sensitive_object("奶粉罐"));
        assert!(is_sensitive_object("Baby Bottle"));
    }
}
