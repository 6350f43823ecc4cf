//! Parsing of tagger replies into a [`TagSet`].
//!
//! The JSON object `{"object":[],"scene":[],"emotion":[],"brand":[]}` is the
//! primary contract. Replies that are not JSON are read with the legacy
//! line format `物体：奶瓶|奶粉罐`.
//!
//! JSON values are kept verbatim, placeholders included, so the quality gate
//! can see them. The legacy parser drops placeholders while reading.

use adreel_inference::strip_code_fences;
use adreel_models::{TagDimension, TagSet};
use serde_json::Value;

const SEPARATORS: [char; 5] = [',', '，', '、', '|', ';'];

/// Map a reply key to a dimension.
pub fn dimension_for_key(key: &str) -> Option<TagDimension> {
    let key = key.trim().to_lowercase();
    if key.contains("object") || key.contains("物体") {
        Some(TagDimension::Object)
    } else if key.contains("scene") || key.contains("场景") {
        Some(TagDimension::Scene)
    } else if key.contains("emotion")
        || key.contains("expression")
        || key.contains("情绪")
        || key.contains("表情")
    {
        Some(TagDimension::Emotion)
    } else if key.contains("brand") || key.contains("品牌") {
        Some(TagDimension::Brand)
    } else {
        None
    }
}

fn push_value(tags: &mut TagSet, dimension: TagDimension, value: &Value) {
    match value {
        Value::String(s) => {
            for part in s.split(SEPARATORS) {
                tags.push(dimension, part);
            }
        }
        Value::Array(items) => {
            for item in items {
                if let Value::String(s) = item {
                    tags.push(dimension, s);
                }
            }
        }
        _ => {}
    }
}

/// Parse the JSON contract. `None` when the reply holds no JSON object.
pub fn parse_json_tags(reply: &str) -> Option<TagSet> {
    let body = strip_code_fences(reply);
    let start = body.find('{')?;
    let end = body.rfind('}')?;
    if end <= start {
        return None;
    }
    let value: Value = serde_json::from_str(&body[start..=end]).ok()?;
    let object = value.as_object()?;

    let mut tags = TagSet::new();
    for (key, value) in object {
        if let Some(dim) = dimension_for_key(key) {
            push_value(&mut tags, dim, value);
        }
    }
    Some(tags)
}

/// Parse `key：a|b` lines. `None` when no line names a dimension.
pub fn parse_legacy_lines(reply: &str) -> Option<TagSet> {
    let mut tags = TagSet::new();
    let mut recognized = false;

    for line in reply.lines() {
        let Some((key, values)) = line.split_once([':', '：']) else {
            continue;
        };
        let key = key.trim().trim_start_matches(['-', '*', '#']).trim();
        let Some(dim) = dimension_for_key(key) else {
            continue;
        };
        recognized = true;
        for value in values.split(SEPARATORS) {
            tags.push(dim, value);
        }
    }

    recognized.then_some(tags)
}

/// Parse a tagger reply; an unreadable reply is an empty tag set.
pub fn parse_tag_reply(reply: &str) -> TagSet {
    parse_json_tags(reply)
        .or_else(|| parse_legacy_lines(reply))
        .unwrap_or_default()
}
