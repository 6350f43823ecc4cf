//! Prompt templates for the tagging passes.

use adreel_models::TagDimension;

use super::config::Language;
use super::vocabulary::TagVocabulary;

fn dimension_keys(dimensions: &[TagDimension]) -> String {
    dimensions
        .iter()
        .map(|d| format!("\"{}\":[]", d.as_str()))
        .collect::<Vec<_>>()
        .join(",")
}

fn examples(vocabulary: &TagVocabulary, dimension: TagDimension) -> String {
    vocabulary
        .words(dimension)
        .iter()
        .take(12)
        .cloned()
        .collect::<Vec<_>>()
        .join("、")
}

/// Prompt for the full visual tagging pass. `strict` is the retry variant.
pub fn visual_prompt(language: Language, vocabulary: &TagVocabulary, strict: bool) -> String {
    let keys = dimension_keys(&TagDimension::ALL);
    let mut prompt = match language {
        Language::Zh => format!(
            "你是母婴视频素材分析助手。请根据这些视频帧，识别画面中的物体、场景、情绪和品牌。\n\
             物体参考：{}\n场景参考：{}\n情绪参考：{}\n\
             只输出JSON：{{{}}}，每个字段是中文短词数组，看不到的字段输出空数组。",
            examples(vocabulary, TagDimension::Object),
            examples(vocabulary, TagDimension::Scene),
            examples(vocabulary, TagDimension::Emotion),
            keys
        ),
        Language::En => format!(
            "You tag short baby-care marketing clips. From these frames, list the visible objects, \
             the scene, the emotions and any brand.\n\
             Objects e.g.: {}\nScenes e.g.: {}\nEmotions e.g.: {}\n\
             Reply with JSON only: {{{}}}. Each field is an array of short English words; use an \
             empty array for anything not visible.",
            examples(vocabulary, TagDimension::Object),
            examples(vocabulary, TagDimension::Scene),
            examples(vocabulary, TagDimension::Emotion),
            keys
        ),
    };

    if strict {
        prompt.push_str(match language {
            Language::Zh => "\n严格要求：不要输出“无”“未知”等占位词，不要输出任何解释文字，尽量填写物体和场景。",
            Language::En => "\nStrict: never write placeholders such as \"none\" or \"unknown\", add no commentary, and always fill object and scene when anything is visible.",
        });
    }
    prompt
}

/// Prompt for the narrow brand-only visual pass.
pub fn brand_prompt(language: Language, allow_list: &[String]) -> String {
    let brands = allow_list.join("、");
    match language {
        Language::Zh => format!(
            "只识别画面中出现的品牌（包装、标志、文字）。只能从以下品牌中选择：{}。\n\
             只输出JSON：{{\"brand\":[]}}，没有则输出空数组。",
            brands
        ),
        Language::En => format!(
            "Identify only brands visible on packaging, logos or text. Choose only from: {}.\n\
             Reply with JSON only: {{\"brand\":[]}}; use an empty array if none is visible.",
            brands
        ),
    }
}

/// System prompt for transcript tagging.
pub fn text_tag_system(language: Language) -> &'static str {
    match language {
        Language::Zh => "你从母婴视频的口播文本中提取标签，只输出JSON。",
        Language::En => "You extract tags from the transcript of a baby-care video. Reply with JSON only.",
    }
}

/// User prompt for transcript tagging, limited to `dimensions`.
pub fn text_tag_prompt(
    language: Language,
    vocabulary: &TagVocabulary,
    text: &str,
    dimensions: &[TagDimension],
) -> String {
    let hints = dimensions
        .iter()
        .filter(|d| **d != TagDimension::Brand)
        .map(|d| format!("{}: {}", d.as_str(), examples(vocabulary, *d)))
        .collect::<Vec<_>>()
        .join("\n");
    let keys = dimension_keys(dimensions);
    match language {
        Language::Zh => format!(
            "口播文本：{}\n参考词：\n{}\n只输出JSON：{{{}}}，文本没有提到的字段输出空数组。",
            text, hints, keys
        ),
        Language::En => format!(
            "Transcript: {}\nReference words:\n{}\nReply with JSON only: {{{}}}; use an empty array \
             for anything the transcript does not mention.",
            text, hints, keys
        ),
    }
}
