//! Rule-first segment classifier with a chat-model fallback.

use adreel_inference::ChatAdapter;
use adreel_models::{
    AnalysisResult, ClassificationDecision, ClassificationRule, ClassifiedSegment, Module, RuleSet,
    Segment,
};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, PipelineResult};
use crate::metrics::record_classification;
use crate::retry::{with_retry, RetryConfig};

/// Concurrent classifications when a chat model is involved.
const CLASSIFY_CONCURRENCY: usize = 4;

const SYSTEM_PROMPT: &str = "你是母婴营销短视频的片段分类助手。根据片段标签和口播文本，判断它属于哪个模块。只回答模块名称，不要解释。";

/// Weighted keyword score of one rule against tag text.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleScore {
    pub score: f64,
    pub matched: Vec<String>,
}

/// Score `rule` against lowercase tag text. Each keyword counts once.
pub fn score_rule(rule: &ClassificationRule, tag_text: &str) -> RuleScore {
    let mut score = 0.0;
    let mut matched: Vec<String> = Vec::new();
    for keyword in rule.positive_keywords.iter() {
        let word = keyword.word().trim().to_lowercase();
        if word.is_empty() || matched.contains(&word) {
            continue;
        }
        if tag_text.contains(&word) {
            score += keyword.weight();
            matched.push(word);
        }
    }
    RuleScore { score, matched }
}

fn first_match<'a>(keywords: &'a [String], text: &str) -> Option<&'a String> {
    keywords
        .iter()
        .filter(|k| !k.trim().is_empty())
        .find(|k| text.contains(&k.trim().to_lowercase()))
}

pub struct SegmentClassifier {
    rules: RuleSet,
    chat: Option<Arc<dyn ChatAdapter>>,
    retry: RetryConfig,
    timeout: Duration,
}

impl SegmentClassifier {
    /// Validate `rules` and build a classifier without an AI fallback.
    pub fn new(rules: RuleSet) -> PipelineResult<Self> {
        rules.check()?;
        let bad_threshold = rules
            .rules
            .iter()
            .find(|r| !r.min_score_threshold.is_finite());
        if let Some(rule) = bad_threshold {
            return Err(PipelineError::configuration(format!(
                "rule {} has a non-finite threshold",
                rule.module
            )));
        }

        Ok(Self {
            rules,
            chat: None,
            retry: RetryConfig::new("chat_classify"),
            timeout: Duration::from_secs(30),
        })
    }

    pub fn with_chat(mut self, chat: Arc<dyn ChatAdapter>) -> Self {
        self.chat = Some(chat);
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig, timeout: Duration) -> Self {
        self.retry = retry;
        self.timeout = timeout;
        self
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Keyword-only classification of free text, used for reference transcripts.
    pub fn module_for_text(&self, text: &str) -> Option<Module> {
        let text = text.to_lowercase();
        if first_match(&self.rules.global_exclusion_keywords, &text).is_some() {
            return None;
        }
        self.match_rules(&text, &text).map(|(module, _)| module)
    }

    /// First rule in priority order that clears its threshold.
    fn match_rules(&self, tag_text: &str, full_text: &str) -> Option<(Module, ClassificationDecision)> {
        for rule in self.rules.ordered_rules() {
            if let Some(negative) = first_match(&rule.negative_keywords, full_text) {
                debug!(module = %rule.module, negative = %negative, "Rule skipped by negative keyword");
                continue;
            }
            let RuleScore { score, matched } = score_rule(rule, tag_text);
            if score > 0.0 && score >= rule.min_score_threshold {
                return Some((
                    rule.module,
                    ClassificationDecision::RuleMatch {
                        matched_keywords: matched,
                        score,
                        rule_priority: rule.priority_rank,
                    },
                ));
            }
        }
        None
    }

    fn ai_prompt(&self, tags: &str, transcript: Option<&str>) -> String {
        let mut lines = vec!["可选模块：".to_string()];
        for rule in self.rules.ordered_rules() {
            let keywords: Vec<&str> = rule
                .positive_keywords
                .iter()
                .map(|k| k.word())
                .take(8)
                .collect();
            lines.push(format!(
                "- {}：{}",
                rule.module.canonical_name(),
                keywords.join("、")
            ));
        }
        lines.push(format!("- {}：都不符合", Module::Other.canonical_name()));
        lines.push(format!("片段标签：{}", tags));
        if let Some(transcript) = transcript.filter(|t| !t.trim().is_empty()) {
            lines.push(format!("口播文本：{}", transcript));
        }
        lines.push("请只回答一个模块名称。".to_string());
        lines.join("\n")
    }

    async fn ai_fallback(
        &self,
        chat: &Arc<dyn ChatAdapter>,
        tags: &str,
        transcript: Option<&str>,
        full_text: &str,
    ) -> (Module, ClassificationDecision) {
        let prompt = self.ai_prompt(tags, transcript);
        let reply = match with_retry(&self.retry, self.timeout, || {
            chat.complete(SYSTEM_PROMPT, &prompt)
        })
        .await
        {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "AI classification failed");
                return (Module::Other, ClassificationDecision::NoMatch);
            }
        };

        let mut module = Module::from_reply(&reply).unwrap_or(Module::Other);
        if let Some(rule) = self.rules.rule_for(module) {
            if let Some(negative) = first_match(&rule.negative_keywords, full_text) {
                debug!(module = %module, negative = %negative, "AI answer demoted by negative keyword");
                module = Module::Other;
            }
        }
        (module, ClassificationDecision::AiFallback { raw_reply: reply })
    }

    /// Classify one analyzed segment.
    pub async fn classify(&self, segment: Segment, analysis: AnalysisResult) -> ClassifiedSegment {
        let tag_text = analysis.tags.joined_lowercase();
        let transcript = analysis
            .transcript
            .clone()
            .or_else(|| segment.transcription.clone());
        let full_text = match &transcript {
            Some(t) => format!("{} {}", tag_text, t.to_lowercase()),
            None => tag_text.clone(),
        };

        let (module, decision) =
            if let Some(keyword) = first_match(&self.rules.global_exclusion_keywords, &full_text) {
                (
                    Module::Other,
                    ClassificationDecision::Excluded {
                        keyword: keyword.clone(),
                    },
                )
            } else if let Some(hit) = self.match_rules(&tag_text, &full_text) {
                hit
            } else if let Some(chat) = &self.chat {
                self.ai_fallback(chat, &tag_text, transcript.as_deref(), &full_text)
                    .await
            } else {
                (Module::Other, ClassificationDecision::NoMatch)
            };

        record_classification(decision.source_str());
        debug!(
            segment_id = %segment.id,
            module = %module,
            source = decision.source_str(),
            "Segment classified"
        );

        ClassifiedSegment {
            segment,
            analysis,
            module,
            decision,
        }
    }

    /// Classify a batch, keeping input order.
    pub async fn classify_all(&self, items: Vec<(Segment, AnalysisResult)>) -> Vec<ClassifiedSegment> {
        let classified: Vec<ClassifiedSegment> = stream::iter(items)
            .map(|(segment, analysis)| self.classify(segment, analysis))
            .buffered(CLASSIFY_CONCURRENCY)
            .collect()
            .await;

        let assigned = classified.iter().filter(|c| c.module != Module::Other).count();
        info!(
            total = classified.len(),
            assigned,
            other = classified.len() - assigned,
            "Classification complete"
        );
        classified
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adreel_inference::{InferenceError, MockChatAdapter};
    use adreel_models::{AnalysisMethod, TagDimension, TagSet};
    use std::path::PathBuf;

    const RULES: &str = r#"{
        "rules": [
            {
                "module": "pain_point",
                "positive_keywords": {"emotion": ["哭闹", "焦虑", "担心"], "scene": ["夜晚"]},
                "negative_keywords": ["优惠券"],
                "min_score_threshold": 1.0,
                "priority_rank": 1
            },
            {
                "module": "selling_point",
                "positive_keywords": {"object": [{"word": "奶粉罐", "weight": 2.0}, "配方表"]},
                "negative_keywords": ["医院"],
                "min_score_threshold": 2.0,
                "priority_rank": 2
            },
            {
                "module": "promotion",
                "positive_keywords": {"object": ["优惠券", "价格"]},
                "min_score_threshold": 1.0,
                "priority_rank": 3
            }
        ],
        "global_exclusion_keywords": ["水印"]
    }"#;

    fn classifier() -> SegmentClassifier {
        SegmentClassifier::new(RuleSet::from_json(RULES).unwrap())
            .unwrap()
            .with_retry(RetryConfig::new("chat_classify").with_max_retries(0), Duration::from_secs(1))
    }

    fn segment() -> Segment {
        Segment {
            id: "v_a.mp4".to_string(),
            source_video_id: "v".to_string(),
            file_path: PathBuf::from("/pool/a.mp4"),
            duration: 3.0,
            technical_params: None,
            transcription: None,
        }
    }

    fn analysis(object: &[&str], scene: &[&str], emotion: &[&str]) -> AnalysisResult {
        let mut tags = TagSet::new();
        tags.set(TagDimension::Object, object);
        tags.set(TagDimension::Scene, scene);
        tags.set(TagDimension::Emotion, emotion);
        AnalysisResult::new(tags, 0.8, 0.8, AnalysisMethod::Visual)
    }

    #[test]
    fn test_score_counts_each_keyword_once() {
        let rules = RuleSet::from_json(RULES).unwrap();
        let rule = rules.rule_for(Module::SellingPoint).unwrap();
        let s = score_rule(rule, "奶粉罐 奶粉罐 配方表");
        assert_eq!(s.score, 3.0);
        assert_eq!(s.matched, vec!["奶粉罐", "配方表"]);
    }

    #[tokio::test]
    async fn test_rule_match_in_priority_order() {
        let c = classifier();
        let out = c
            .classify(segment(), analysis(&["奶粉罐"], &[], &["焦虑"]))
            .await;
        assert_eq!(out.module, Module::PainPoint);
        match out.decision {
            ClassificationDecision::RuleMatch {
                matched_keywords,
                rule_priority,
                ..
            } => {
                assert_eq!(matched_keywords, vec!["焦虑"]);
                assert_eq!(rule_priority, 1);
            }
            other => panic!("unexpected decision {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_negative_keyword_skips_rule() {
        let c = classifier();
        let out = c
            .classify(segment(), analysis(&["优惠券"], &[], &["担心"]))
            .await;
        assert_eq!(out.module, Module::Promotion);
    }

    #[tokio::test]
    async fn test_below_threshold_without_chat_is_no_match() {
        let c = classifier();
        let out = c.classify(segment(), analysis(&["配方表"], &[], &[])).await;
        assert_eq!(out.module, Module::Other);
        assert_eq!(out.decision, ClassificationDecision::NoMatch);
    }

    #[tokio::test]
    async fn test_global_exclusion() {
        let c = classifier();
        let out = c
            .classify(segment(), analysis(&["奶粉罐", "水印"], &[], &[]))
            .await;
        assert_eq!(out.module, Module::Other);
        assert_eq!(
            out.decision,
            ClassificationDecision::Excluded {
                keyword: "水印".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_ai_fallback_normalizes_reply() {
        let mut chat = MockChatAdapter::new();
        chat.expect_complete()
            .withf(|_, prompt| prompt.contains("卖点·成分&配方") && prompt.contains("片段标签"))
            .times(1)
            .returning(|_, _| Ok("这个片段属于：卖点".to_string()));
        let c = classifier().with_chat(Arc::new(chat));

        let out = c.classify(segment(), analysis(&["勺子"], &["客厅"], &[])).await;
        assert_eq!(out.module, Module::SellingPoint);
        assert!(matches!(out.decision, ClassificationDecision::AiFallback { .. }));
    }

    #[tokio::test]
    async fn test_ai_answer_demoted_by_negative_keyword() {
        let mut chat = MockChatAdapter::new();
        chat.expect_complete()
            .returning(|_, _| Ok("卖点·成分&配方".to_string()));
        let c = classifier().with_chat(Arc::new(chat));

        let out = c.classify(segment(), analysis(&["勺子"], &["医院"], &[])).await;
        assert_eq!(out.module, Module::Other);
    }

    #[tokio::test]
    async fn test_ai_failure_and_garbage_yield_other() {
        let mut chat = MockChatAdapter::new();
        chat.expect_complete()
            .returning(|_, _| Err(InferenceError::Status { status: 500, body: String::new() }));
        let c = classifier().with_chat(Arc::new(chat));
        let out = c.classify(segment(), analysis(&["勺子"], &[], &[])).await;
        assert_eq!(out.module, Module::Other);

        let mut chat = MockChatAdapter::new();
        chat.expect_complete()
            .returning(|_, _| Ok("I am not sure".to_string()));
        let c = classifier().with_chat(Arc::new(chat));
        let out = c.classify(segment(), analysis(&["勺子"], &[], &[])).await;
        assert_eq!(out.module, Module::Other);
    }

    #[tokio::test]
    async fn test_identical_tags_classify_identically() {
        let c = classifier();
        let a = c.classify(segment(), analysis(&["奶粉罐"], &[], &[])).await;
        let b = c.classify(segment(), analysis(&["奶粉罐"], &[], &[])).await;
        assert_eq!(a.module, b.module);
        assert_eq!(a.module, Module::SellingPoint);
    }

    #[test]
    fn test_invalid_rules_fail_fast() {
        let rules: RuleSet = serde_json::from_str(r#"{"rules": []}"#).unwrap();
        let err = SegmentClassifier::new(rules).err().unwrap();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }

    #[test]
    fn test_module_for_text() {
        let c = classifier();
        assert_eq!(c.module_for_text("宝宝夜里哭闹怎么办"), Some(Module::PainPoint));
        assert_eq!(c.module_for_text("今天天气不错"), None);
    }
}
