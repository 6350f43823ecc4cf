//! Tagging from transcript text.
//!
//! A vocabulary scan runs first. When it finds nothing and a chat model is
//! available, the transcript goes to the chat model under the same JSON
//! contract as the visual pass.

use adreel_inference::ChatAdapter;
use adreel_models::{TagDimension, TagSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::config::Language;
use super::parse::parse_tag_reply;
use super::prompts::{text_tag_prompt, text_tag_system};
use super::quality::strip_placeholders;
use super::vocabulary::TagVocabulary;
use crate::retry::{with_retry, RetryConfig};

pub struct TextTagger {
    vocabulary: TagVocabulary,
    language: Language,
    chat: Option<Arc<dyn ChatAdapter>>,
    retry: RetryConfig,
    timeout: Duration,
}

impl TextTagger {
    pub fn new(vocabulary: TagVocabulary, language: Language) -> Self {
        Self {
            vocabulary,
            language,
            chat: None,
            retry: RetryConfig::new("chat_tagging"),
            timeout: Duration::from_secs(30),
        }
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

    /// Tags for `dimensions` found in `text`. Never fails; errors give an empty set.
    pub async fn tag(&self, text: &str, dimensions: &[TagDimension]) -> TagSet {
        if text.trim().is_empty() || dimensions.is_empty() {
            return TagSet::new();
        }

        let scanned = self.vocabulary.scan(text, dimensions);
        if !scanned.is_empty() {
            debug!(tags = scanned.total_count(), "Transcript tagged by vocabulary scan");
            return scanned;
        }

        let Some(chat) = &self.chat else {
            return TagSet::new();
        };

        let system = text_tag_system(self.language);
        let prompt = text_tag_prompt(self.language, &self.vocabulary, text, dimensions);
        let reply = with_retry(&self.retry, self.timeout, || chat.complete(system, &prompt)).await;

        match reply {
            Ok(reply) => {
                let parsed = strip_placeholders(&parse_tag_reply(&reply));
                let mut out = TagSet::new();
                for dim in dimensions {
                    out.set(*dim, parsed.get(*dim));
                }
                out
            }
            Err(e) => {
                warn!(error = %e, "Transcript tagging via chat failed");
                TagSet::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adreel_inference::{InferenceError, MockChatAdapter};

    fn tagger() -> TextTagger {
        TextTagger::new(TagVocabulary::for_language(Language::Zh, &[]), Language::Zh).with_retry(
            RetryConfig::new("chat_tagging")
                .with_max_retries(0)
                .with_base_delay(Duration::from_millis(1)),
            Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn test_scan_hit_skips_chat() {
        let mut chat = MockChatAdapter::new();
        chat.expect_complete().never();
        let tagger = tagger().with_chat(Arc::new(chat));

        let tags = tagger
            .tag("宝宝晚上在卧室哭闹", &[TagDimension::Scene, TagDimension::Emotion])
            .await;
        assert_eq!(tags.scene, vec!["卧室"]);
        assert_eq!(tags.emotion, vec!["哭闹"]);
        assert!(tags.object.is_empty());
    }

    #[tokio::test]
    async fn test_chat_used_when_scan_empty_and_restricted_to_dimensions() {
        let mut chat = MockChatAdapter::new();
        chat.expect_complete().times(1).returning(|_, _| {
            Ok(r#"{"object":["尿不湿"],"emotion":["无"],"scene":["阳台"]}"#.to_string())
        });
        let tagger = tagger().with_chat(Arc::new(chat));

        let tags = tagger
            .tag("这款尿不湿很干爽", &[TagDimension::Object, TagDimension::Emotion])
            .await;
        assert_eq!(tags.object, vec!["尿不湿"]);
        assert!(tags.emotion.is_empty());
        assert!(tags.scene.is_empty());
    }

    #[tokio::test]
    async fn test_chat_error_is_empty() {
        let mut chat = MockChatAdapter::new();
        chat.expect_complete()
            .returning(|_, _| Err(InferenceError::parse("bad reply")));
        let tagger = tagger().with_chat(Arc::new(chat));
        assert!(tagger.tag("没有关键词", &TagDimension::ALL).await.is_empty());
    }

    #[tokio::test]
    async fn test_without_chat_scan_only() {
        assert!(tagger().tag("没有关键词", &TagDimension::ALL).await.is_empty());
    }
}
