//! Endpoint configuration for the inference adapters.

use std::time::Duration;

pub const DEFAULT_VISION_BASE_URL: &str = "https://dashscope.aliyuncs.com/compatible-mode/v1";
pub const DEFAULT_VISION_MODEL: &str = "qwen-vl-plus";
pub const DEFAULT_CHAT_BASE_URL: &str = "https://api.deepseek.com/v1";
pub const DEFAULT_CHAT_MODEL: &str = "deepseek-chat";
pub const DEFAULT_TRANSCRIPTION_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-1";

/// One OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// Base URL without trailing slash, e.g. `https://host/v1`
    pub base_url: String,
    /// Bearer token
    pub api_key: Option<String>,
    pub model: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl EndpointConfig {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            model: model.into(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Full URL for a path below the base URL.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    /// Read `{prefix}_BASE_URL`, `{prefix}_API_KEY`, `{prefix}_MODEL` and
    /// `{prefix}_TIMEOUT_SECS`, with `fallback_key_var` as a second source
    /// for the API key.
    fn from_env(
        prefix: &str,
        fallback_key_var: &str,
        base_url: &str,
        model: &str,
        timeout_secs: u64,
    ) -> Self {
        let var = |name: &str| std::env::var(format!("{}_{}", prefix, name)).ok();

        let timeout_secs = var("TIMEOUT_SECS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(timeout_secs);
        let mut config = Self::new(
            var("BASE_URL").unwrap_or_else(|| base_url.to_string()),
            var("MODEL").unwrap_or_else(|| model.to_string()),
            timeout_secs,
        );
        config.api_key = var("API_KEY")
            .or_else(|| std::env::var(fallback_key_var).ok())
            .filter(|k| !k.is_empty());
        config
    }
}

/// Configuration for all inference endpoints.
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    pub vision: EndpointConfig,
    pub chat: EndpointConfig,
    pub transcription: EndpointConfig,
    /// Language hint passed to transcription
    pub transcription_language: Option<String>,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            vision: EndpointConfig::new(DEFAULT_VISION_BASE_URL, DEFAULT_VISION_MODEL, 30),
            chat: EndpointConfig::new(DEFAULT_CHAT_BASE_URL, DEFAULT_CHAT_MODEL, 30),
            transcription: EndpointConfig::new(
                DEFAULT_TRANSCRIPTION_BASE_URL,
                DEFAULT_TRANSCRIPTION_MODEL,
                60,
            ),
            transcription_language: Some("zh".to_string()),
        }
    }
}

impl InferenceConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            vision: EndpointConfig::from_env(
                "ADREEL_VISION",
                "DASHSCOPE_API_KEY",
                DEFAULT_VISION_BASE_URL,
                DEFAULT_VISION_MODEL,
                30,
            ),
            chat: EndpointConfig::from_env(
                "ADREEL_CHAT",
                "DEEPSEEK_API_KEY",
                DEFAULT_CHAT_BASE_URL,
                DEFAULT_CHAT_MODEL,
                30,
            ),
            transcription: EndpointConfig::from_env(
                "ADREEL_TRANSCRIPTION",
                "OPENAI_API_KEY",
                DEFAULT_TRANSCRIPTION_BASE_URL,
                DEFAULT_TRANSCRIPTION_MODEL,
                60,
            ),
            transcription_language: std::env::var("ADREEL_TRANSCRIPTION_LANGUAGE")
                .ok()
                .or_else(|| Some("zh".to_string()))
                .filter(|l| !l.is_empty()),
        }
    }
}
