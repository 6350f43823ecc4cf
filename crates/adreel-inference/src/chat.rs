//! Text chat client (OpenAI-compatible, DeepSeek by default).

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::adapter::ChatAdapter;
use crate::config::EndpointConfig;
use crate::error::{InferenceError, InferenceResult};
use crate::openai::{chat_completion, http_client, ChatMessage, ChatRequest};

/// Chat client. Requests are sent at temperature 0 unless overridden.
pub struct OpenAiChatClient {
    endpoint: EndpointConfig,
    client: Client,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiChatClient {
    pub fn new(endpoint: EndpointConfig) -> InferenceResult<Self> {
        if !endpoint.is_configured() {
            return Err(InferenceError::config("chat API key not set"));
        }
        Ok(Self {
            client: http_client(endpoint.timeout)?,
            endpoint,
            temperature: 0.0,
            max_tokens: 512,
        })
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[async_trait]
impl ChatAdapter for OpenAiChatClient {
    async fn complete(&self, system: &str, prompt: &str) -> InferenceResult<String> {
        let mut messages = Vec::with_capacity(2);
        if !system.trim().is_empty() {
            messages.push(ChatMessage::system(system));
        }
        messages.push(ChatMessage::user(prompt));

        debug!(model = %self.endpoint.model, "Calling chat model");

        let request = ChatRequest {
            model: self.endpoint.model.clone(),
            messages,
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
        };
        chat_completion(&self.client, &self.endpoint, &request, "chat").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_complete_uses_zero_temperature() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({
                "model": "deepseek-chat",
                "temperature": 0.0
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "  卖点·成分&配方 \n"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let endpoint = EndpointConfig::new(server.uri(), "deepseek-chat", 5).with_api_key("k");
        let client = OpenAiChatClient::new(endpoint).unwrap();
        let reply = client.complete("classify", "tags: 成分").await.unwrap();
        assert_eq!(reply, "卖点·成分&配方");
    }

    #[tokio::test]
    async fn test_malformed_body_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let endpoint = EndpointConfig::new(server.uri(), "deepseek-chat", 5).with_api_key("k");
        let client = OpenAiChatClient::new(endpoint).unwrap();
        let err = client.complete("", "hi").await.unwrap_err();
        assert!(matches!(err, InferenceError::Parse(_)));
        assert!(!err.is_retryable());
    }
}
