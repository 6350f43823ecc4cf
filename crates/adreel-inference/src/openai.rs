//! OpenAI-compatible chat-completions wire types shared by the vision and
//! chat clients.

use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::EndpointConfig;
use crate::error::{InferenceError, InferenceResult};

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatMessage {
    pub role: &'static str,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user_parts(parts: Vec<ContentPart>) -> Self {
        Self {
            role: "user",
            content: MessageContent::Parts(parts),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(crate) enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
pub(crate) struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Choice {
    pub message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatResponse {
    /// First non-blank choice text.
    pub fn into_text(self, source: &str) -> InferenceResult<String> {
        self.choices
            .into_iter()
            .filter_map(|c| c.message.content)
            .map(|t| t.trim().to_string())
            .find(|t| !t.is_empty())
            .ok_or_else(|| InferenceError::EmptyResponse(source.to_string()))
    }
}

/// HTTP client with the endpoint's request timeout.
pub(crate) fn http_client(timeout: Duration) -> InferenceResult<Client> {
    Ok(Client::builder().timeout(timeout).build()?)
}

/// Attach bearer auth when a key is configured.
pub(crate) fn authorize(request: RequestBuilder, endpoint: &EndpointConfig) -> RequestBuilder {
    match endpoint.api_key.as_deref() {
        Some(key) => request.bearer_auth(key),
        None => request,
    }
}

/// Send a request, turning non-2xx responses into [`InferenceError::Status`].
pub(crate) async fn send_checked(request: RequestBuilder) -> InferenceResult<Response> {
    let response = request.send().await?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(InferenceError::Status {
        status: status.as_u16(),
        body,
    })
}

/// Post a chat-completions request and return the reply text.
pub(crate) async fn chat_completion(
    client: &Client,
    endpoint: &EndpointConfig,
    request: &ChatRequest,
    source: &str,
) -> InferenceResult<String> {
    let builder = authorize(client.post(endpoint.url("chat/completions")), endpoint).json(request);
    let response = send_checked(builder).await?;
    let parsed: ChatResponse = response
        .json()
        .await
        .map_err(|e| InferenceError::parse(format!("{} response: {}", source, e)))?;
    parsed.into_text(source)
}

/// Strip a surrounding markdown code fence (```json ... ```), if any.
pub fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string (e.g. `json`) on the opening fence line.
    let rest = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n[1]\n```  "), "[1]");
        assert_eq!(strip_code_fences("  {\"a\":1} "), "{\"a\":1}");
    }

    #[test]
    fn test_request_serialization() {
        let request = ChatRequest {
            model: "m".to_string(),
            messages: vec![
                ChatMessage::system("sys"),
                ChatMessage::user_parts(vec![
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: "data:image/jpeg;base64,AA==".to_string(),
                        },
                    },
                    ContentPart::Text {
                        text: "describe".to_string(),
                    },
                ]),
            ],
            temperature: Some(0.0),
            max_tokens: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["content"], "sys");
        assert_eq!(json["messages"][1]["content"][0]["type"], "image_url");
        assert_eq!(json["messages"][1]["content"][1]["text"], "describe");
        assert!(json.get("max_tokens").is_none());
    }

    #[test]
    fn test_empty_choices_is_error() {
        let response: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(
            response.into_text("chat"),
            Err(InferenceError::EmptyResponse(_))
        ));
    }
}
