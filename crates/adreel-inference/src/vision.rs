//! Vision model client (OpenAI-compatible).
//!
//! Frames go inline as base64 data URLs unless an [`ObjectStorage`] is
//! attached, in which case the request carries time-limited public URLs.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::adapter::{ObjectStorage, VisionAdapter};
use crate::config::EndpointConfig;
use crate::error::{InferenceError, InferenceResult};
use crate::openai::{chat_completion, http_client, ChatMessage, ChatRequest, ContentPart, ImageUrl};

/// Vision client for `/chat/completions` with image parts.
pub struct OpenAiVisionClient {
    endpoint: EndpointConfig,
    client: Client,
    max_tokens: u32,
    storage: Option<(Arc<dyn ObjectStorage>, Duration)>,
}

impl OpenAiVisionClient {
    pub fn new(endpoint: EndpointConfig) -> InferenceResult<Self> {
        if !endpoint.is_configured() {
            return Err(InferenceError::config("vision API key not set"));
        }
        Ok(Self {
            client: http_client(endpoint.timeout)?,
            endpoint,
            max_tokens: 1024,
            storage: None,
        })
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Reference frames by public URLs valid for `ttl` instead of inlining them.
    pub fn with_storage(mut self, storage: Arc<dyn ObjectStorage>, ttl: Duration) -> Self {
        self.storage = Some((storage, ttl));
        self
    }

    async fn image_url(&self, image: &Path) -> InferenceResult<String> {
        match &self.storage {
            Some((storage, ttl)) => {
                let url = storage.public_url(&image.to_string_lossy(), *ttl).await?;
                Ok(url.to_string())
            }
            None => image_data_url(image).await,
        }
    }
}

/// MIME type for an image file by extension.
fn image_mime(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}

/// Read an image and encode it as a `data:` URL.
pub async fn image_data_url(path: &Path) -> InferenceResult<String> {
    let bytes = tokio::fs::read(path).await?;
    Ok(format!("data:{};base64,{}", image_mime(path), BASE64.encode(bytes)))
}

#[async_trait]
impl VisionAdapter for OpenAiVisionClient {
    async fn describe(&self, images: &[PathBuf], prompt: &str) -> InferenceResult<String> {
        let mut parts = Vec::with_capacity(images.len() + 1);
        for image in images {
            parts.push(ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: self.image_url(image).await?,
                },
            });
        }
        parts.push(ContentPart::Text {
            text: prompt.to_string(),
        });

        debug!(model = %self.endpoint.model, images = images.len(), "Calling vision model");

        let request = ChatRequest {
            model: self.endpoint.model.clone(),
            messages: vec![ChatMessage::user_parts(parts)],
            temperature: None,
            max_tokens: Some(self.max_tokens),
        };
        chat_completion(&self.client, &self.endpoint, &request, "vision").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::MockObjectStorage;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn endpoint(server: &MockServer) -> EndpointConfig {
        EndpointConfig::new(server.uri(), "qwen-vl-plus", 5).with_api_key("test-key")
    }

    #[test]
    fn test_image_mime() {
        assert_eq!(image_mime(Path::new("a.PNG")), "image/png");
        assert_eq!(image_mime(Path::new("frame_001.jpg")), "image/jpeg");
    }

    #[test]
    fn test_requires_api_key() {
        let cfg = EndpointConfig::new("http://localhost", "m", 5);
        assert!(matches!(OpenAiVisionClient::new(cfg), Err(InferenceError::Config(_))));
    }

    #[tokio::test]
    async fn test_describe_sends_images_and_returns_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "{\"object\":[\"奶粉罐\"]}"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let frame = dir.path().join("frame_001.jpg");
        tokio::fs::write(&frame, [0xFF, 0xD8, 0xFF]).await.unwrap();

        let client = OpenAiVisionClient::new(endpoint(&server)).unwrap();
        let reply = client.describe(&[frame], "describe").await.unwrap();
        assert!(reply.contains("奶粉罐"));

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        let url = body["messages"][0]["content"][0]["image_url"]["url"].as_str().unwrap();
        assert!(url.starts_with("data:image/jpeg;base64,"));
    }

    #[tokio::test]
    async fn test_storage_urls_replace_inline_images() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "ok"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut storage = MockObjectStorage::new();
        storage
            .expect_public_url()
            .withf(|path, ttl| path.ends_with("frame_007.jpg") && *ttl == Duration::from_secs(600))
            .times(1)
            .returning(|_, _| Ok(url::Url::parse("https://cdn.example.com/f/frame_007.jpg?sig=abc").unwrap()));

        let client = OpenAiVisionClient::new(endpoint(&server))
            .unwrap()
            .with_storage(Arc::new(storage), Duration::from_secs(600));
        // the frame does not exist locally; only its storage URL is sent
        let reply = client
            .describe(&[PathBuf::from("/frames/frame_007.jpg")], "describe")
            .await
            .unwrap();
        assert_eq!(reply, "ok");

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        let url = body["messages"][0]["content"][0]["image_url"]["url"].as_str().unwrap();
        assert_eq!(url, "https://cdn.example.com/f/frame_007.jpg?sig=abc");
    }

    #[tokio::test]
    async fn test_server_error_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
            .mount(&server)
            .await;

        let client = OpenAiVisionClient::new(endpoint(&server)).unwrap();
        let err = client.describe(&[], "describe").await.unwrap_err();
        assert!(matches!(err, InferenceError::Status { status: 503, .. }));
        assert!(err.is_retryable());
    }
}
