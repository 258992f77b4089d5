use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::{PilotError, PilotResult};
use crate::llm::backend::{BackendVariant, ModelBackend};
use crate::llm::prompt::{build_message, RequestData};
use crate::llm::types::{
    ChatCompletionRequest, ChatMessage, ContentPart, ImageUrl, MessageContent, MessagePart,
    MultimodalMessage, RawResponse, OMITTED_IMAGE,
};
use crate::perception::screenshot::{capture_data_uri, to_data_uri, DEFAULT_QUALITY};
use crate::perception::traits::ScreenCapture;

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_MAX_TOKENS: u32 = 10_000;

/// Hosted vision model behind an OpenAI-compatible chat-completions endpoint.
pub struct OpenAiCompatibleBackend {
    model: String,
    api_base: String,
    api_key: String,
    context: String,
    max_tokens: u32,
    capture: Arc<dyn ScreenCapture>,
    quality: u8,
    client: reqwest::Client,
}

impl OpenAiCompatibleBackend {
    pub fn new(
        model: String,
        api_base: String,
        api_key: String,
        context: String,
        capture: Arc<dyn ScreenCapture>,
    ) -> Self {
        Self {
            model,
            api_base,
            api_key,
            context,
            max_tokens: DEFAULT_MAX_TOKENS,
            capture,
            quality: DEFAULT_QUALITY,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// JPEG quality of the embedded screenshot.
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_base.trim_end_matches('/'))
    }

    async fn build_request(&self, message: &MultimodalMessage) -> PilotResult<ChatCompletionRequest> {
        let mut parts = Vec::with_capacity(message.parts.len());
        for part in &message.parts {
            let content = match part {
                MessagePart::Text(text) => ContentPart::Text { text: text.clone() },
                MessagePart::ImageDataUri(uri) => ContentPart::ImageUrl {
                    image_url: ImageUrl { url: uri.clone() },
                },
                MessagePart::ImagePath(file) => ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: to_data_uri(&file.read_base64().await?),
                    },
                },
            };
            parts.push(content);
        }

        Ok(ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".into(),
                content: MessageContent::Parts(parts),
            }],
            max_tokens: self.max_tokens,
        })
    }
}

#[async_trait]
impl ModelBackend for OpenAiCompatibleBackend {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn variant(&self) -> BackendVariant {
        BackendVariant::HostedChatCompletions
    }

    async fn format_request(&self, objective: &str, step: u32) -> PilotResult<MultimodalMessage> {
        let provider = self.capture.clone();
        let quality = self.quality;
        let data_uri = tokio::task::spawn_blocking(move || capture_data_uri(provider.as_ref(), quality))
            .await
            .map_err(|e| PilotError::Capture(format!("capture task failed: {e}")))??;

        build_message(
            &self.context,
            &RequestData::new(objective, step),
            MessagePart::ImageDataUri(data_uri),
        )
    }

    async fn send_to_model(&self, message: &MultimodalMessage) -> PilotResult<RawResponse> {
        let body = serde_json::to_value(self.build_request(message).await?)?;

        tracing::debug!(
            model = %self.model,
            max_tokens = self.max_tokens,
            body = %sanitized(&body),
            "request body (sanitized, base64 omitted)"
        );

        let mut request = self.client.post(self.endpoint()).json(&body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }
        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let err_body = response.text().await.unwrap_or_default();
            return Err(PilotError::Backend(format!("{}: {}", status, err_body)));
        }

        let json: serde_json::Value = response.json().await?;
        tracing::info!(
            model = %self.model,
            content_len = json["choices"][0]["message"]["content"].as_str().map(str::len).unwrap_or(0),
            "chat completion received"
        );
        Ok(RawResponse(json))
    }

    fn response_content<'a>(&self, raw: &'a RawResponse) -> Option<&'a str> {
        raw.0["choices"][0]["message"]["content"].as_str().map(str::trim)
    }
}

fn sanitized(body: &serde_json::Value) -> String {
    let mut log_body = body.clone();
    if let Some(msgs) = log_body.get_mut("messages").and_then(|m| m.as_array_mut()) {
        for msg in msgs {
            // content can be string or array of parts; only the array case carries images.
            if let Some(parts) = msg.get_mut("content").and_then(|c| c.as_array_mut()) {
                for part in parts {
                    if part.get("type").and_then(|t| t.as_str()) == Some("image_url") {
                        if let Some(url) = part.get_mut("image_url").and_then(|u| u.get_mut("url")) {
                            *url = serde_json::Value::String(OMITTED_IMAGE.to_string());
                        }
                    }
                }
            }
        }
    }
    serde_json::to_string(&log_body).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::plan::PlanErrorKind;
    use crate::perception::screenshot::StaticCapture;
    use mockito::Matcher;
    use serde_json::json;

    fn backend(api_base: String, api_key: &str) -> OpenAiCompatibleBackend {
        let capture: Arc<dyn ScreenCapture> =
            Arc::new(StaticCapture::new(b"jpeg".to_vec(), std::env::temp_dir()));
        OpenAiCompatibleBackend::new(
            "gpt-4-turbo".into(),
            api_base,
            api_key.into(),
            "CTX ".into(),
            capture,
        )
    }

    fn completion(content: &str) -> String {
        json!({ "choices": [{ "message": { "role": "assistant", "content": content } }] }).to_string()
    }

    #[tokio::test]
    async fn format_request_embeds_data_uri() {
        let backend = backend(DEFAULT_API_BASE.into(), "");
        let message = backend.format_request("open google", 4).await.unwrap();

        assert_eq!(message.text(), r#"CTX {"objective":"open google","step_number":4}"#);
        match &message.parts[1] {
            MessagePart::ImageDataUri(uri) => assert_eq!(uri, "data:image/jpeg;base64,anBlZw=="),
            other => panic!("expected data uri, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn sends_parts_with_token_limit_and_auth() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::PartialJson(json!({
                "model": "gpt-4-turbo",
                "max_tokens": 10000,
                "messages": [{
                    "role": "user",
                    "content": [
                        { "type": "text" },
                        { "type": "image_url", "image_url": { "url": "data:image/jpeg;base64,anBlZw==" } }
                    ]
                }]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(completion("  {\"steps\": [], \"done\": true}  "))
            .create_async()
            .await;

        let plan = backend(server.url(), "sk-test")
            .get_instructions("open google", 0)
            .await
            .unwrap();

        mock.assert_async().await;
        assert!(plan.is_done());
        assert!(plan.actions().unwrap().is_empty());
    }

    #[tokio::test]
    async fn prose_reply_becomes_error_plan() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(completion("I cannot help with that."))
            .create_async()
            .await;

        let plan = backend(server.url(), "").get_instructions("x", 0).await.unwrap();
        let err = plan.error_plan().unwrap();
        assert_eq!(err.error, PlanErrorKind::NoJsonObject);
        assert_eq!(err.message, "I cannot help with that.");
    }

    #[tokio::test]
    async fn unauthorized_degrades_to_error_plan() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_body(r#"{"error": {"message": "bad key"}}"#)
            .create_async()
            .await;

        let backend = backend(server.url(), "wrong");
        let message = backend.format_request("x", 0).await.unwrap();
        let err = backend.send_to_model(&message).await.unwrap_err();
        assert!(matches!(err, PilotError::Backend(_)));

        let plan = backend.get_instructions("x", 0).await.unwrap();
        assert!(plan.is_error());
    }

    struct RecordingCapture {
        requested: std::sync::Mutex<Vec<u8>>,
    }

    impl ScreenCapture for RecordingCapture {
        fn capture_to_file(&self, _quality: u8) -> PilotResult<std::path::PathBuf> {
            Err(PilotError::Capture("file capture not used by the hosted backend".into()))
        }

        fn capture_as_encoded_payload(&self, quality: u8) -> PilotResult<String> {
            self.requested.lock().unwrap().push(quality);
            Ok("AA==".into())
        }
    }

    #[tokio::test]
    async fn configured_quality_reaches_the_capture() {
        let capture = Arc::new(RecordingCapture { requested: Default::default() });
        let backend = OpenAiCompatibleBackend::new(
            "gpt-4o".into(),
            DEFAULT_API_BASE.into(),
            String::new(),
            "CTX ".into(),
            capture.clone(),
        )
        .with_quality(40);

        backend.format_request("x", 0).await.unwrap();
        assert_eq!(*capture.requested.lock().unwrap(), vec![40]);
    }

    #[test]
    fn sanitized_body_omits_base64() {
        let body = json!({
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": "keep me" },
                    { "type": "image_url", "image_url": { "url": "data:image/jpeg;base64,SECRET" } }
                ]
            }]
        });
        let logged = sanitized(&body);
        assert!(logged.contains("keep me"));
        assert!(!logged.contains("SECRET"));
    }
}
