use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::{PilotError, PilotResult};
use crate::llm::backend::{BackendVariant, ModelBackend};
use crate::llm::prompt::{build_message, RequestData, LOCAL_INSTRUCTIONS};
use crate::llm::types::{
    LocalChatMessage, LocalChatRequest, MessagePart, MultimodalMessage, RawResponse, OMITTED_IMAGE,
};
use crate::perception::screenshot::CaptureFile;
use crate::perception::traits::ScreenCapture;

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Local vision model served over the Ollama chat API.
pub struct OllamaBackend {
    model: String,
    base_url: String,
    context: String,
    preamble: Option<String>,
    capture: Arc<dyn ScreenCapture>,
    quality: u8,
    client: reqwest::Client,
}

impl OllamaBackend {
    pub fn new(
        model: String,
        base_url: String,
        context: String,
        capture: Arc<dyn ScreenCapture>,
        quality: u8,
    ) -> Self {
        Self {
            model,
            base_url,
            context,
            preamble: None,
            capture,
            quality,
            client: reqwest::Client::new(),
        }
    }

    /// System-role message sent ahead of every user turn.
    pub fn with_preamble(mut self, preamble: impl Into<String>) -> Self {
        self.preamble = Some(preamble.into());
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/api/chat", self.base_url.trim_end_matches('/'))
    }

    async fn build_request(&self, message: &MultimodalMessage) -> PilotResult<LocalChatRequest> {
        let mut images = Vec::new();
        for part in &message.parts {
            match part {
                MessagePart::ImagePath(file) => images.push(file.read_base64().await?),
                MessagePart::ImageDataUri(uri) => {
                    // The chat API wants bare base64.
                    let data = uri.split_once(',').map(|(_, d)| d).unwrap_or(uri);
                    images.push(data.to_string());
                }
                MessagePart::Text(_) => {}
            }
        }

        let mut messages = Vec::with_capacity(2);
        if let Some(preamble) = &self.preamble {
            messages.push(LocalChatMessage {
                role: "system".into(),
                content: preamble.clone(),
                images: None,
            });
        }
        messages.push(LocalChatMessage {
            role: "user".into(),
            content: message.text(),
            images: Some(images),
        });

        Ok(LocalChatRequest {
            model: self.model.clone(),
            messages,
            stream: false,
        })
    }
}

#[async_trait]
impl ModelBackend for OllamaBackend {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn variant(&self) -> BackendVariant {
        BackendVariant::LocalChat
    }

    async fn format_request(&self, objective: &str, step: u32) -> PilotResult<MultimodalMessage> {
        let provider = self.capture.clone();
        let quality = self.quality;
        let file = tokio::task::spawn_blocking(move || CaptureFile::acquire(provider, quality))
            .await
            .map_err(|e| PilotError::Capture(format!("capture task failed: {e}")))??;

        let request = RequestData::new(objective, step).with_instructions(LOCAL_INSTRUCTIONS);
        build_message(&self.context, &request, MessagePart::ImagePath(file))
    }

    async fn send_to_model(&self, message: &MultimodalMessage) -> PilotResult<RawResponse> {
        let request = self.build_request(message).await?;
        let body = serde_json::to_value(&request)?;

        tracing::debug!(
            model = %self.model,
            endpoint = %self.endpoint(),
            body = %sanitized(&body),
            "local chat request (sanitized, images omitted)"
        );

        let response = self.client.post(self.endpoint()).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let err_body = response.text().await.unwrap_or_default();
            return Err(PilotError::Backend(format!("{}: {}", status, err_body)));
        }

        let json: serde_json::Value = response.json().await?;
        tracing::info!(
            model = %self.model,
            content_len = json["message"]["content"].as_str().map(str::len).unwrap_or(0),
            "local chat response received"
        );
        Ok(RawResponse(json))
    }

    fn response_content<'a>(&self, raw: &'a RawResponse) -> Option<&'a str> {
        raw.0["message"]["content"].as_str()
    }
}

fn sanitized(body: &serde_json::Value) -> String {
    let mut log_body = body.clone();
    if let Some(msgs) = log_body.get_mut("messages").and_then(|m| m.as_array_mut()) {
        for msg in msgs {
            if let Some(images) = msg.get_mut("images").and_then(|i| i.as_array_mut()) {
                for image in images {
                    *image = serde_json::Value::String(OMITTED_IMAGE.to_string());
                }
            }
        }
    }
    serde_json::to_string(&log_body).unwrap_or_default()
}
