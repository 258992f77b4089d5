use serde::{Deserialize, Serialize};

use crate::perception::screenshot::CaptureFile;

/// Placeholder written over image payloads before a request body is logged.
pub const OMITTED_IMAGE: &str = "<omitted_image>";

// ── Backend-neutral message ─────────────────────────────────────────────────

/// One prompt for one step: text parts plus the screen image, in order.
#[derive(Debug)]
pub struct MultimodalMessage {
    pub parts: Vec<MessagePart>,
}

#[derive(Debug)]
pub enum MessagePart {
    Text(String),
    /// Capture on disk. The file is removed when the part is dropped.
    ImagePath(CaptureFile),
    /// `data:image/jpeg;base64,...`
    ImageDataUri(String),
}

impl MultimodalMessage {
    /// Concatenation of all text parts.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                MessagePart::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Log-safe rendering: paths are kept, embedded image data is not.
    pub fn redacted(&self) -> serde_json::Value {
        let parts: Vec<serde_json::Value> = self
            .parts
            .iter()
            .map(|p| match p {
                MessagePart::Text(text) => serde_json::json!({ "type": "text", "text": text }),
                MessagePart::ImagePath(file) => serde_json::json!({
                    "type": "image_path",
                    "image_path": file.path().display().to_string(),
                }),
                MessagePart::ImageDataUri(_) => serde_json::json!({
                    "type": "image_url",
                    "image_url": { "url": OMITTED_IMAGE },
                }),
            })
            .collect();
        serde_json::Value::Array(parts)
    }
}

/// Backend response envelope, kept as JSON until the variant extracts its content.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawResponse(pub serde_json::Value);

impl RawResponse {
    /// Stand-in for a failed call; every variant extracts no content from it.
    pub fn empty() -> Self {
        Self(serde_json::Value::Null)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_null()
    }
}

// ── Hosted chat-completions wire format ─────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: MessageContent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
}

// ── Local multimodal chat wire format ───────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalChatMessage {
    pub role: String,
    pub content: String,
    /// Base64 images, without a data-URI prefix.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LocalChatRequest {
    pub model: String,
    pub messages: Vec<LocalChatMessage>,
    pub stream: bool,
}
