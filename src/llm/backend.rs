use async_trait::async_trait;

use crate::errors::PilotResult;
use crate::llm::parser::parse_action_plan;
use crate::llm::plan::ActionPlan;
use crate::llm::types::{MultimodalMessage, RawResponse};

/// Wire protocol a backend speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendVariant {
    /// Local multimodal chat (`/api/chat`), image sent from a capture file.
    LocalChat,
    /// Hosted chat completions, image embedded as a data URI.
    HostedChatCompletions,
}

/// One vision model behind one protocol. Every step is stateless: the full context and
/// a fresh screenshot are sent each time.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    fn model_name(&self) -> &str;

    fn variant(&self) -> BackendVariant;

    /// Captures the screen and builds the prompt for `step`.
    async fn format_request(&self, objective: &str, step: u32) -> PilotResult<MultimodalMessage>;

    /// Single call to the endpoint, no retries.
    async fn send_to_model(&self, message: &MultimodalMessage) -> PilotResult<RawResponse>;

    /// Pulls the reply text out of the variant's response envelope.
    fn response_content<'a>(&self, raw: &'a RawResponse) -> Option<&'a str>;

    fn parse_response(&self, raw: &RawResponse) -> ActionPlan {
        let content = self.response_content(raw).unwrap_or_default();
        if content.is_empty() {
            tracing::warn!(model = %self.model_name(), "model response is empty or has no content");
        }
        parse_action_plan(content)
    }

    /// Capture, prompt, call, parse. Transport failures come back as an error plan; only
    /// a failed screen capture is returned as `Err`.
    async fn get_instructions(&self, objective: &str, step: u32) -> PilotResult<ActionPlan> {
        let message = self.format_request(objective, step).await?;
        tracing::debug!(
            model = %self.model_name(),
            step,
            request = %message.redacted(),
            "sending request (images omitted)"
        );

        let raw = match self.send_to_model(&message).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!(model = %self.model_name(), step, error = %e, "model call failed");
                RawResponse::empty()
            }
        };
        // Releases the capture file before parsing.
        drop(message);

        tracing::info!(model = %self.model_name(), step, response = %raw.0, "raw model response");
        Ok(self.parse_response(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::PilotError;
    use crate::llm::types::MessagePart;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogBuffer {
        type Writer = LogBuffer;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    impl LogBuffer {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).to_string()
        }
    }

    struct FixedBackend {
        reply: Option<&'static str>,
    }

    #[async_trait]
    impl ModelBackend for FixedBackend {
        fn model_name(&self) -> &str {
            "fixed"
        }

        fn variant(&self) -> BackendVariant {
            BackendVariant::LocalChat
        }

        async fn format_request(&self, objective: &str, _step: u32) -> PilotResult<MultimodalMessage> {
            Ok(MultimodalMessage {
                parts: vec![MessagePart::Text(objective.to_string())],
            })
        }

        async fn send_to_model(&self, _message: &MultimodalMessage) -> PilotResult<RawResponse> {
            match self.reply {
                Some(content) => Ok(RawResponse(serde_json::json!({ "content": content }))),
                None => Err(PilotError::Backend("connection refused".into())),
            }
        }

        fn response_content<'a>(&self, raw: &'a RawResponse) -> Option<&'a str> {
            raw.0["content"].as_str()
        }
    }

    fn info_subscriber(buffer: &LogBuffer) -> impl tracing::Subscriber + Send + Sync {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(buffer.clone())
            .finish()
    }

    #[tokio::test]
    async fn raw_response_is_logged_at_info() {
        let buffer = LogBuffer::default();
        let _guard = tracing::subscriber::set_default(info_subscriber(&buffer));

        let backend = FixedBackend { reply: Some(r#"{"steps": [], "done": true}"#) };
        let plan = backend.get_instructions("open google", 0).await.unwrap();
        assert!(plan.is_done());

        let logs = buffer.contents();
        assert!(logs.contains("raw model response"), "{logs}");
        assert!(logs.contains("done"), "{logs}");
    }

    #[tokio::test]
    async fn transport_failure_is_logged_and_parsed_as_empty() {
        let buffer = LogBuffer::default();
        let _guard = tracing::subscriber::set_default(info_subscriber(&buffer));

        let backend = FixedBackend { reply: None };
        let plan = backend.get_instructions("open google", 0).await.unwrap();
        assert_eq!(
            plan.to_value(),
            serde_json::json!({ "error": "No JSON object found", "message": "" })
        );

        let logs = buffer.contents();
        assert!(logs.contains("model call failed"), "{logs}");
        assert!(logs.contains("connection refused"), "{logs}");
    }
}
