use std::str::FromStr;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::errors::{PilotError, PilotResult};
use crate::llm::backend::{BackendVariant, ModelBackend};
use crate::llm::backends::ollama::{self, OllamaBackend};
use crate::llm::backends::openai_compatible::{self, OpenAiCompatibleBackend};
use crate::llm::prompt::SAFETY_PREAMBLE;
use crate::perception::traits::ScreenCapture;

/// Models the factory knows how to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Gpt4o,
    Gpt4Vision,
    LlamaVision,
}

impl ModelKind {
    pub const IDENTIFIERS: &'static [&'static str] = &[
        "gpt-4o",
        "gpt-4-vision-preview",
        "gpt-4-turbo",
        "x/llama3.2-vision:latest",
    ];

    pub fn variant(self) -> BackendVariant {
        match self {
            ModelKind::Gpt4o | ModelKind::Gpt4Vision => BackendVariant::HostedChatCompletions,
            ModelKind::LlamaVision => BackendVariant::LocalChat,
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self.variant() {
            BackendVariant::HostedChatCompletions => openai_compatible::DEFAULT_API_BASE,
            BackendVariant::LocalChat => ollama::DEFAULT_BASE_URL,
        }
    }
}

impl FromStr for ModelKind {
    type Err = PilotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gpt-4o" => Ok(ModelKind::Gpt4o),
            "gpt-4-vision-preview" | "gpt-4-turbo" => Ok(ModelKind::Gpt4Vision),
            "x/llama3.2-vision:latest" => Ok(ModelKind::LlamaVision),
            other => Err(PilotError::UnsupportedModel(other.to_string())),
        }
    }
}

/// Constructor arguments shared by every backend.
pub struct ModelArgs {
    /// Endpoint root; the variant's default when `None`.
    pub base_url: Option<String>,
    pub api_key: String,
    pub context: String,
    pub max_tokens: u32,
    pub system_preamble: bool,
    pub capture: Arc<dyn ScreenCapture>,
    pub quality: u8,
}

impl ModelArgs {
    pub fn new(context: impl Into<String>, capture: Arc<dyn ScreenCapture>) -> Self {
        Self {
            base_url: None,
            api_key: String::new(),
            context: context.into(),
            max_tokens: openai_compatible::DEFAULT_MAX_TOKENS,
            system_preamble: true,
            capture,
            quality: crate::perception::screenshot::DEFAULT_QUALITY,
        }
    }

    pub fn from_config(config: &AppConfig, capture: Arc<dyn ScreenCapture>) -> PilotResult<Self> {
        Ok(Self {
            base_url: config.model.base_url.clone(),
            api_key: config.model.api_key.clone().unwrap_or_default(),
            context: config.model.load_context()?,
            max_tokens: config.model.max_tokens,
            system_preamble: config.model.system_preamble,
            capture,
            quality: config.capture.quality,
        })
    }
}

/// Builds the backend for `model_name`. Unknown names fail with
/// [`PilotError::UnsupportedModel`].
pub fn create_model(model_name: &str, args: ModelArgs) -> PilotResult<Box<dyn ModelBackend>> {
    let kind: ModelKind = model_name.parse()?;
    let base_url = args
        .base_url
        .unwrap_or_else(|| kind.default_base_url().to_string());

    tracing::info!(model = model_name, ?kind, base_url = %base_url, "creating model backend");

    let backend: Box<dyn ModelBackend> = match kind.variant() {
        BackendVariant::HostedChatCompletions => Box::new(
            OpenAiCompatibleBackend::new(
                model_name.to_string(),
                base_url,
                args.api_key,
                args.context,
                args.capture,
            )
            .with_max_tokens(args.max_tokens)
            .with_quality(args.quality),
        ),
        BackendVariant::LocalChat => {
            let backend = OllamaBackend::new(
                model_name.to_string(),
                base_url,
                args.context,
                args.capture,
                args.quality,
            );
            if args.system_preamble {
                Box::new(backend.with_preamble(SAFETY_PREAMBLE))
            } else {
                Box::new(backend)
            }
        }
    };
    Ok(backend)
}
