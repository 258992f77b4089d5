pub mod agent_engine;
pub mod config;
pub mod errors;
pub mod executor;
pub mod llm;
pub mod perception;

use std::path::Path;
use std::sync::Arc;

use crate::agent_engine::engine::AgentEngine;
use crate::agent_engine::history::SessionHistory;
use crate::agent_engine::state::LoopConfig;
use crate::config::AppConfig;
use crate::errors::PilotResult;
use crate::executor::input::DryRunDriver;
use crate::llm::backend::ModelBackend;
use crate::llm::factory::{create_model, ModelArgs};
use crate::perception::screenshot::{StaticCapture, XcapScreen};
use crate::perception::traits::ScreenCapture;

/// Installs the global subscriber. `RUST_LOG` overrides the default `info` filter.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();
}

/// Live screen capture, or a fixed image when `static_image` is given.
pub fn capture_provider(
    config: &AppConfig,
    static_image: Option<&Path>,
) -> PilotResult<Arc<dyn ScreenCapture>> {
    let dir = config.capture.resolved_dir();
    Ok(match static_image {
        Some(image) => {
            tracing::info!(image = %image.display(), "using static screen image");
            Arc::new(StaticCapture::from_file(image, dir)?)
        }
        None => Arc::new(XcapScreen::new(dir)),
    })
}

/// Builds the configured backend; an unknown model name fails here.
pub fn build_backend(
    config: &AppConfig,
    capture: Arc<dyn ScreenCapture>,
) -> PilotResult<Box<dyn ModelBackend>> {
    let args = ModelArgs::from_config(config, capture)?;
    create_model(&config.model.name, args)
}

/// Engine with the dry-run driver and, if enabled, a session history.
pub fn build_engine(config: &AppConfig, backend: Box<dyn ModelBackend>) -> PilotResult<AgentEngine> {
    let engine = AgentEngine::new(
        backend,
        Box::new(DryRunDriver),
        LoopConfig::from(&config.agent),
    );
    if config.agent.history {
        let history = SessionHistory::in_data_dir()?;
        tracing::info!(session = %history.session_id, path = %history.file_path().display(), "recording session history");
        return Ok(engine.with_history(history));
    }
    Ok(engine)
}
