use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{PilotError, PilotResult};
use crate::llm::prompt::DEFAULT_CONTEXT;

pub const ENV_API_KEY: &str = "OPEN_PILOT_API_KEY";
pub const ENV_MODEL: &str = "OPEN_PILOT_MODEL";
pub const ENV_BASE_URL: &str = "OPEN_PILOT_BASE_URL";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub agent: AgentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model identifier, must be one of the identifiers known to the factory.
    #[serde(default = "default_model_name")]
    pub name: String,
    /// Endpoint root. When absent the backend's own default is used.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Credential for hosted endpoints (falls back to env var OPEN_PILOT_API_KEY).
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Replaces the built-in instruction block when set.
    #[serde(default)]
    pub context_file: Option<PathBuf>,
    /// Send the system-role preamble on the local chat protocol.
    #[serde(default = "default_true")]
    pub system_preamble: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model_name(),
            base_url: None,
            api_key: None,
            max_tokens: default_max_tokens(),
            context_file: None,
            system_preamble: true,
        }
    }
}

impl ModelConfig {
    /// Reads the fixed context block sent with every prompt.
    pub fn load_context(&self) -> PilotResult<String> {
        match &self.context_file {
            Some(path) => {
                let context = std::fs::read_to_string(path).map_err(|e| {
                    PilotError::Config(format!("cannot read context file {}: {e}", path.display()))
                })?;
                tracing::debug!(path = %path.display(), len = context.len(), "context loaded from file");
                Ok(context)
            }
            None => Ok(DEFAULT_CONTEXT.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// JPEG quality, 1-100.
    #[serde(default = "default_quality")]
    pub quality: u8,
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            quality: default_quality(),
            dir: None,
        }
    }
}

impl CaptureConfig {
    /// Directory that receives temporary screenshots.
    pub fn resolved_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("open-pilot")
                .join("captures")
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
    #[serde(default = "default_max_failures")]
    pub max_consecutive_failures: u32,
    /// Pause between steps so the screen can settle before the next capture.
    #[serde(default = "default_step_delay")]
    pub step_delay_ms: u64,
    /// Write a JSONL session history.
    #[serde(default)]
    pub history: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            max_consecutive_failures: default_max_failures(),
            step_delay_ms: default_step_delay(),
            history: false,
        }
    }
}

fn default_model_name() -> String {
    "x/llama3.2-vision:latest".to_string()
}

fn default_max_tokens() -> u32 {
    10_000
}

fn default_true() -> bool {
    true
}

fn default_quality() -> u8 {
    85
}

fn default_max_steps() -> u32 {
    25
}

fn default_max_failures() -> u32 {
    3
}

fn default_step_delay() -> u64 {
    500
}

impl AppConfig {
    /// Applies overrides from a variable lookup (the process environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(name) = lookup(ENV_MODEL).filter(|v| !v.is_empty()) {
            tracing::debug!(model = %name, "model overridden from environment");
            self.model.name = name;
        }
        if let Some(url) = lookup(ENV_BASE_URL).filter(|v| !v.is_empty()) {
            self.model.base_url = Some(url);
        }
        if let Some(key) = lookup(ENV_API_KEY).filter(|v| !v.is_empty()) {
            self.model.api_key = Some(key);
        }
    }
}

fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join("config.toml");
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Some(candidate);
            }
        }
    }

    let candidate = std::env::current_dir().ok()?.join("config.toml");
    if candidate.exists() {
        tracing::debug!(path = %candidate.display(), "config found in working directory");
        return Some(candidate);
    }
    None
}

pub fn load_from_path(path: &Path) -> PilotResult<AppConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| PilotError::Config(format!("cannot read {}: {e}", path.display())))?;
    let config: AppConfig = toml::from_str(&content)?;
    tracing::info!(path = %path.display(), model = %config.model.name, "config loaded");
    Ok(config)
}

/// Loads `explicit` if given, otherwise searches the usual locations and falls back to
/// defaults. Environment overrides are applied last.
pub fn load_config(explicit: Option<&Path>) -> PilotResult<AppConfig> {
    let mut config = match explicit.map(Path::to_path_buf).or_else(resolve_config_path) {
        Some(path) => load_from_path(&path)?,
        None => {
            tracing::info!("no config.toml found, using defaults");
            AppConfig::default()
        }
    };
    config.apply_overrides(|key| std::env::var(key).ok());
    Ok(config)
}
