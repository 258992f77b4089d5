use thiserror::Error;

#[derive(Debug, Error)]
pub enum PilotError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unsupported model type {0}. Add an entry to ModelKind")]
    UnsupportedModel(String),

    #[error("Model backend error: {0}")]
    Backend(String),

    #[error("Screen capture error: {0}")]
    Capture(String),

    #[error("Executor error: {0}")]
    Executor(String),

    #[error("Action plan error: {0}")]
    Plan(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl serde::Serialize for PilotError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

pub type PilotResult<T> = Result<T, PilotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_model_names_the_identifier() {
        let err = PilotError::UnsupportedModel("unknown-model".into());
        assert!(err.to_string().contains("unknown-model"));
    }

    #[test]
    fn serializes_as_display_string() {
        let err = PilotError::Backend("connection refused".into());
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(json, "\"Model backend error: connection refused\"");
    }
}
