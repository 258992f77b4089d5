use std::path::{Path, PathBuf};

use crate::errors::PilotResult;

/// Source of screen images for the prompt.
/// Two implementations: live primary-monitor capture and a fixed image.
pub trait ScreenCapture: Send + Sync {
    /// Writes a JPEG of the current screen and returns its absolute path.
    fn capture_to_file(&self, quality: u8) -> PilotResult<PathBuf>;

    /// Current screen as base64-encoded JPEG.
    fn capture_as_encoded_payload(&self, quality: u8) -> PilotResult<String>;

    fn delete_capture(&self, path: &Path) -> PilotResult<()> {
        if path.exists() {
            std::fs::remove_file(path)?;
            tracing::debug!(path = %path.display(), "deleted screenshot file");
        } else {
            tracing::debug!(path = %path.display(), "no screenshot file to delete");
        }
        Ok(())
    }
}
