use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::Engine as _;

use crate::errors::{PilotError, PilotResult};
use crate::perception::traits::ScreenCapture;

pub const DEFAULT_QUALITY: u8 = 85;

/// Live capture of the primary monitor.
pub struct XcapScreen {
    dir: PathBuf,
}

impl XcapScreen {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn capture_rgb(&self) -> PilotResult<image::RgbImage> {
        let monitors = xcap::Monitor::all().map_err(|e| PilotError::Capture(e.to_string()))?;
        let monitor = monitors
            .iter()
            .find(|m| m.is_primary())
            .or_else(|| monitors.first())
            .ok_or_else(|| PilotError::Capture("no monitor found".into()))?;

        let shot = monitor
            .capture_image()
            .map_err(|e| PilotError::Capture(e.to_string()))?;
        let (width, height) = (shot.width(), shot.height());
        let rgba = image::RgbaImage::from_raw(width, height, shot.into_raw())
            .ok_or_else(|| PilotError::Capture("screenshot buffer has unexpected size".into()))?;

        tracing::debug!(width, height, "primary monitor captured");
        Ok(image::DynamicImage::ImageRgba8(rgba).to_rgb8())
    }
}

impl ScreenCapture for XcapScreen {
    fn capture_to_file(&self, quality: u8) -> PilotResult<PathBuf> {
        let jpeg = encode_jpeg(&self.capture_rgb()?, quality)?;
        write_capture(&self.dir, &jpeg)
    }

    fn capture_as_encoded_payload(&self, quality: u8) -> PilotResult<String> {
        let jpeg = encode_jpeg(&self.capture_rgb()?, quality)?;
        Ok(base64::engine::general_purpose::STANDARD.encode(jpeg))
    }
}

/// Serves the same encoded image on every capture.
pub struct StaticCapture {
    bytes: Vec<u8>,
    dir: PathBuf,
}

impl StaticCapture {
    pub fn new(bytes: Vec<u8>, dir: impl Into<PathBuf>) -> Self {
        Self {
            bytes,
            dir: dir.into(),
        }
    }

    /// Loads any format `image` can decode and re-encodes it as JPEG.
    pub fn from_file(image: &Path, dir: impl Into<PathBuf>) -> PilotResult<Self> {
        let decoded = image::open(image).map_err(|e| {
            PilotError::Capture(format!("cannot load {}: {e}", image.display()))
        })?;
        let jpeg = encode_jpeg(&decoded.to_rgb8(), DEFAULT_QUALITY)?;
        Ok(Self::new(jpeg, dir))
    }
}

impl ScreenCapture for StaticCapture {
    fn capture_to_file(&self, _quality: u8) -> PilotResult<PathBuf> {
        write_capture(&self.dir, &self.bytes)
    }

    fn capture_as_encoded_payload(&self, _quality: u8) -> PilotResult<String> {
        Ok(base64::engine::general_purpose::STANDARD.encode(&self.bytes))
    }
}

/// A capture on disk, deleted through its provider when dropped.
pub struct CaptureFile {
    path: PathBuf,
    provider: Arc<dyn ScreenCapture>,
}

impl CaptureFile {
    pub fn acquire(provider: Arc<dyn ScreenCapture>, quality: u8) -> PilotResult<Self> {
        let path = provider.capture_to_file(quality)?;
        tracing::debug!(path = %path.display(), quality, "screenshot saved");
        Ok(Self { path, provider })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File contents as base64, for protocols that carry images inline.
    pub async fn read_base64(&self) -> PilotResult<String> {
        let bytes = tokio::fs::read(&self.path).await?;
        Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
    }
}

impl Drop for CaptureFile {
    fn drop(&mut self) {
        if let Err(e) = self.provider.delete_capture(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to delete screenshot file");
        }
    }
}

impl std::fmt::Debug for CaptureFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureFile").field("path", &self.path).finish()
    }
}

pub fn to_data_uri(base64_jpeg: &str) -> String {
    format!("data:image/jpeg;base64,{base64_jpeg}")
}

/// Captures the screen as a `data:image/jpeg;base64,...` URI.
pub fn capture_data_uri(provider: &dyn ScreenCapture, quality: u8) -> PilotResult<String> {
    Ok(to_data_uri(&provider.capture_as_encoded_payload(quality)?))
}

fn encode_jpeg(rgb: &image::RgbImage, quality: u8) -> PilotResult<Vec<u8>> {
    let mut out = Vec::new();
    {
        let mut encoder =
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100));
        encoder.encode_image(rgb)?;
    }
    Ok(out)
}

fn write_capture(dir: &Path, bytes: &[u8]) -> PilotResult<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("screenshot-{}.jpg", uuid::Uuid::new_v4()));
    std::fs::write(&path, bytes)?;
    Ok(std::fs::canonicalize(&path)?)
}
