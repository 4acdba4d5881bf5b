//! Screenshot capture.

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as Base64Standard;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{BestEffort, Error, Result};
use crate::protocol::{Command, PageCommand};

use super::ConnectionManager;

// ============================================================================
// Types
// ============================================================================

/// Image format for screenshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageFormat {
    /// PNG format (lossless, larger file size).
    #[default]
    Png,
    /// JPEG format with quality (0-100).
    Jpeg(u8),
    /// WebP format with quality (0-100).
    Webp(u8),
}

impl ImageFormat {
    /// Creates PNG format.
    #[inline]
    #[must_use]
    pub fn png() -> Self {
        Self::Png
    }

    /// Creates JPEG format with quality (0-100).
    #[inline]
    #[must_use]
    pub fn jpeg(quality: u8) -> Self {
        Self::Jpeg(quality.min(100))
    }

    /// Creates WebP format with quality (0-100).
    #[inline]
    #[must_use]
    pub fn webp(quality: u8) -> Self {
        Self::Webp(quality.min(100))
    }

    /// Returns the MIME type for this format.
    #[must_use]
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg(_) => "image/jpeg",
            Self::Webp(_) => "image/webp",
        }
    }

    /// Returns the file extension for this format.
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg(_) => "jpg",
            Self::Webp(_) => "webp",
        }
    }

    /// Returns the format string for the protocol.
    fn format_str(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg(_) => "jpeg",
            Self::Webp(_) => "webp",
        }
    }

    /// Returns the quality value for lossy formats.
    fn quality(&self) -> Option<u8> {
        match self {
            Self::Png => None,
            Self::Jpeg(q) | Self::Webp(q) => Some(*q),
        }
    }
}

/// Capture settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenshotOptions {
    /// Output format.
    pub format: ImageFormat,
    /// Capture content outside the viewport.
    pub capture_beyond_viewport: bool,
    /// Capture from the compositor surface.
    pub from_surface: bool,
}

impl Default for ScreenshotOptions {
    fn default() -> Self {
        Self {
            format: ImageFormat::Png,
            capture_beyond_viewport: false,
            from_surface: true,
        }
    }
}

impl ScreenshotOptions {
    /// Sets the image format.
    #[inline]
    #[must_use]
    pub fn format(mut self, format: ImageFormat) -> Self {
        self.format = format;
        self
    }

    /// Captures the full page instead of the viewport.
    #[inline]
    #[must_use]
    pub fn beyond_viewport(mut self, enabled: bool) -> Self {
        self.capture_beyond_viewport = enabled;
        self
    }

    /// Sets compositor-surface capture.
    #[inline]
    #[must_use]
    pub fn from_surface(mut self, enabled: bool) -> Self {
        self.from_surface = enabled;
        self
    }
}

/// A captured image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Screenshot {
    /// Base64-encoded image bytes.
    pub data: String,
    /// MIME type of the image.
    pub mime_type: String,
}

impl Screenshot {
    /// Decodes the image bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if `data` is not valid base64.
    pub fn decode(&self) -> Result<Vec<u8>> {
        Base64Standard
            .decode(&self.data)
            .map_err(|e| Error::protocol(format!("Failed to decode screenshot: {e}")))
    }

    /// Writes the decoded image to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if decoding or writing fails.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = self.decode()?;
        tokio::fs::write(path.as_ref(), bytes).await?;
        Ok(())
    }
}

// ============================================================================
// ConnectionManager - Screenshot
// ============================================================================

impl ConnectionManager {
    /// Captures the page.
    ///
    /// The page is brought to the front first; failure to do so is ignored.
    ///
    /// # Errors
    ///
    /// Returns a connection error if the capture command fails, or
    /// [`Error::Protocol`] if the result carries no image data.
    pub async fn capture_screenshot(&self, options: ScreenshotOptions) -> Result<Screenshot> {
        debug!(format = ?options.format, "Capturing screenshot");

        self.execute(Command::Page(PageCommand::BringToFront))
            .await
            .best_effort("bring page to front");

        let result = self
            .execute(Command::Page(PageCommand::CaptureScreenshot {
                format: options.format.format_str().to_string(),
                quality: options.format.quality(),
                capture_beyond_viewport: options.capture_beyond_viewport,
                from_surface: options.from_surface,
            }))
            .await?;

        let data = result
            .get("data")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                Error::protocol(format!("Screenshot response missing data field. Got: {result}"))
            })?;

        Ok(Screenshot {
            data: data.to_string(),
            mime_type: options.format.mime_type().to_string(),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::testing::MockConnector;

    #[test]
    fn test_image_format() {
        assert_eq!(ImageFormat::jpeg(150), ImageFormat::Jpeg(100));
        assert_eq!(ImageFormat::webp(40).mime_type(), "image/webp");
        assert_eq!(ImageFormat::Png.quality(), None);
        assert_eq!(ImageFormat::Jpeg(80).format_str(), "jpeg");
        assert_eq!(ImageFormat::Jpeg(80).extension(), "jpg");
    }

    #[test]
    fn test_decode() {
        let shot = Screenshot {
            data: "aGVsbG8=".to_string(),
            mime_type: "image/png".to_string(),
        };
        assert_eq!(shot.decode().expect("decode"), b"hello");

        let broken = Screenshot {
            data: "***".to_string(),
            mime_type: "image/png".to_string(),
        };
        assert!(matches!(broken.decode(), Err(Error::Protocol { .. })));
    }

    #[tokio::test]
    async fn test_save_writes_decoded_bytes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("shot.png");
        let shot = Screenshot {
            data: "aGVsbG8=".to_string(),
            mime_type: "image/png".to_string(),
        };

        shot.save(&path).await.expect("save");
        assert_eq!(std::fs::read(&path).expect("read"), b"hello");
    }

    #[tokio::test]
    async fn test_capture_ignores_bring_to_front_failure() {
        let mock = MockConnector::new();
        mock.fail("Page.bringToFront", "Not supported");
        mock.respond("Page.captureScreenshot", json!({"data": "aGVsbG8="}));
        let manager = ConnectionManager::with_connector(mock.clone(), 10);

        let shot = manager
            .capture_screenshot(ScreenshotOptions::default().format(ImageFormat::jpeg(70)))
            .await
            .expect("capture");

        assert_eq!(shot.mime_type, "image/jpeg");
        assert_eq!(shot.data, "aGVsbG8=");

        let params = mock.last_params("Page.captureScreenshot").expect("sent");
        assert_eq!(
            params,
            json!({"format": "jpeg", "quality": 70, "captureBeyondViewport": false, "fromSurface": true})
        );
    }
}
