//! Screenshot saving.
//!
//! Writes readback data from the renderer to an image file.

use std::path::Path;

use image::{ImageBuffer, Rgba};
use tracing::info;

/// Save RGBA pixel data to an image file.
///
/// # Arguments
/// * `data` - Raw RGBA pixel data (4 bytes per pixel)
/// * `width` - Image width in pixels
/// * `height` - Image height in pixels
/// * `path` - Output file path (format determined by extension)
pub fn save_screenshot(
    data: Vec<u8>,
    width: u32,
    height: u32,
    path: impl AsRef<Path>,
) -> Result<(), ScreenshotError> {
    let path = path.as_ref();

    let image = ImageBuffer::<Rgba<u8>, _>::from_raw(width, height, data)
        .ok_or(ScreenshotError::InvalidImageData)?;

    image
        .save(path)
        .map_err(|e| ScreenshotError::SaveFailed(e.to_string()))?;

    info!("Screenshot saved: {}", path.display());
    Ok(())
}

/// Errors that can occur during screenshot capture.
#[derive(Debug)]
pub enum ScreenshotError {
    /// Pixel data was invalid or wrong size.
    InvalidImageData,
    /// Failed to save image to file.
    SaveFailed(String),
}

impl std::fmt::Display for ScreenshotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidImageData => write!(f, "Invalid image data"),
            Self::SaveFailed(e) => write!(f, "Failed to save screenshot: {e}"),
        }
    }
}

impl std::error::Error for ScreenshotError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrong_size_data_is_rejected() {
        let result = save_screenshot(vec![0u8; 7], 4, 4, "unused.png");
        assert!(matches!(result, Err(ScreenshotError::InvalidImageData)));
    }
}
