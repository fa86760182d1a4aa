//! Decoding of encoded image bytes into RGB rasters.

use image::{DynamicImage, RgbImage};
use tracing::trace;

use crate::error::PipelineError;

/// Decodes an encoded image into an 8-bit RGB raster.
///
/// The format is sniffed from the content, not from any file name. Gray,
/// alpha, 16-bit and palette sources are converted to RGB.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidImage`] if the bytes are not a supported
/// image or decode to an empty raster.
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage, PipelineError> {
    let image = image::load_from_memory(bytes)
        .map_err(|e| PipelineError::InvalidImage(e.to_string()))?;

    if image.width() == 0 || image.height() == 0 {
        return Err(PipelineError::InvalidImage(
            "image has zero width or height".into(),
        ));
    }

    trace!(
        "Decoded {}x{} image ({:?})",
        image.width(),
        image.height(),
        image.color()
    );

    Ok(match image {
        DynamicImage::ImageRgb8(rgb) => rgb,
        other => other.to_rgb8(),
    })
}
