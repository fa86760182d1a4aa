//! Downscaling of oversized rasters before detection.

use image::imageops::{self, FilterType};
use image::RgbImage;
use tracing::debug;

/// Default bound on the longer side of the raster handed to the detector.
pub const DEFAULT_MAX_SIDE: u32 = 1024;

/// Shrinks `raster` so its longer side is at most `max_side` pixels.
///
/// The aspect ratio is kept; the shorter side is truncated, never below one
/// pixel. Rasters that already fit are returned untouched.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::needless_pass_by_value
)]
pub fn scale_to_fit(raster: RgbImage, max_side: u32) -> RgbImage {
    let max_side = max_side.max(1);
    let (width, height) = raster.dimensions();
    if width <= max_side && height <= max_side {
        return raster;
    }

    let longest = width.max(height);
    let ratio = f64::from(max_side) / f64::from(longest);
    let shrink = |side: u32| ((ratio * f64::from(side)) as u32).clamp(1, max_side);

    let (new_width, new_height) = if width >= height {
        (max_side, shrink(height))
    } else {
        (shrink(width), max_side)
    };

    debug!("Scaling {width}x{height} raster to {new_width}x{new_height}");
    imageops::resize(&raster, new_width, new_height, FilterType::Triangle)
}
