//! Face region extraction: confidence filtering, margin expansion, cropping,
//! resizing and grayscale conversion.

// Pixel geometry mixes float boxes with integer raster coordinates
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, RgbImage};
use tracing::debug;

use crate::domain::{DetectionCandidate, FaceCrop, NormalizedBox, PixelBox};

/// Settings for turning detector candidates into classifier crops.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtractorConfig {
    /// Candidates with confidence at or below this value are discarded.
    pub confidence_threshold: f32,
    /// Fraction of the box width/height added on each side before cropping.
    pub margin: f64,
    /// Keep at most this many faces per image (in detector order).
    pub max_faces: Option<usize>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.95,
            margin: 0.35,
            max_faces: None,
        }
    }
}

/// A retained face: the crop for the classifier and the box reported to the
/// caller.
#[derive(Debug, Clone)]
pub struct FaceRegion {
    /// 64x64 grayscale crop of the expanded face region.
    pub crop: FaceCrop,
    /// Unexpanded detector box, normalized to the raster.
    pub detection_box: NormalizedBox,
    /// Detector confidence.
    pub confidence: f32,
}

/// Inclusive pixel rectangle inside a raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CropRect {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

/// Filters detector candidates and prepares one crop per retained face.
#[derive(Debug, Clone, Default)]
pub struct FaceRegionExtractor {
    config: ExtractorConfig,
}

impl FaceRegionExtractor {
    /// Creates an extractor with the given settings.
    #[must_use]
    pub const fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    /// Returns the extractor settings.
    #[must_use]
    pub const fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Extracts face regions from `raster`, keeping candidate order.
    ///
    /// Zero retained faces is a normal outcome and yields an empty vector.
    #[must_use]
    pub fn extract(
        &self,
        raster: &RgbImage,
        candidates: &[DetectionCandidate],
    ) -> Vec<FaceRegion> {
        let (width, height) = raster.dimensions();
        let limit = self.config.max_faces.unwrap_or(usize::MAX);
        let mut regions = Vec::new();

        for candidate in candidates {
            if regions.len() >= limit {
                debug!("Face limit of {limit} reached, ignoring remaining candidates");
                break;
            }

            let threshold = self.config.confidence_threshold;
            if candidate.confidence.is_nan() || candidate.confidence <= threshold {
                debug!("Skipping low-confidence face: {:.3}", candidate.confidence);
                continue;
            }

            let Some(rect) = expand_box(&candidate.bbox, self.config.margin, width, height) else {
                debug!("Skipping degenerate face box {:?}", candidate.bbox);
                continue;
            };

            let crop = crop_face(raster, rect);
            regions.push(FaceRegion {
                crop,
                detection_box: NormalizedBox::from_pixels(&candidate.bbox, width, height),
                confidence: candidate.confidence,
            });
        }

        debug!(
            "Retained {} of {} face candidates",
            regions.len(),
            candidates.len()
        );
        regions
    }
}

/// Grows `bbox` by `margin` on every side and clamps it to the raster.
///
/// Returns `None` when nothing of the expanded box lies inside the raster.
fn expand_box(bbox: &PixelBox, margin: f64, width: u32, height: u32) -> Option<CropRect> {
    if !bbox.is_finite() || width == 0 || height == 0 {
        return None;
    }

    let x = f64::from(bbox.x);
    let y = f64::from(bbox.y);
    let w = f64::from(bbox.width);
    let h = f64::from(bbox.height);

    let x1 = ((x - margin * w).trunc() as i64).max(0);
    let y1 = ((y - margin * h).trunc() as i64).max(0);
    let x2 = ((x + w + margin * w).trunc() as i64).min(i64::from(width) - 1);
    let y2 = ((y + h + margin * h).trunc() as i64).min(i64::from(height) - 1);

    if x2 < x1 || y2 < y1 {
        return None;
    }

    Some(CropRect {
        x: x1 as u32,
        y: y1 as u32,
        width: (x2 - x1 + 1) as u32,
        height: (y2 - y1 + 1) as u32,
    })
}

/// Crops, resizes to the classifier input size and converts to luminance.
fn crop_face(raster: &RgbImage, rect: CropRect) -> FaceCrop {
    let size = FaceCrop::SIZE;
    let region = imageops::crop_imm(raster, rect.x, rect.y, rect.width, rect.height).to_image();

    // Each axis is box-averaged when shrinking and interpolated when enlarging
    let height = region.height();
    let columns = if region.width() >= size {
        imageops::thumbnail(&region, size, height)
    } else {
        imageops::resize(&region, size, height, FilterType::Triangle)
    };
    let resized = if height >= size {
        imageops::thumbnail(&columns, size, size)
    } else {
        imageops::resize(&columns, size, size, FilterType::Triangle)
    };

    let gray = GrayImage::from_fn(size, size, |x, y| {
        let [r, g, b] = resized.get_pixel(x, y).0;
        Luma([luminance(r, g, b)])
    });

    FaceCrop::from_square(gray)
}

/// ITU-R BT.601 luma.
fn luminance(r: u8, g: u8, b: u8) -> u8 {
    let y = 0.114f32.mul_add(
        f32::from(b),
        0.299f32.mul_add(f32::from(r), 0.587 * f32::from(g)),
    );
    y.round().clamp(0.0, 255.0) as u8
}
