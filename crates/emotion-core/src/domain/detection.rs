//! Face detection types: raw candidates, normalized boxes and classifier crops.

use image::GrayImage;
use serde::{Deserialize, Serialize};

/// Axis-aligned box in pixel coordinates of the raster it was detected on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelBox {
    /// Left edge in pixels.
    pub x: f32,
    /// Top edge in pixels.
    pub y: f32,
    /// Width in pixels.
    pub width: f32,
    /// Height in pixels.
    pub height: f32,
}

impl PixelBox {
    /// Creates a box from its top-left corner and size.
    #[must_use]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Returns true when every coordinate is a finite number.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        [self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// An unfiltered detector output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionCandidate {
    /// Face region in pixel coordinates of the scaled raster.
    pub bbox: PixelBox,
    /// Detector confidence in `[0, 1]`.
    pub confidence: f32,
}

impl DetectionCandidate {
    /// Creates a candidate from a pixel box and a confidence score.
    #[must_use]
    pub const fn new(bbox: PixelBox, confidence: f32) -> Self {
        Self { bbox, confidence }
    }
}

/// Face bounding box as fractions of the scaled raster's dimensions.
///
/// Serializes as `[y_min, x_min, y_max, x_max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct NormalizedBox {
    /// Top edge.
    pub y_min: f64,
    /// Left edge.
    pub x_min: f64,
    /// Bottom edge.
    pub y_max: f64,
    /// Right edge.
    pub x_max: f64,
}

impl NormalizedBox {
    /// Normalizes a pixel box against the raster it was detected on.
    ///
    /// Each component is clamped to `[0, 1]` so boxes that overhang the
    /// raster edge still describe a region inside the image.
    #[must_use]
    pub fn from_pixels(bbox: &PixelBox, raster_width: u32, raster_height: u32) -> Self {
        let w = f64::from(raster_width.max(1));
        let h = f64::from(raster_height.max(1));
        let x = f64::from(bbox.x);
        let y = f64::from(bbox.y);

        Self {
            y_min: unit(y / h),
            x_min: unit(x / w),
            y_max: unit((y + f64::from(bbox.height)) / h),
            x_max: unit((x + f64::from(bbox.width)) / w),
        }
    }

    /// Returns the components in wire order.
    #[must_use]
    pub const fn to_array(self) -> [f64; 4] {
        [self.y_min, self.x_min, self.y_max, self.x_max]
    }

    /// Returns true when every component lies in `[0, 1]`.
    #[must_use]
    pub fn is_unit(&self) -> bool {
        self.to_array().iter().all(|v| (0.0..=1.0).contains(v))
    }
}

fn unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

impl From<[f64; 4]> for NormalizedBox {
    fn from([y_min, x_min, y_max, x_max]: [f64; 4]) -> Self {
        Self {
            y_min,
            x_min,
            y_max,
            x_max,
        }
    }
}

impl From<NormalizedBox> for [f64; 4] {
    fn from(b: NormalizedBox) -> Self {
        b.to_array()
    }
}

/// Fixed-size single-channel face image fed to the classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaceCrop {
    pixels: GrayImage,
}

impl FaceCrop {
    /// Side length of every crop, in pixels.
    pub const SIZE: u32 = 64;

    /// Wraps a grayscale image.
    ///
    /// Returns `None` unless the image is exactly `SIZE` x `SIZE`.
    #[must_use]
    pub fn new(pixels: GrayImage) -> Option<Self> {
        (pixels.dimensions() == (Self::SIZE, Self::SIZE)).then_some(Self { pixels })
    }

    /// Wraps an image the caller has already resized to `SIZE` x `SIZE`.
    pub(crate) fn from_square(pixels: GrayImage) -> Self {
        debug_assert_eq!(pixels.dimensions(), (Self::SIZE, Self::SIZE));
        Self { pixels }
    }

    /// Borrows the underlying grayscale image.
    #[must_use]
    pub const fn image(&self) -> &GrayImage {
        &self.pixels
    }

    /// Raw intensities in row-major order, as `f32` in `0.0..=255.0`.
    #[must_use]
    pub fn intensities(&self) -> Vec<f32> {
        self.pixels.as_raw().iter().map(|&v| f32::from(v)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_box_from_pixels() {
        let bbox = PixelBox::new(385.0, 124.0, 200.0, 300.0);
        let norm = NormalizedBox::from_pixels(&bbox, 1000, 800);

        assert!((norm.y_min - 0.155).abs() < 1e-9);
        assert!((norm.x_min - 0.385).abs() < 1e-9);
        assert!((norm.y_max - 0.53).abs() < 1e-9);
        assert!((norm.x_max - 0.585).abs() < 1e-9);
    }

    #[test]
    fn test_normalized_box_clamps_overhang() {
        let bbox = PixelBox::new(-10.0, -5.0, 120.0, 130.0);
        let norm = NormalizedBox::from_pixels(&bbox, 100, 100);

        assert!(norm.is_unit());
        assert!(norm.x_min.abs() < f64::EPSILON);
        assert!((norm.y_max - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_normalized_box_serializes_as_array() {
        let norm = NormalizedBox::from([0.1, 0.2, 0.3, 0.4]);
        let json = serde_json::to_string(&norm).unwrap_or_default();
        assert_eq!(json, "[0.1,0.2,0.3,0.4]");

        let back: Option<NormalizedBox> = serde_json::from_str(&json).ok();
        assert_eq!(back, Some(norm));
    }

    #[test]
    fn test_face_crop_rejects_wrong_size() {
        assert!(FaceCrop::new(GrayImage::new(32, 64)).is_none());
        assert!(FaceCrop::new(GrayImage::new(64, 64)).is_some());
    }

    #[test]
    fn test_face_crop_intensities_are_raw() {
        let img = GrayImage::from_fn(64, 64, |x, _| image::Luma([if x == 0 { 255 } else { 7 }]));
        let crop = FaceCrop::new(img).unwrap_or_else(|| panic!("64x64 crop"));
        let data = crop.intensities();

        assert_eq!(data.len(), 64 * 64);
        assert!((data[0] - 255.0).abs() < f32::EPSILON);
        assert!((data[1] - 7.0).abs() < f32::EPSILON);
    }
}
