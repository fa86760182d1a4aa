//! Synthetic image builders for testing.

use std::io::Cursor;

use emotion_core::domain::{DetectionCandidate, PixelBox};
use emotion_core::ports::EncodedImage;
use image::{ImageFormat, Rgb, RgbImage};

/// Builder for synthetic rasters and their encoded bytes.
///
/// Faces are stand-ins: a lighter rectangle on a darker background, with the
/// matching detector candidate returned alongside so mocks can "find" it.
pub struct SyntheticImageBuilder;

impl SyntheticImageBuilder {
    /// Creates a single-color raster.
    #[must_use]
    pub fn uniform(width: u32, height: u32, color: [u8; 3]) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb(color))
    }

    /// Creates a left-to-right red ramp over a blue-green background.
    #[must_use]
    pub fn horizontal_gradient(width: u32, height: u32) -> RgbImage {
        let span = width.saturating_sub(1).max(1);
        RgbImage::from_fn(width, height, |x, _| {
            #[allow(clippy::cast_possible_truncation)]
            let red = (u64::from(x) * 255 / u64::from(span)) as u8;
            Rgb([red, 64, 160])
        })
    }

    /// Paints skin-toned rectangles for each box onto a dark background and
    /// returns the raster with a confident candidate per box.
    #[must_use]
    pub fn with_faces(
        width: u32,
        height: u32,
        boxes: &[PixelBox],
    ) -> (RgbImage, Vec<DetectionCandidate>) {
        let mut raster = Self::uniform(width, height, [30, 30, 40]);
        for bbox in boxes {
            paint(&mut raster, bbox, [224, 172, 140]);
        }
        let candidates = boxes
            .iter()
            .map(|b| DetectionCandidate::new(*b, 0.99))
            .collect();
        (raster, candidates)
    }

    /// A 1000x800 portrait with one face at `(385, 124, 200, 300)`.
    #[must_use]
    pub fn portrait() -> (RgbImage, Vec<DetectionCandidate>) {
        Self::with_faces(1000, 800, &[PixelBox::new(385.0, 124.0, 200.0, 300.0)])
    }

    /// A 900x600 group shot with four faces in a row.
    #[must_use]
    pub fn group() -> (RgbImage, Vec<DetectionCandidate>) {
        let boxes: Vec<PixelBox> = (0..4_u8)
            .map(|i| PixelBox::new(40.0 + f32::from(i) * 220.0, 150.0, 150.0, 200.0))
            .collect();
        Self::with_faces(900, 600, &boxes)
    }

    /// Encodes a raster in the given format.
    ///
    /// # Panics
    ///
    /// Panics if the `image` crate cannot encode the format.
    #[must_use]
    pub fn encode(raster: &RgbImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        raster
            .write_to(&mut buf, format)
            .unwrap_or_else(|e| panic!("encode {format:?}: {e}"));
        buf.into_inner()
    }

    /// Encodes a raster as PNG.
    #[must_use]
    pub fn png(raster: &RgbImage) -> Vec<u8> {
        Self::encode(raster, ImageFormat::Png)
    }

    /// Encodes a raster as JPEG.
    #[must_use]
    pub fn jpeg(raster: &RgbImage) -> Vec<u8> {
        Self::encode(raster, ImageFormat::Jpeg)
    }

    /// Encodes a raster as TIFF.
    #[must_use]
    pub fn tiff(raster: &RgbImage) -> Vec<u8> {
        Self::encode(raster, ImageFormat::Tiff)
    }

    /// Wraps a raster as a PNG-encoded image named `path`.
    #[must_use]
    pub fn encoded(path: &str, raster: &RgbImage) -> EncodedImage {
        EncodedImage::new(path, Self::png(raster))
    }

    /// Bytes that no image decoder accepts.
    #[must_use]
    pub fn not_an_image() -> Vec<u8> {
        b"this is plain text, not an image".to_vec()
    }
}

fn paint(raster: &mut RgbImage, bbox: &PixelBox, color: [u8; 3]) {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let (x0, y0, x1, y1) = (
        bbox.x.max(0.0) as u32,
        bbox.y.max(0.0) as u32,
        (bbox.x + bbox.width).max(0.0) as u32,
        (bbox.y + bbox.height).max(0.0) as u32,
    );
    for y in y0..y1.min(raster.height()) {
        for x in x0..x1.min(raster.width()) {
            raster.put_pixel(x, y, Rgb(color));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_portrait_layout() {
        let (raster, candidates) = SyntheticImageBuilder::portrait();
        assert_eq!(raster.dimensions(), (1000, 800));
        assert_eq!(candidates.len(), 1);
        assert_eq!(raster.get_pixel(400, 200).0, [224, 172, 140]);
        assert_eq!(raster.get_pixel(10, 10).0, [30, 30, 40]);
    }

    #[test]
    fn test_group_has_four_faces_inside_raster() {
        let (raster, candidates) = SyntheticImageBuilder::group();
        assert_eq!(candidates.len(), 4);
        for c in &candidates {
            assert!(c.bbox.x + c.bbox.width <= raster.width() as f32);
            assert!(c.bbox.y + c.bbox.height <= raster.height() as f32);
        }
    }

    #[test]
    fn test_gradient_range() {
        let img = SyntheticImageBuilder::horizontal_gradient(256, 4);
        assert_eq!(img.get_pixel(0, 0).0[0], 0);
        assert_eq!(img.get_pixel(255, 0).0[0], 255);
    }

    #[test]
    fn test_encoded_formats_have_magic_bytes() {
        let raster = SyntheticImageBuilder::uniform(8, 8, [1, 2, 3]);
        assert!(SyntheticImageBuilder::png(&raster).starts_with(b"\x89PNG"));
        assert!(SyntheticImageBuilder::jpeg(&raster).starts_with(&[0xFF, 0xD8]));
        let tiff = SyntheticImageBuilder::tiff(&raster);
        assert!(tiff.starts_with(b"II") || tiff.starts_with(b"MM"));
    }
}
