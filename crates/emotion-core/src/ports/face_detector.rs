//! Face detection capability.

use std::sync::Arc;

use image::RgbImage;

use crate::domain::DetectionCandidate;

/// Port for locating candidate faces in a raster.
///
/// Implementations are shared between concurrent requests, so `detect`
/// takes `&self` and must not rely on per-call mutable state.
pub trait FaceDetector: Send + Sync {
    /// Returns a short name for logging.
    fn name(&self) -> &'static str;

    /// Detects candidate faces.
    ///
    /// Boxes are in pixel coordinates of `raster`. Candidates are returned
    /// unfiltered; confidence thresholding is the caller's job.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying detector fails.
    fn detect(&self, raster: &RgbImage) -> anyhow::Result<Vec<DetectionCandidate>>;
}

impl<T: FaceDetector + ?Sized> FaceDetector for Arc<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn detect(&self, raster: &RgbImage) -> anyhow::Result<Vec<DetectionCandidate>> {
        (**self).detect(raster)
    }
}
