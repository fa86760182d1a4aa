//! Error taxonomy for the inference pipeline.

use thiserror::Error;

/// Errors produced while turning an encoded image into predictions.
///
/// Only [`PipelineError::InvalidImage`] is caused by the caller's input; the
/// remaining variants are server-side faults.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The input bytes could not be decoded as a supported raster image.
    #[error(
        "invalid image: {0}. Please provide a valid image (supported formats: JPEG, PNG, TIFF)"
    )]
    InvalidImage(String),

    /// The face detector failed or returned malformed output.
    #[error("face detection failed: {0}")]
    Detection(String),

    /// The emotion classifier failed or returned malformed output.
    #[error("emotion inference failed: {0}")]
    Inference(String),

    /// A label table could not be built from its source entries.
    #[error("invalid label table: {0}")]
    InvalidLabels(String),
}

impl PipelineError {
    /// Returns true when the error should be reported as a client error
    /// (bad input) rather than an internal fault.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidImage(_))
    }
}
