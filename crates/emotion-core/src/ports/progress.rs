//! Progress reporting port for UI integration.

use crate::domain::ImageResult;

/// Events emitted while a batch of images is processed.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Prediction started for an image.
    Started {
        /// Path to the image.
        path: String,
        /// Index in the batch (0-based).
        index: usize,
        /// Total images in batch, if known.
        total: Option<usize>,
    },
    /// Prediction finished for an image (successfully or with an error
    /// response).
    Completed {
        /// The per-image result.
        result: ImageResult,
    },
    /// An image could not be read at all.
    Skipped {
        /// Path to the image.
        path: String,
        /// Reason for skipping.
        reason: String,
    },
    /// All images have been processed.
    Finished {
        /// Images that produced a response.
        processed: usize,
        /// Images that could not be read.
        skipped: usize,
    },
}

/// Port for receiving progress events.
pub trait ProgressSink: Send + Sync {
    /// Called when a progress event occurs.
    fn on_event(&self, event: ProgressEvent);
}
