//! Port definitions for hexagonal architecture.
//!
//! These traits define the boundaries between the inference core and the
//! detector/classifier implementations, image sources and output sinks.

mod emotion_classifier;
mod face_detector;
mod image_source;
mod progress;
mod result_output;

pub use emotion_classifier::EmotionClassifier;
pub use face_detector::FaceDetector;
pub use image_source::{EncodedImage, ImageSource};
pub use progress::{ProgressEvent, ProgressSink};
pub use result_output::ResultOutput;
