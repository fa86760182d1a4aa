//! Core domain types for facial emotion prediction.

mod detection;
mod labels;
mod metadata;
mod prediction;

pub use detection::{DetectionCandidate, FaceCrop, NormalizedBox, PixelBox};
pub use labels::{LabelTable, LabelsResponse, ModelLabel};
pub use metadata::ModelMetadata;
pub use prediction::{EmotionScore, ImageResult, PredictResponse, Prediction, ResponseStatus};
