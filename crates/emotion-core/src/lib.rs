//! Emotion Core - Domain types, ports and the inference pipeline
//!
//! This crate turns an encoded image into per-face emotion predictions:
//! decoding, scaling, face detection, crop extraction, batched
//! classification and softmax ranking. Detection and classification sit
//! behind the [`FaceDetector`] and [`EmotionClassifier`] ports, with candle
//! implementations in [`inference`].

pub mod domain;
pub mod error;
pub mod inference;
pub mod pipeline;
pub mod ports;

pub use domain::{
    DetectionCandidate, EmotionScore, FaceCrop, ImageResult, LabelTable, LabelsResponse,
    ModelLabel, ModelMetadata, NormalizedBox, PixelBox, PredictResponse, Prediction,
    ResponseStatus,
};
pub use error::PipelineError;
pub use pipeline::{run_batch, BatchSummary, EmotionPipeline, PipelineConfig};
pub use ports::{
    EmotionClassifier, EncodedImage, FaceDetector, ImageSource, ProgressEvent, ProgressSink,
    ResultOutput,
};
