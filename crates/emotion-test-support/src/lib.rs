//! Test support utilities for the emotion pipeline.
//!
//! Provides scripted detector/classifier mocks, port mocks, and synthetic
//! image builders.
//!
//! # Example
//!
//! ```
//! use emotion_test_support::{MockEmotionClassifier, MockFaceDetector, SyntheticImageBuilder};
//!
//! // A portrait raster plus the candidate a detector should report for it
//! let (raster, candidates) = SyntheticImageBuilder::portrait();
//! let detector = MockFaceDetector::new(candidates);
//!
//! // Every face scores highest on class 1
//! let classifier = MockEmotionClassifier::peaked(8, 1, 5.0);
//! # let _ = (raster, detector, classifier);
//! ```

mod builders;
mod mocks;

pub use builders::SyntheticImageBuilder;
pub use mocks::{
    peaked_row, FailingClassifier, FailingDetector, MockEmotionClassifier, MockFaceDetector,
    MockImageSource, MockProgressSink, MockResultOutput,
};
