//! The inference pipeline: bytes in, ranked per-face predictions out.
//!
//! Stages run in a fixed order:
//! decode, scale, detect, extract, classify, post-process.
//! [`run_batch`] drives the pipeline over an [`ImageSource`](crate::ports::ImageSource).
//! Detection and classification are delegated to the [`FaceDetector`] and
//! [`EmotionClassifier`] ports; everything else is deterministic.

mod batch;
mod decode;
mod extract;
mod postprocess;
mod scale;

use std::sync::Arc;

use image::RgbImage;
use tracing::{debug, trace};

use crate::domain::{DetectionCandidate, LabelTable, NormalizedBox, Prediction};
use crate::error::PipelineError;
use crate::ports::{EmotionClassifier, FaceDetector};

pub use batch::{run_batch, BatchSummary};
pub use decode::decode_image;
pub use extract::{ExtractorConfig, FaceRegion, FaceRegionExtractor};
pub use postprocess::{rank_descending, softmax, ResultPostProcessor, DEFAULT_TOP_K};
pub use scale::{scale_to_fit, DEFAULT_MAX_SIDE};

/// Tunable parameters for every deterministic stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineConfig {
    /// Longest side a raster may have before detection.
    pub max_side: u32,
    /// Face filtering and cropping parameters.
    pub extractor: ExtractorConfig,
    /// Emotions reported per face.
    pub top_k: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_side: DEFAULT_MAX_SIDE,
            extractor: ExtractorConfig::default(),
            top_k: DEFAULT_TOP_K,
        }
    }
}

/// Runs the full prediction flow over a detector, a classifier and a label
/// table.
///
/// The pipeline holds no per-request state, so a single instance can serve
/// many threads at once.
pub struct EmotionPipeline {
    detector: Box<dyn FaceDetector>,
    classifier: Box<dyn EmotionClassifier>,
    labels: Arc<LabelTable>,
    max_side: u32,
    extractor: FaceRegionExtractor,
    postprocessor: ResultPostProcessor,
}

impl EmotionPipeline {
    /// Assembles a pipeline from its capabilities and settings.
    #[must_use]
    pub fn new(
        detector: Box<dyn FaceDetector>,
        classifier: Box<dyn EmotionClassifier>,
        labels: Arc<LabelTable>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            detector,
            classifier,
            labels,
            max_side: config.max_side,
            extractor: FaceRegionExtractor::new(config.extractor),
            postprocessor: ResultPostProcessor::new(config.top_k),
        }
    }

    /// The label table shared by every request.
    #[must_use]
    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    /// Predicts emotions for every face in an encoded image.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::InvalidImage`] if the bytes are not a decodable
    ///   image. Neither capability is called in that case.
    /// - [`PipelineError::Detection`] if the detector fails or reports a
    ///   non-finite box or a confidence outside `[0, 1]`.
    /// - [`PipelineError::Inference`] if the classifier fails or returns
    ///   malformed scores.
    pub fn predict(&self, bytes: &[u8]) -> Result<Vec<Prediction>, PipelineError> {
        let raster = decode_image(bytes)?;
        self.predict_raster(raster)
    }

    /// Predicts emotions for an already-decoded raster.
    ///
    /// # Errors
    ///
    /// Same as [`Self::predict`], minus decoding.
    pub fn predict_raster(&self, raster: RgbImage) -> Result<Vec<Prediction>, PipelineError> {
        let raster = scale_to_fit(raster, self.max_side);
        let (width, height) = raster.dimensions();

        let candidates = self
            .detector
            .detect(&raster)
            .map_err(|e| PipelineError::Detection(format!("{e:#}")))?;
        debug!(
            detector = self.detector.name(),
            candidates = candidates.len(),
            width,
            height,
            "Face detection complete"
        );
        check_candidates(&candidates)?;

        let regions = self.extractor.extract(&raster, &candidates);
        if regions.is_empty() {
            debug!("No qualifying faces");
            return Ok(Vec::new());
        }

        let (crops, boxes): (Vec<_>, Vec<NormalizedBox>) = regions
            .into_iter()
            .map(|region| (region.crop, region.detection_box))
            .unzip();

        let scores = self
            .classifier
            .infer(&crops)
            .map_err(|e| PipelineError::Inference(format!("{e:#}")))?;
        trace!(
            classifier = self.classifier.name(),
            faces = crops.len(),
            "Classification complete"
        );

        self.postprocessor.process(&scores, &boxes, &self.labels)
    }
}

/// Rejects detector output that cannot describe a face.
fn check_candidates(candidates: &[DetectionCandidate]) -> Result<(), PipelineError> {
    for (index, candidate) in candidates.iter().enumerate() {
        if !candidate.bbox.is_finite() {
            return Err(PipelineError::Detection(format!(
                "candidate {index} has a non-finite box {:?}",
                candidate.bbox
            )));
        }
        if !(0.0..=1.0).contains(&candidate.confidence) {
            return Err(PipelineError::Detection(format!(
                "candidate {index} has confidence {} outside [0, 1]",
                candidate.confidence
            )));
        }
    }
    Ok(())
}

impl std::fmt::Debug for EmotionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmotionPipeline")
            .field("detector", &self.detector.name())
            .field("classifier", &self.classifier.name())
            .field("labels", &self.labels.len())
            .field("max_side", &self.max_side)
            .field("extractor", self.extractor.config())
            .field("top_k", &self.postprocessor.top_k())
            .finish()
    }
}
