//! Mock implementations of core port traits.

use std::sync::{Arc, Mutex, PoisonError};

use emotion_core::domain::{DetectionCandidate, FaceCrop, ImageResult};
use emotion_core::ports::{
    EmotionClassifier, EncodedImage, FaceDetector, ImageSource, ProgressEvent, ProgressSink,
    ResultOutput,
};
use image::RgbImage;

type DetectFn = dyn Fn(u32, u32) -> Vec<DetectionCandidate> + Send + Sync;

/// Scripted `FaceDetector`.
///
/// Returns candidates computed from the raster dimensions it is given and
/// records every call, so tests can check what the detector actually saw.
pub struct MockFaceDetector {
    script: Box<DetectFn>,
    calls: Arc<Mutex<Vec<(u32, u32)>>>,
}

impl MockFaceDetector {
    /// Always returns the same candidates.
    #[must_use]
    pub fn new(candidates: Vec<DetectionCandidate>) -> Self {
        Self::from_fn(move |_, _| candidates.clone())
    }

    /// Never finds a face.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Computes candidates from `(width, height)` of the raster.
    #[must_use]
    pub fn from_fn<F>(script: F) -> Self
    where
        F: Fn(u32, u32) -> Vec<DetectionCandidate> + Send + Sync + 'static,
    {
        Self {
            script: Box::new(script),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Number of `detect` calls so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls().len()
    }

    /// Raster dimensions passed to each `detect` call, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<(u32, u32)> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl FaceDetector for MockFaceDetector {
    fn name(&self) -> &'static str {
        "mock-detector"
    }

    fn detect(&self, raster: &RgbImage) -> anyhow::Result<Vec<DetectionCandidate>> {
        let (width, height) = raster.dimensions();
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((width, height));
        Ok((self.script)(width, height))
    }
}

/// `FaceDetector` that always fails.
pub struct FailingDetector;

impl FaceDetector for FailingDetector {
    fn name(&self) -> &'static str {
        "failing-detector"
    }

    fn detect(&self, _raster: &RgbImage) -> anyhow::Result<Vec<DetectionCandidate>> {
        anyhow::bail!("detector backend unavailable")
    }
}

/// How [`MockEmotionClassifier`] builds its scores.
enum ScoreScript {
    /// One logit row per crop, cycling through the rows.
    Rows(Vec<Vec<f32>>),
    /// Exactly these rows, regardless of batch size.
    Fixed(Vec<Vec<f32>>),
}

/// Scripted `EmotionClassifier`.
///
/// Records the size of every batch it receives.
pub struct MockEmotionClassifier {
    script: ScoreScript,
    batches: Arc<Mutex<Vec<usize>>>,
}

impl MockEmotionClassifier {
    /// Returns `rows[i % rows.len()]` for the i-th crop of each batch.
    #[must_use]
    pub fn with_rows(rows: Vec<Vec<f32>>) -> Self {
        Self {
            script: ScoreScript::Rows(rows),
            batches: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Gives every crop a logit of `logit` for class `peak` and zero
    /// elsewhere, over `num_classes` classes.
    #[must_use]
    pub fn peaked(num_classes: usize, peak: usize, logit: f32) -> Self {
        Self::with_rows(vec![peaked_row(num_classes, peak, logit)])
    }

    /// Returns `rows` verbatim for every call, whatever the batch size.
    ///
    /// Useful for exercising malformed classifier output.
    #[must_use]
    pub fn fixed(rows: Vec<Vec<f32>>) -> Self {
        Self {
            script: ScoreScript::Fixed(rows),
            batches: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Number of `infer` calls so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.batch_sizes().len()
    }

    /// Batch size of each `infer` call, in order.
    #[must_use]
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl EmotionClassifier for MockEmotionClassifier {
    fn name(&self) -> &'static str {
        "mock-classifier"
    }

    fn infer(&self, batch: &[FaceCrop]) -> anyhow::Result<Vec<Vec<f32>>> {
        self.batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(batch.len());

        Ok(match &self.script {
            ScoreScript::Rows(rows) if rows.is_empty() => Vec::new(),
            ScoreScript::Rows(rows) => (0..batch.len())
                .map(|i| rows[i % rows.len()].clone())
                .collect(),
            ScoreScript::Fixed(rows) => rows.clone(),
        })
    }
}

/// `EmotionClassifier` that always fails.
pub struct FailingClassifier;

impl EmotionClassifier for FailingClassifier {
    fn name(&self) -> &'static str {
        "failing-classifier"
    }

    fn infer(&self, _batch: &[FaceCrop]) -> anyhow::Result<Vec<Vec<f32>>> {
        anyhow::bail!("classifier backend unavailable")
    }
}

/// A logit row with `logit` at `peak` and zero elsewhere.
#[must_use]
pub fn peaked_row(num_classes: usize, peak: usize, logit: f32) -> Vec<f32> {
    (0..num_classes)
        .map(|i| if i == peak { logit } else { 0.0 })
        .collect()
}

/// Mock implementation of `ImageSource` for testing.
///
/// Yields pre-built images and tracks iteration for assertions.
pub struct MockImageSource {
    images: Vec<EncodedImage>,
    iteration_count: Arc<Mutex<usize>>,
}

impl MockImageSource {
    /// Creates a new mock source with the given images.
    #[must_use]
    pub fn new(images: Vec<EncodedImage>) -> Self {
        Self {
            images,
            iteration_count: Arc::new(Mutex::new(0)),
        }
    }

    /// Creates an empty mock source.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(vec![])
    }

    /// Returns the number of times the source has been iterated.
    #[must_use]
    pub fn iteration_count(&self) -> usize {
        *self
            .iteration_count
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl ImageSource for MockImageSource {
    fn images(&self) -> Box<dyn Iterator<Item = anyhow::Result<EncodedImage>> + Send + '_> {
        *self
            .iteration_count
            .lock()
            .unwrap_or_else(PoisonError::into_inner) += 1;
        Box::new(self.images.iter().cloned().map(Ok))
    }

    fn count_hint(&self) -> Option<usize> {
        Some(self.images.len())
    }
}

/// Mock implementation of `ResultOutput` for testing.
///
/// Captures results for later assertions.
#[derive(Default)]
pub struct MockResultOutput {
    results: Arc<Mutex<Vec<ImageResult>>>,
    flush_count: Arc<Mutex<usize>>,
}

impl MockResultOutput {
    /// Creates a new mock output.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all captured results.
    #[must_use]
    pub fn results(&self) -> Vec<ImageResult> {
        self.results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the number of times `flush()` was called.
    #[must_use]
    pub fn flush_count(&self) -> usize {
        *self
            .flush_count
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl ResultOutput for MockResultOutput {
    fn write(&self, result: &ImageResult) -> anyhow::Result<()> {
        self.results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(result.clone());
        Ok(())
    }

    fn flush(&self) -> anyhow::Result<()> {
        *self
            .flush_count
            .lock()
            .unwrap_or_else(PoisonError::into_inner) += 1;
        Ok(())
    }
}

/// Mock implementation of `ProgressSink` for testing.
///
/// Captures events for later assertions.
#[derive(Default)]
pub struct MockProgressSink {
    events: Arc<Mutex<Vec<ProgressEvent>>>,
}

impl MockProgressSink {
    /// Creates a new mock progress sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all captured events.
    #[must_use]
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the number of `Started` events.
    #[must_use]
    pub fn started_count(&self) -> usize {
        self.count(|e| matches!(e, ProgressEvent::Started { .. }))
    }

    /// Returns the number of `Completed` events.
    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.count(|e| matches!(e, ProgressEvent::Completed { .. }))
    }

    /// Returns the number of `Skipped` events.
    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.count(|e| matches!(e, ProgressEvent::Skipped { .. }))
    }

    /// Returns the final counts from the `Finished` event, if any.
    #[must_use]
    pub fn finished_counts(&self) -> Option<(usize, usize)> {
        self.events().iter().find_map(|e| match e {
            ProgressEvent::Finished { processed, skipped } => Some((*processed, *skipped)),
            _ => None,
        })
    }

    fn count(&self, pred: impl Fn(&ProgressEvent) -> bool) -> usize {
        self.events().iter().filter(|e| pred(e)).count()
    }
}

impl ProgressSink for MockProgressSink {
    fn on_event(&self, event: ProgressEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use emotion_core::domain::{PixelBox, PredictResponse};

    use super::*;

    fn crop() -> FaceCrop {
        FaceCrop::new(image::GrayImage::new(64, 64)).unwrap()
    }

    #[test]
    fn test_mock_detector_records_calls() {
        let detector = MockFaceDetector::from_fn(|w, h| {
            vec![DetectionCandidate::new(
                PixelBox::new(0.0, 0.0, w as f32 / 2.0, h as f32 / 2.0),
                0.99,
            )]
        });

        let found = detector.detect(&RgbImage::new(40, 20)).unwrap();

        assert_eq!(found[0].bbox.width, 20.0);
        assert_eq!(detector.calls(), vec![(40, 20)]);
    }

    #[test]
    fn test_failing_detector() {
        assert!(FailingDetector.detect(&RgbImage::new(4, 4)).is_err());
    }

    #[test]
    fn test_mock_classifier_cycles_rows() {
        let classifier = MockEmotionClassifier::with_rows(vec![vec![1.0, 0.0], vec![0.0, 1.0]]);

        let scores = classifier.infer(&[crop(), crop(), crop()]).unwrap();

        assert_eq!(scores, vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.0]]);
        assert_eq!(classifier.batch_sizes(), vec![3]);
    }

    #[test]
    fn test_fixed_classifier_ignores_batch_size() {
        let classifier = MockEmotionClassifier::fixed(vec![vec![0.0; 8]]);
        assert_eq!(classifier.infer(&[crop(), crop()]).unwrap().len(), 1);
    }

    #[test]
    fn test_peaked_row() {
        assert_eq!(peaked_row(4, 2, 3.0), vec![0.0, 0.0, 3.0, 0.0]);
    }

    #[test]
    fn test_mock_image_source_empty() {
        let source = MockImageSource::empty();
        assert_eq!(source.count_hint(), Some(0));
        assert_eq!(source.images().count(), 0);
        assert_eq!(source.iteration_count(), 1);
    }

    #[test]
    fn test_mock_result_output() {
        let output = MockResultOutput::new();
        let result = ImageResult {
            path: "face.jpg".into(),
            response: PredictResponse::ok(Vec::new()),
        };

        output.write(&result).unwrap();
        output.flush().unwrap();

        assert_eq!(output.results().len(), 1);
        assert_eq!(output.results()[0].path, "face.jpg");
        assert_eq!(output.flush_count(), 1);
    }

    #[test]
    fn test_mock_progress_sink() {
        let sink = MockProgressSink::new();

        sink.on_event(ProgressEvent::Started {
            path: "face.jpg".into(),
            index: 0,
            total: Some(1),
        });
        sink.on_event(ProgressEvent::Finished {
            processed: 1,
            skipped: 0,
        });

        assert_eq!(sink.started_count(), 1);
        assert_eq!(sink.finished_counts(), Some((1, 0)));
    }
}
