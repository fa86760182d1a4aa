//! Pipeline integration tests using synthetic images and scripted models.
//!
//! Drives the full batch path (source, pipeline, output, progress) with mock
//! detectors and classifiers, so no model weights are needed.

#![allow(
    clippy::unwrap_used,
    clippy::float_cmp,
    clippy::expect_used,
    clippy::missing_panics_doc
)]

use std::sync::Arc;

use emotion_core::domain::{DetectionCandidate, PixelBox};
use emotion_core::{
    run_batch, EmotionPipeline, LabelTable, PipelineConfig, PipelineError, ResponseStatus,
};
use emotion_test_support::{
    FailingClassifier, FailingDetector, MockEmotionClassifier, MockFaceDetector, MockImageSource,
    MockProgressSink, MockResultOutput, SyntheticImageBuilder,
};

fn pipeline(detector: MockFaceDetector, classifier: MockEmotionClassifier) -> EmotionPipeline {
    EmotionPipeline::new(
        Box::new(detector),
        Box::new(classifier),
        Arc::new(LabelTable::ferplus()),
        PipelineConfig::default(),
    )
}

fn assert_box_near(actual: [f64; 4], expected: [f64; 4]) {
    for (a, e) in actual.iter().zip(expected) {
        assert!((a - e).abs() < 1e-3, "box {actual:?} != {expected:?}");
    }
}

// === Happy Path ===

#[test]
fn test_single_face_is_happiness() {
    let (raster, candidates) = SyntheticImageBuilder::portrait();
    let pipeline = pipeline(
        MockFaceDetector::new(candidates),
        MockEmotionClassifier::peaked(8, 1, 6.0),
    );

    let predictions = pipeline
        .predict(&SyntheticImageBuilder::jpeg(&raster))
        .unwrap();

    assert_eq!(predictions.len(), 1);
    let face = &predictions[0];
    assert_box_near(face.detection_box.to_array(), [0.155, 0.385, 0.53, 0.585]);

    assert_eq!(face.emotion_predictions.len(), 8);
    let top = face.top().unwrap();
    assert_eq!(top.label_id, "1");
    assert_eq!(top.label, "happiness");
    assert!(top.probability > 0.9);

    let total: f64 = face.emotion_predictions.iter().map(|e| e.probability).sum();
    assert!((total - 1.0).abs() < 1e-6);
    for pair in face.emotion_predictions.windows(2) {
        assert!(pair[0].probability >= pair[1].probability);
    }
}

#[test]
fn test_group_photo_one_batch_in_detector_order() {
    let (raster, candidates) = SyntheticImageBuilder::group();
    let classifier = Arc::new(MockEmotionClassifier::with_rows(vec![
        vec![5.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        vec![0.0, 5.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        vec![0.0, 0.0, 5.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        vec![0.0, 0.0, 0.0, 5.0, 0.0, 0.0, 0.0, 0.0],
    ]));
    let pipeline = EmotionPipeline::new(
        Box::new(MockFaceDetector::new(candidates)),
        Box::new(Arc::clone(&classifier)),
        Arc::new(LabelTable::ferplus()),
        PipelineConfig::default(),
    );

    let predictions = pipeline
        .predict(&SyntheticImageBuilder::png(&raster))
        .unwrap();

    assert_eq!(classifier.batch_sizes(), vec![4]);
    let tops: Vec<&str> = predictions
        .iter()
        .map(|p| p.top().unwrap().label.as_str())
        .collect();
    assert_eq!(tops, ["neutral", "happiness", "surprise", "sadness"]);

    let lefts: Vec<f64> = predictions
        .iter()
        .map(|p| p.detection_box.to_array()[1])
        .collect();
    assert!(lefts.windows(2).all(|w| w[0] < w[1]));
    assert!(predictions.iter().all(|p| p.detection_box.is_unit()));
}

#[test]
fn test_oversized_image_is_scaled_before_detection() {
    let (raster, _) = SyntheticImageBuilder::with_faces(2048, 1536, &[]);
    let detector = Arc::new(MockFaceDetector::from_fn(|w, h| {
        #[allow(clippy::cast_precision_loss)]
        let (w, h) = (w as f32, h as f32);
        vec![DetectionCandidate::new(
            PixelBox::new(0.25 * w, 0.25 * h, 0.5 * w, 0.5 * h),
            0.99,
        )]
    }));
    let pipeline = EmotionPipeline::new(
        Box::new(Arc::clone(&detector)),
        Box::new(MockEmotionClassifier::peaked(8, 0, 3.0)),
        Arc::new(LabelTable::ferplus()),
        PipelineConfig::default(),
    );

    let predictions = pipeline
        .predict(&SyntheticImageBuilder::png(&raster))
        .unwrap();

    assert_eq!(detector.calls(), vec![(1024, 768)]);
    assert_box_near(predictions[0].detection_box.to_array(), [0.25, 0.25, 0.75, 0.75]);
}

#[test]
fn test_low_confidence_faces_are_dropped() {
    let (raster, mut candidates) = SyntheticImageBuilder::group();
    candidates[1].confidence = 0.95;
    candidates[3].confidence = 0.5;
    let classifier = Arc::new(MockEmotionClassifier::peaked(8, 4, 2.0));
    let pipeline = EmotionPipeline::new(
        Box::new(MockFaceDetector::new(candidates)),
        Box::new(Arc::clone(&classifier)),
        Arc::new(LabelTable::ferplus()),
        PipelineConfig::default(),
    );

    let predictions = pipeline
        .predict(&SyntheticImageBuilder::png(&raster))
        .unwrap();

    assert_eq!(predictions.len(), 2);
    assert_eq!(classifier.batch_sizes(), vec![2]);
}

// === Empty and Invalid Input ===

#[test]
fn test_no_faces_is_success_without_classification() {
    let raster = SyntheticImageBuilder::horizontal_gradient(320, 240);
    let classifier = Arc::new(MockEmotionClassifier::peaked(8, 0, 1.0));
    let pipeline = EmotionPipeline::new(
        Box::new(MockFaceDetector::empty()),
        Box::new(Arc::clone(&classifier)),
        Arc::new(LabelTable::ferplus()),
        PipelineConfig::default(),
    );

    let predictions = pipeline
        .predict(&SyntheticImageBuilder::png(&raster))
        .unwrap();

    assert!(predictions.is_empty());
    assert_eq!(classifier.call_count(), 0);
}

#[test]
fn test_invalid_bytes_never_reach_the_models() {
    let detector = Arc::new(MockFaceDetector::empty());
    let classifier = Arc::new(MockEmotionClassifier::peaked(8, 0, 1.0));
    let pipeline = EmotionPipeline::new(
        Box::new(Arc::clone(&detector)),
        Box::new(Arc::clone(&classifier)),
        Arc::new(LabelTable::ferplus()),
        PipelineConfig::default(),
    );

    let err = pipeline
        .predict(&SyntheticImageBuilder::not_an_image())
        .unwrap_err();

    assert!(matches!(err, PipelineError::InvalidImage(_)));
    assert!(err.is_client_error());
    assert_eq!(detector.call_count(), 0);
    assert_eq!(classifier.call_count(), 0);
}

#[test]
fn test_empty_bytes_are_invalid() {
    let pipeline = pipeline(
        MockFaceDetector::empty(),
        MockEmotionClassifier::peaked(8, 0, 1.0),
    );
    let err = pipeline.predict(&[]).unwrap_err();
    assert!(matches!(err, PipelineError::InvalidImage(_)));
}

// === Capability Failures ===

#[test]
fn test_detector_failure_is_detection_error() {
    let raster = SyntheticImageBuilder::uniform(64, 64, [128, 128, 128]);
    let pipeline = EmotionPipeline::new(
        Box::new(FailingDetector),
        Box::new(MockEmotionClassifier::peaked(8, 0, 1.0)),
        Arc::new(LabelTable::ferplus()),
        PipelineConfig::default(),
    );

    let err = pipeline
        .predict(&SyntheticImageBuilder::png(&raster))
        .unwrap_err();
    assert!(matches!(err, PipelineError::Detection(_)));
    assert!(!err.is_client_error());
}

#[test]
fn test_malformed_candidates_fail_whole_request() {
    let (raster, _) = SyntheticImageBuilder::portrait();
    let bytes = SyntheticImageBuilder::png(&raster);
    let malformed = [
        vec![
            DetectionCandidate::new(PixelBox::new(f32::NAN, 124.0, 200.0, 300.0), 0.99),
            DetectionCandidate::new(PixelBox::new(385.0, 124.0, 200.0, 300.0), 0.99),
        ],
        vec![DetectionCandidate::new(
            PixelBox::new(385.0, 124.0, 200.0, 300.0),
            7.5,
        )],
        vec![DetectionCandidate::new(
            PixelBox::new(385.0, 124.0, f32::INFINITY, 300.0),
            0.99,
        )],
    ];

    for candidates in malformed {
        let classifier = Arc::new(MockEmotionClassifier::peaked(8, 1, 5.0));
        let pipeline = EmotionPipeline::new(
            Box::new(MockFaceDetector::new(candidates.clone())),
            Box::new(Arc::clone(&classifier)),
            Arc::new(LabelTable::ferplus()),
            PipelineConfig::default(),
        );

        let err = pipeline.predict(&bytes).unwrap_err();
        assert!(
            matches!(err, PipelineError::Detection(_)),
            "{candidates:?} gave {err:?}"
        );
        assert_eq!(classifier.call_count(), 0);
    }
}

#[test]
fn test_classifier_failure_is_inference_error() {
    let (raster, candidates) = SyntheticImageBuilder::portrait();
    let pipeline = EmotionPipeline::new(
        Box::new(MockFaceDetector::new(candidates)),
        Box::new(FailingClassifier),
        Arc::new(LabelTable::ferplus()),
        PipelineConfig::default(),
    );

    let err = pipeline
        .predict(&SyntheticImageBuilder::png(&raster))
        .unwrap_err();
    assert!(matches!(err, PipelineError::Inference(_)));
}

#[test]
fn test_wrong_class_count_is_inference_error() {
    let (raster, candidates) = SyntheticImageBuilder::portrait();
    let pipeline = pipeline(
        MockFaceDetector::new(candidates),
        MockEmotionClassifier::peaked(7, 0, 1.0),
    );

    let err = pipeline
        .predict(&SyntheticImageBuilder::png(&raster))
        .unwrap_err();
    assert!(matches!(err, PipelineError::Inference(_)));
}

#[test]
fn test_wrong_row_count_is_inference_error() {
    let (raster, candidates) = SyntheticImageBuilder::group();
    let pipeline = pipeline(
        MockFaceDetector::new(candidates),
        MockEmotionClassifier::fixed(vec![vec![0.0; 8]]),
    );

    let err = pipeline
        .predict(&SyntheticImageBuilder::png(&raster))
        .unwrap_err();
    assert!(matches!(err, PipelineError::Inference(_)));
}

// === Determinism and Concurrency ===

#[test]
fn test_repeated_requests_are_identical() {
    let (raster, candidates) = SyntheticImageBuilder::group();
    let pipeline = pipeline(
        MockFaceDetector::new(candidates),
        MockEmotionClassifier::with_rows(vec![vec![0.3, 1.2, -0.4, 0.0, 2.2, 0.1, 0.1, -1.0]]),
    );
    let bytes = SyntheticImageBuilder::png(&raster);

    let first = pipeline.predict(&bytes).unwrap();
    let second = pipeline.predict(&bytes).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_concurrent_requests_share_one_pipeline() {
    let (portrait, portrait_faces) = SyntheticImageBuilder::portrait();
    let detector = Arc::new(MockFaceDetector::new(portrait_faces));
    let pipeline = EmotionPipeline::new(
        Box::new(Arc::clone(&detector)),
        Box::new(MockEmotionClassifier::peaked(8, 1, 4.0)),
        Arc::new(LabelTable::ferplus()),
        PipelineConfig::default(),
    );
    let bytes = SyntheticImageBuilder::png(&portrait);
    let expected = pipeline.predict(&bytes).unwrap();

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| pipeline.predict(&bytes).unwrap()))
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    });

    assert_eq!(detector.call_count(), 5);
}

// === Batch Runs ===

#[test]
fn test_batch_continues_past_bad_images() {
    let (raster, candidates) = SyntheticImageBuilder::portrait();
    let pipeline = pipeline(
        MockFaceDetector::new(candidates),
        MockEmotionClassifier::peaked(8, 1, 5.0),
    );
    let source = MockImageSource::new(vec![
        SyntheticImageBuilder::encoded("a.png", &raster),
        emotion_core::EncodedImage::new("notes.txt", SyntheticImageBuilder::not_an_image()),
        SyntheticImageBuilder::encoded("b.png", &raster),
    ]);
    let output = MockResultOutput::new();
    let progress = MockProgressSink::new();

    let summary = run_batch(&pipeline, &source, &output, &progress).unwrap();

    assert_eq!(summary.processed, 3);
    assert_eq!(summary.invalid, 1);
    assert_eq!(summary.failed, 0);
    assert!(!summary.all_ok());

    let results = output.results();
    let paths: Vec<&str> = results.iter().map(|r| r.path.as_str()).collect();
    assert_eq!(paths, ["a.png", "notes.txt", "b.png"]);
    assert_eq!(results[0].response.status, ResponseStatus::Ok);
    assert_eq!(results[1].response.status, ResponseStatus::Error);
    assert!(results[1].response.predictions.is_empty());
    assert!(results[1]
        .response
        .error
        .as_deref()
        .unwrap()
        .contains("invalid image"));

    assert_eq!(output.flush_count(), 1);
    assert_eq!(progress.started_count(), 3);
    assert_eq!(progress.completed_count(), 3);
    assert_eq!(progress.finished_counts(), Some((3, 0)));
}

#[test]
fn test_batch_counts_capability_failures() {
    let (raster, candidates) = SyntheticImageBuilder::portrait();
    let pipeline = EmotionPipeline::new(
        Box::new(MockFaceDetector::new(candidates)),
        Box::new(FailingClassifier),
        Arc::new(LabelTable::ferplus()),
        PipelineConfig::default(),
    );
    let source = MockImageSource::new(vec![SyntheticImageBuilder::encoded("a.png", &raster)]);
    let output = MockResultOutput::new();

    let summary = run_batch(&pipeline, &source, &output, &MockProgressSink::new()).unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.invalid, 0);
    assert!(output.results()[0]
        .response
        .error
        .as_deref()
        .unwrap()
        .contains("emotion inference failed"));
}

#[test]
fn test_empty_batch() {
    let pipeline = pipeline(
        MockFaceDetector::empty(),
        MockEmotionClassifier::peaked(8, 0, 1.0),
    );
    let source = MockImageSource::empty();
    let output = MockResultOutput::new();
    let progress = MockProgressSink::new();

    let summary = run_batch(&pipeline, &source, &output, &progress).unwrap();

    assert!(summary.all_ok());
    assert!(output.results().is_empty());
    assert_eq!(output.flush_count(), 1);
    assert_eq!(progress.finished_counts(), Some((0, 0)));
}
