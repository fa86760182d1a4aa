//! Running the pipeline over every image of an [`ImageSource`].

use tracing::debug;

use super::EmotionPipeline;
use crate::domain::{ImageResult, PredictResponse};
use crate::ports::{ImageSource, ProgressEvent, ProgressSink, ResultOutput};

/// Tally of a batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Images that produced a response document (ok or error).
    pub processed: usize,
    /// Images that could not be read at all.
    pub skipped: usize,
    /// Images rejected as undecodable.
    pub invalid: usize,
    /// Images whose detection or classification failed.
    pub failed: usize,
}

impl BatchSummary {
    /// Every image was read and produced predictions.
    #[must_use]
    pub const fn all_ok(&self) -> bool {
        self.skipped == 0 && self.invalid == 0 && self.failed == 0
    }
}

/// Predicts every image from `source`, writing one result per image.
///
/// Per-image failures become `error` responses and processing continues.
/// `output` is flushed once at the end.
///
/// # Errors
///
/// Returns an error only if writing to `output` fails.
pub fn run_batch(
    pipeline: &EmotionPipeline,
    source: &dyn ImageSource,
    output: &dyn ResultOutput,
    progress: &dyn ProgressSink,
) -> anyhow::Result<BatchSummary> {
    let total = source.count_hint();
    let mut summary = BatchSummary::default();

    for (index, item) in source.images().enumerate() {
        let image = match item {
            Ok(image) => image,
            Err(e) => {
                progress.on_event(ProgressEvent::Skipped {
                    path: format!("image {index}"),
                    reason: format!("{e:#}"),
                });
                summary.skipped += 1;
                continue;
            }
        };

        progress.on_event(ProgressEvent::Started {
            path: image.path.clone(),
            index,
            total,
        });

        let response = match pipeline.predict(&image.bytes) {
            Ok(predictions) => {
                debug!(path = %image.path, faces = predictions.len(), "Predicted");
                PredictResponse::ok(predictions)
            }
            Err(e) => {
                if e.is_client_error() {
                    summary.invalid += 1;
                } else {
                    summary.failed += 1;
                }
                debug!(path = %image.path, "Prediction failed: {e}");
                PredictResponse::error(e.to_string())
            }
        };

        let result = ImageResult {
            path: image.path,
            response,
        };
        output.write(&result)?;
        summary.processed += 1;
        progress.on_event(ProgressEvent::Completed { result });
    }

    output.flush()?;
    progress.on_event(ProgressEvent::Finished {
        processed: summary.processed,
        skipped: summary.skipped,
    });

    Ok(summary)
}
