//! Conversion of raw classifier scores into ranked, labeled predictions.

use crate::domain::{EmotionScore, LabelTable, NormalizedBox, Prediction};
use crate::error::PipelineError;

/// Default number of emotions reported per face.
pub const DEFAULT_TOP_K: usize = 8;

/// Numerically stable softmax.
///
/// The maximum score is subtracted before exponentiation so large logits do
/// not overflow. Computed in `f64`.
#[must_use]
pub fn softmax(scores: &[f32]) -> Vec<f64> {
    let max = scores
        .iter()
        .map(|&s| f64::from(s))
        .fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = scores.iter().map(|&s| (f64::from(s) - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Class indices ordered by descending probability; ties keep the lower
/// index first.
#[must_use]
pub fn rank_descending(probabilities: &[f64]) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..probabilities.len()).collect();
    indices.sort_by(|&a, &b| probabilities[b].total_cmp(&probabilities[a]));
    indices
}

/// Turns per-face score vectors into [`Prediction`]s.
#[derive(Debug, Clone, Copy)]
pub struct ResultPostProcessor {
    top_k: usize,
}

impl ResultPostProcessor {
    /// Creates a post-processor reporting at most `top_k` emotions per face.
    #[must_use]
    pub const fn new(top_k: usize) -> Self {
        Self { top_k }
    }

    /// Number of emotions reported per face.
    #[must_use]
    pub const fn top_k(&self) -> usize {
        self.top_k
    }

    /// Builds one prediction per face, pairing `scores[i]` with `boxes[i]`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Inference`] if the number of score vectors
    /// differs from the number of boxes, a vector's length differs from the
    /// label count, or a score is not finite.
    pub fn process(
        &self,
        scores: &[Vec<f32>],
        boxes: &[NormalizedBox],
        labels: &LabelTable,
    ) -> Result<Vec<Prediction>, PipelineError> {
        if scores.len() != boxes.len() {
            return Err(PipelineError::Inference(format!(
                "classifier returned {} score vectors for {} faces",
                scores.len(),
                boxes.len()
            )));
        }

        scores
            .iter()
            .zip(boxes)
            .map(|(raw, bbox)| self.predict_face(raw, *bbox, labels))
            .collect()
    }

    fn predict_face(
        &self,
        raw: &[f32],
        detection_box: NormalizedBox,
        labels: &LabelTable,
    ) -> Result<Prediction, PipelineError> {
        if raw.len() != labels.len() {
            return Err(PipelineError::Inference(format!(
                "expected {} class scores, got {}",
                labels.len(),
                raw.len()
            )));
        }
        if let Some(bad) = raw.iter().find(|s| !s.is_finite()) {
            return Err(PipelineError::Inference(format!(
                "non-finite class score {bad}"
            )));
        }

        let probabilities = softmax(raw);
        let emotion_predictions = rank_descending(&probabilities)
            .into_iter()
            .take(self.top_k)
            .map(|index| EmotionScore {
                label_id: index.to_string(),
                label: labels.get(index).unwrap_or_default().to_string(),
                probability: probabilities[index],
            })
            .collect();

        Ok(Prediction {
            detection_box,
            emotion_predictions,
        })
    }
}

impl Default for ResultPostProcessor {
    fn default() -> Self {
        Self::new(DEFAULT_TOP_K)
    }
}
