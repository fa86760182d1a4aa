//! Emotion classification capability.

use std::sync::Arc;

use crate::domain::FaceCrop;

/// Port for scoring face crops against the emotion classes.
pub trait EmotionClassifier: Send + Sync {
    /// Returns a short name for logging.
    fn name(&self) -> &'static str;

    /// Runs the classifier on a batch of crops.
    ///
    /// Returns one raw (pre-softmax) score vector per crop, in input order,
    /// each as long as the label table.
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails.
    fn infer(&self, batch: &[FaceCrop]) -> anyhow::Result<Vec<Vec<f32>>>;
}

impl<T: EmotionClassifier + ?Sized> EmotionClassifier for Arc<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn infer(&self, batch: &[FaceCrop]) -> anyhow::Result<Vec<Vec<f32>>> {
        (**self).infer(batch)
    }
}
