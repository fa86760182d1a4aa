//! Prediction and response types.

use serde::{Deserialize, Serialize};

use super::NormalizedBox;

/// Probability assigned to one emotion class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionScore {
    /// Class index, as a decimal string.
    pub label_id: String,
    /// Class label.
    pub label: String,
    /// Softmax probability in `[0, 1]`.
    pub probability: f64,
}

/// Emotion prediction for a single detected face.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Face location as `[y_min, x_min, y_max, x_max]` fractions of the
    /// (scaled) image.
    pub detection_box: NormalizedBox,
    /// Top emotions for the face, most probable first.
    pub emotion_predictions: Vec<EmotionScore>,
}

impl Prediction {
    /// Returns the most probable emotion, if any.
    #[must_use]
    pub fn top(&self) -> Option<&EmotionScore> {
        self.emotion_predictions.first()
    }
}

/// Response status.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    /// Predictions were produced (possibly none).
    Ok,
    /// The request failed; no predictions were produced.
    Error,
}

/// Response document for one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictResponse {
    /// Outcome of the request.
    pub status: ResponseStatus,
    /// Predictions for each detected face, in detector order.
    pub predictions: Vec<Prediction>,
    /// Failure description when `status` is `error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PredictResponse {
    /// Successful response.
    #[must_use]
    pub const fn ok(predictions: Vec<Prediction>) -> Self {
        Self {
            status: ResponseStatus::Ok,
            predictions,
            error: None,
        }
    }

    /// Failed response carrying no predictions.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Error,
            predictions: Vec::new(),
            error: Some(message.into()),
        }
    }

    /// Returns true if the status is `ok`.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == ResponseStatus::Ok
    }
}

/// Response for one input file, as emitted by batch front ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageResult {
    /// Path of the input image.
    pub path: String,
    /// The prediction response.
    #[serde(flatten)]
    pub response: PredictResponse,
}
