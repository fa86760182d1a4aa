//! Static model identity.

use serde::{Deserialize, Serialize};

/// Descriptive metadata about the deployed model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Model identifier.
    pub id: String,
    /// Human-readable model name.
    pub name: String,
    /// Model description.
    pub description: String,
    /// Model category.
    #[serde(rename = "type")]
    pub model_type: String,
    /// License of the model weights.
    pub license: String,
    /// Where the model comes from.
    pub source: String,
}

impl Default for ModelMetadata {
    fn default() -> Self {
        let name = "MAX Facial Emotion Classifier";
        Self {
            id: name.to_lowercase().replace(' ', "-"),
            name: name.into(),
            description: "Emotion classifier trained on the FER+ face dataset".into(),
            model_type: "Facial Recognition".into(),
            license: "MIT".into(),
            source: "https://developer.ibm.com/exchanges/models/all/max-facial-emotion-classifier/"
                .into(),
        }
    }
}
