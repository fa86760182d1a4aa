//! Class-index to label-name mapping.

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// FER+ emotion classes, in model output order.
const FERPLUS_LABELS: [&str; 8] = [
    "neutral",
    "happiness",
    "surprise",
    "sadness",
    "anger",
    "disgust",
    "fear",
    "contempt",
];

/// Immutable mapping from class index to label name.
///
/// Built once at startup and shared read-only between requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTable {
    names: Vec<String>,
}

impl LabelTable {
    /// Builds a table from `(index, name)` entries in any order.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidLabels`] if the table is empty, an
    /// index repeats, or the indices are not exactly `0..n`.
    pub fn from_entries<I, S>(entries: I) -> Result<Self, PipelineError>
    where
        I: IntoIterator<Item = (usize, S)>,
        S: Into<String>,
    {
        let mut pairs: Vec<(usize, String)> =
            entries.into_iter().map(|(i, s)| (i, s.into())).collect();
        if pairs.is_empty() {
            return Err(PipelineError::InvalidLabels("no labels".into()));
        }
        pairs.sort_by_key(|(i, _)| *i);

        let mut names = Vec::with_capacity(pairs.len());
        for (expected, (index, name)) in pairs.into_iter().enumerate() {
            if index != expected {
                return Err(PipelineError::InvalidLabels(format!(
                    "expected label index {expected}, found {index}"
                )));
            }
            names.push(name);
        }

        Ok(Self { names })
    }

    /// The eight FER+ emotion labels.
    #[must_use]
    pub fn ferplus() -> Self {
        Self {
            names: FERPLUS_LABELS.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    /// Returns the label for a class index.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// Number of classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns true if the table has no classes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Iterates `(index, label)` pairs in index order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.names.iter().map(String::as_str).enumerate()
    }

    /// Builds the listing document returned by the labels command.
    #[must_use]
    pub fn to_response(&self) -> LabelsResponse {
        LabelsResponse {
            count: self.len(),
            labels: self
                .iter()
                .map(|(i, name)| ModelLabel {
                    id: i.to_string(),
                    name: name.to_string(),
                })
                .collect(),
        }
    }
}

impl Default for LabelTable {
    fn default() -> Self {
        Self::ferplus()
    }
}

/// A single label entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelLabel {
    /// Label identifier (class index as a string).
    pub id: String,
    /// Label name.
    pub name: String,
}

/// List of labels the model can predict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelsResponse {
    /// Number of labels returned.
    pub count: usize,
    /// The labels, in index order.
    pub labels: Vec<ModelLabel>,
}
