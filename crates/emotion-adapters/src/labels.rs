//! Label-table files.
//!
//! A label file is a JSON object mapping class indices to names:
//!
//! ```json
//! {"0": "neutral", "1": "happiness", "2": "surprise"}
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use emotion_core::LabelTable;
use tracing::debug;

/// Reads a label table from a JSON file.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not a JSON object of
/// strings, has a non-integer key, or its keys are not exactly `0..n`.
pub fn load_label_table(path: impl AsRef<Path>) -> Result<LabelTable> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read label file: {}", path.display()))?;
    let table = parse_label_table(&text)
        .with_context(|| format!("Invalid label file: {}", path.display()))?;

    debug!(path = %path.display(), labels = table.len(), "Loaded label table");
    Ok(table)
}

/// Parses a label table from JSON text.
///
/// # Errors
///
/// See [`load_label_table`].
pub fn parse_label_table(json: &str) -> Result<LabelTable> {
    let raw: BTreeMap<String, String> =
        serde_json::from_str(json).context("Expected a JSON object of strings")?;

    let entries = raw
        .into_iter()
        .map(|(key, name)| {
            let index = key
                .trim()
                .parse::<usize>()
                .with_context(|| format!("Label key {key:?} is not a class index"))?;
            Ok((index, name))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(LabelTable::from_entries(entries)?)
}
