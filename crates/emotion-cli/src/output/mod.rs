//! Output formatting for CLI.

mod json;
mod progress;

use clap::ValueEnum;
use serde::Deserialize;

pub use json::JsonOutput;
pub use progress::ProgressBar;

/// Shape of the prediction output on stdout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One JSON object per image, one per line
    #[default]
    Jsonl,
    /// A single JSON array of all images
    Json,
}
