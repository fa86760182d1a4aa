//! Labels command - print the emotion label table.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use super::predict::resolve_labels;
use crate::config::AppConfig;
use crate::output::{JsonOutput, OutputFormat};

/// Arguments for the labels command
#[derive(Args)]
pub struct LabelsArgs {
    /// JSON label table replacing the built-in FER+ labels
    #[arg(long, value_name = "FILE")]
    pub labels: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,
}

/// Run the labels command.
pub fn run(args: &LabelsArgs, config: &AppConfig) -> Result<()> {
    let path = args
        .labels
        .as_ref()
        .or(config.classification.labels_file.as_ref());
    let labels = resolve_labels(path)?;

    let pretty = args.pretty || config.output.pretty.unwrap_or(false);
    JsonOutput::stdout(OutputFormat::Json, pretty).write_document(&labels.to_response())
}
