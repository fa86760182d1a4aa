//! Metadata command - print the model's identity.

use anyhow::Result;
use clap::Args;
use emotion_core::ModelMetadata;

use crate::config::AppConfig;
use crate::output::{JsonOutput, OutputFormat};

/// Arguments for the metadata command
#[derive(Args)]
pub struct MetadataArgs {
    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,
}

/// Run the metadata command.
pub fn run(args: &MetadataArgs, config: &AppConfig) -> Result<()> {
    let pretty = args.pretty || config.output.pretty.unwrap_or(false);
    JsonOutput::stdout(OutputFormat::Json, pretty).write_document(&ModelMetadata::default())
}
