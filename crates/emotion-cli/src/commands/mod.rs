//! CLI command definitions and handlers.

pub mod labels;
pub mod metadata;
pub mod models;
pub mod predict;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Facial emotion classifier - detect faces and rank their emotions
#[derive(Parser)]
#[command(name = "facial-emotion")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Shared predict arguments (paths, thresholds, flags).
    #[command(flatten)]
    pub predict: predict::PredictArgs,

    /// Custom models directory (overrides default and config)
    #[arg(long, value_name = "DIR", global = true)]
    pub models_dir: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Predict the emotions of every face in the given images
    Predict(predict::PredictArgs),
    /// Print the emotion label table
    Labels(labels::LabelsArgs),
    /// Print model metadata
    Metadata(metadata::MetadataArgs),
    /// Manage model weights
    Models(models::ModelsArgs),
}

/// Process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Every image was classified.
    Success = 0,
    /// At least one input was not a decodable image.
    InvalidInput = 1,
    /// Detection or inference failed, an input was unreadable, or a command
    /// could not run.
    Error = 2,
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        Self::from(code as u8)
    }
}
