//! Predict command - classify the emotions of every face in a set of images.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use emotion_adapters::models::{missing_models, CLASSIFIER, DETECTOR};
use emotion_adapters::{load_label_table, model_path, FsImageSource};
use emotion_core::inference::{select_device, BlazeFace, BlazeFaceConfig, FerPlus};
use emotion_core::pipeline::ExtractorConfig;
use emotion_core::{
    run_batch, BatchSummary, EmotionPipeline, ImageSource, LabelTable, PipelineConfig,
    ProgressSink, ResultOutput,
};
use tracing::{debug, info};

use super::ExitCode;
use crate::config::AppConfig;
use crate::output::{JsonOutput, OutputFormat, ProgressBar};

/// Hardcoded default values.
mod defaults {
    pub const CONFIDENCE_THRESHOLD: f32 = 0.95;
    pub const MARGIN: f64 = 0.35;
    pub const MAX_SIDE: u32 = 1024;
    pub const TOP_K: usize = 8;
    pub const DETECTOR_MIN_SCORE: f32 = 0.75;
}

/// Parse and validate a threshold value (0.0-1.0).
fn parse_threshold(s: &str) -> Result<f32, String> {
    let value: f32 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{value} is not in 0.0..=1.0"))
    }
}

/// Parse and validate a crop margin (0.0-1.0).
fn parse_margin(s: &str) -> Result<f64, String> {
    parse_threshold(s).map(f64::from)
}

/// Shared arguments for prediction.
#[derive(Args, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct PredictArgs {
    /// Image files or directories to classify
    pub paths: Vec<PathBuf>,

    /// Recurse into subdirectories
    #[arg(short, long)]
    pub recursive: bool,

    /// Face detection confidence threshold (0.0-1.0)
    #[arg(long, value_parser = parse_threshold)]
    pub confidence_threshold: Option<f32>,

    /// Margin added around each face before cropping (0.0-1.0)
    #[arg(long, value_parser = parse_margin)]
    pub margin: Option<f64>,

    /// Longest image side before detection, in pixels
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_side: Option<u32>,

    /// Classify at most this many faces per image
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub max_faces: Option<u64>,

    /// Emotions reported per face
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub top_k: Option<u64>,

    /// Minimum raw detector score before overlap suppression (0.0-1.0)
    #[arg(long, value_parser = parse_threshold)]
    pub detector_min_score: Option<f32>,

    /// JSON label table replacing the built-in FER+ labels
    #[arg(long, value_name = "FILE")]
    pub labels: Option<PathBuf>,

    /// Run inference on the CPU even when a GPU is available
    #[arg(long)]
    pub cpu: bool,

    /// Show progress bar
    #[arg(long)]
    pub progress: bool,

    /// Suppress progress output
    #[arg(short, long)]
    pub quiet: bool,

    /// Output format
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Pretty-print JSON output (only affects --format json)
    #[arg(long)]
    pub pretty: bool,

    /// Merged config (populated by `with_config`, not from CLI).
    #[arg(skip)]
    config: Option<AppConfig>,
}

impl PredictArgs {
    /// Apply configuration file values, respecting CLI precedence.
    ///
    /// Layering priority (lowest to highest):
    /// 1. Hardcoded defaults (in accessor methods)
    /// 2. Config file values (XDG, then project-local)
    /// 3. CLI arguments (already set on self)
    pub fn with_config(mut args: Self, config: &AppConfig) -> Self {
        if !args.recursive {
            args.recursive = config.general.recursive.unwrap_or(false);
        }

        let d = &config.detection;
        args.confidence_threshold = args.confidence_threshold.or(d.confidence_threshold);
        args.margin = args.margin.or(d.margin);
        args.max_side = args.max_side.or(d.max_side);
        args.max_faces = args.max_faces.or(d.max_faces.map(|n| n as u64));
        args.detector_min_score = args.detector_min_score.or(d.detector_min_score);

        args.top_k = args
            .top_k
            .or(config.classification.top_k.map(|n| n as u64));
        if args.labels.is_none() {
            args.labels.clone_from(&config.classification.labels_file);
        }

        if !args.cpu {
            args.cpu = config.models.cpu.unwrap_or(false);
        }

        if args.format.is_none() {
            args.format = config
                .output
                .format
                .as_deref()
                .and_then(|s| OutputFormat::from_str(s, true).ok());
        }
        if !args.pretty {
            args.pretty = config.output.pretty.unwrap_or(false);
        }
        if !args.progress {
            args.progress = config.output.progress.unwrap_or(false);
        }

        args.config = Some(config.clone());

        args
    }

    /// Pipeline parameters with fallback to hardcoded defaults.
    #[allow(clippy::cast_possible_truncation)]
    fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            max_side: self.max_side.unwrap_or(defaults::MAX_SIDE),
            extractor: ExtractorConfig {
                confidence_threshold: self
                    .confidence_threshold
                    .unwrap_or(defaults::CONFIDENCE_THRESHOLD),
                margin: self.margin.unwrap_or(defaults::MARGIN),
                max_faces: self.max_faces.map(|n| n as usize),
            },
            top_k: self.top_k.map_or(defaults::TOP_K, |n| n as usize),
        }
    }

    /// Detector parameters with fallback to hardcoded defaults.
    fn detector_config(&self) -> BlazeFaceConfig {
        BlazeFaceConfig {
            min_score: self
                .detector_min_score
                .unwrap_or(defaults::DETECTOR_MIN_SCORE),
            ..BlazeFaceConfig::default()
        }
    }

    /// Get output format with fallback to JSONL.
    fn format(&self) -> OutputFormat {
        self.format.unwrap_or_default()
    }
}

/// Result of running the predict command.
#[allow(dead_code)] // Fields exposed for programmatic use
pub struct PredictResult {
    /// Per-image tallies.
    pub summary: BatchSummary,
    /// Exit code.
    pub exit_code: ExitCode,
}

/// Maps a batch tally to the process exit code; the worst outcome wins.
pub const fn exit_code_for(summary: &BatchSummary) -> ExitCode {
    if summary.failed > 0 || summary.skipped > 0 {
        ExitCode::Error
    } else if summary.invalid > 0 {
        ExitCode::InvalidInput
    } else {
        ExitCode::Success
    }
}

/// Run the predict command.
///
/// Expects `args` to have been processed through `with_config()` first
/// to apply configuration file settings.
pub fn run(args: &PredictArgs) -> Result<PredictResult> {
    info!("Running predict command on {} paths", args.paths.len());

    if args.paths.is_empty() {
        anyhow::bail!("No paths specified");
    }
    debug!(settings = ?args.pipeline_config(), "Pipeline settings");

    let source = FsImageSource::new(args.paths.clone(), args.recursive);
    let total = source.count_hint();

    let output = JsonOutput::stdout(args.format(), args.pretty);

    if total == Some(0) {
        info!("No images found");
        output.flush()?;
        return Ok(PredictResult {
            summary: BatchSummary::default(),
            exit_code: ExitCode::Success,
        });
    }

    let pipeline = build_pipeline(args)?;

    let show_progress = !args.quiet && (args.progress || std::io::stderr().is_terminal());
    let progress_bar = ProgressBar::new(total.map(|t| t as u64), args.quiet, show_progress);

    process_images(&source, &pipeline, &output, &progress_bar)
}

/// Runs every image through the pipeline and derives the exit code.
pub fn process_images(
    source: &dyn ImageSource,
    pipeline: &EmotionPipeline,
    output: &dyn ResultOutput,
    progress: &dyn ProgressSink,
) -> Result<PredictResult> {
    let summary = run_batch(pipeline, source, output, progress)?;
    debug!(?summary, "Batch finished");

    Ok(PredictResult {
        exit_code: exit_code_for(&summary),
        summary,
    })
}

/// Loads the label table from `--labels` or falls back to FER+.
pub fn resolve_labels(path: Option<&PathBuf>) -> Result<LabelTable> {
    path.map_or_else(|| Ok(LabelTable::ferplus()), load_label_table)
}

/// Build the pipeline from installed models and merged args (CLI + config).
fn build_pipeline(args: &PredictArgs) -> Result<EmotionPipeline> {
    let missing = missing_models();
    if !missing.is_empty() {
        let names: Vec<&str> = missing.iter().map(|m| m.name).collect();
        anyhow::bail!(
            "Missing models: {}. Run `facial-emotion models fetch`.",
            names.join(", ")
        );
    }

    let detector_path =
        model_path(DETECTOR).context("Unknown model configuration for the face detector")?;
    let classifier_path =
        model_path(CLASSIFIER).context("Unknown model configuration for the classifier")?;

    let labels = resolve_labels(args.labels.as_ref())?;
    let device = select_device(args.cpu);

    let detector = BlazeFace::load(&detector_path, &device, args.detector_config())?;
    debug!("Loaded face detector from {}", detector_path.display());
    let classifier = FerPlus::load(&classifier_path, &device, labels.len())?;
    debug!(
        "Loaded classifier with {} classes from {}",
        labels.len(),
        classifier_path.display()
    );

    Ok(EmotionPipeline::new(
        Box::new(detector),
        Box::new(classifier),
        Arc::new(labels),
        args.pipeline_config(),
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: PredictArgs,
    }

    fn parse(argv: &[&str]) -> PredictArgs {
        let mut full = vec!["facial-emotion"];
        full.extend_from_slice(argv);
        Harness::try_parse_from(full).unwrap().args
    }

    fn config(toml: &str) -> AppConfig {
        toml::from_str(toml).unwrap()
    }

    #[test]
    fn test_defaults_without_config() {
        let args = PredictArgs::with_config(parse(&["a.jpg"]), &AppConfig::default());
        let pipeline = args.pipeline_config();
        assert_eq!(pipeline, PipelineConfig::default());
        assert_eq!(args.format(), OutputFormat::Jsonl);
        assert!((args.detector_config().min_score - 0.75).abs() < f32::EPSILON);
    }

    #[test]
    fn test_config_fills_unset_flags() {
        let cfg = config(
            r"
[detection]
confidence_threshold = 0.8
margin = 0.2
max_faces = 3

[classification]
top_k = 2

[output]
format = 'json'
pretty = true
",
        );
        let args = PredictArgs::with_config(parse(&["a.jpg"]), &cfg);
        let pipeline = args.pipeline_config();

        assert!((pipeline.extractor.confidence_threshold - 0.8).abs() < f32::EPSILON);
        assert!((pipeline.extractor.margin - 0.2).abs() < 1e-9);
        assert_eq!(pipeline.extractor.max_faces, Some(3));
        assert_eq!(pipeline.top_k, 2);
        assert_eq!(args.format(), OutputFormat::Json);
        assert!(args.pretty);
    }

    #[test]
    fn test_cli_overrides_config() {
        let cfg = config(
            r"
[detection]
confidence_threshold = 0.8

[classification]
top_k = 2

[output]
format = 'json'
",
        );
        let args = PredictArgs::with_config(
            parse(&[
                "--confidence-threshold",
                "0.6",
                "--top-k",
                "5",
                "--format",
                "jsonl",
                "a.jpg",
            ]),
            &cfg,
        );
        let pipeline = args.pipeline_config();

        assert!((pipeline.extractor.confidence_threshold - 0.6).abs() < f32::EPSILON);
        assert_eq!(pipeline.top_k, 5);
        assert_eq!(args.format(), OutputFormat::Jsonl);
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let bad: &[&[&str]] = &[
            &["--confidence-threshold", "1.5", "a.jpg"],
            &["--margin", "-0.1", "a.jpg"],
            &["--top-k", "0", "a.jpg"],
            &["--max-side", "0", "a.jpg"],
        ];
        for argv in bad {
            let mut full = vec!["facial-emotion"];
            full.extend_from_slice(argv);
            assert!(Harness::try_parse_from(full).is_err(), "accepted {argv:?}");
        }
    }

    #[test]
    fn test_exit_code_worst_outcome_wins() {
        let ok = BatchSummary {
            processed: 3,
            ..BatchSummary::default()
        };
        assert_eq!(exit_code_for(&ok), ExitCode::Success);

        let invalid = BatchSummary {
            processed: 3,
            invalid: 1,
            ..BatchSummary::default()
        };
        assert_eq!(exit_code_for(&invalid), ExitCode::InvalidInput);

        let failed = BatchSummary {
            failed: 1,
            ..invalid
        };
        assert_eq!(exit_code_for(&failed), ExitCode::Error);

        let skipped = BatchSummary {
            skipped: 1,
            ..ok
        };
        assert_eq!(exit_code_for(&skipped), ExitCode::Error);
    }

    #[test]
    fn test_resolve_labels_defaults_to_ferplus() {
        let labels = resolve_labels(None).unwrap();
        assert_eq!(labels, LabelTable::ferplus());
    }
}
