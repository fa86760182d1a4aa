//! Facial emotion CLI - detect faces and classify their emotions.

use anyhow::Result;
use clap::Parser;
use emotion_adapters::set_models_dir;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod config;
mod output;

use commands::predict::{self, PredictArgs};
use commands::{Cli, Commands, ExitCode};
use config::AppConfig;

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = AppConfig::load();

    // Models directory: CLI > config
    if let Some(dir) = cli.models_dir.clone().or_else(|| config.models.dir.clone()) {
        debug!("Using custom models directory: {}", dir.display());
        set_models_dir(Some(dir));
    }

    let exit_code = match cli.command {
        Some(Commands::Predict(args)) => run_predict(args, &config),
        Some(Commands::Labels(ref args)) => report(commands::labels::run(args, &config)),
        Some(Commands::Metadata(ref args)) => report(commands::metadata::run(args, &config)),
        Some(Commands::Models(ref args)) => report(commands::models::run(args, &config)),
        None => {
            // Default behavior: run predict with flattened args
            if cli.predict.paths.is_empty() {
                eprintln!("error: No paths specified. Use --help for usage information.");
                return ExitCode::Error.into();
            }
            run_predict(cli.predict, &config)
        }
    };

    exit_code.into()
}

fn run_predict(args: PredictArgs, config: &AppConfig) -> ExitCode {
    let args = PredictArgs::with_config(args, config);
    match predict::run(&args) {
        Ok(result) => result.exit_code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::Error
        }
    }
}

fn report(result: Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::Success,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::Error
        }
    }
}
