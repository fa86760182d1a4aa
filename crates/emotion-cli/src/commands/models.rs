//! Models command - manage the detector and classifier weights.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use clap::{Args, Subcommand};
use emotion_adapters::models::{
    ensure_models_with_progress, list_models as adapter_list_models, models_dir, ProgressCallback,
    MODELS, MODELS_URL_ENV,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use crate::config::AppConfig;

/// Arguments for the models command
#[derive(Args)]
pub struct ModelsArgs {
    #[command(subcommand)]
    pub command: ModelsCommand,
}

/// Models subcommands
#[derive(Subcommand)]
pub enum ModelsCommand {
    /// Download required models
    Fetch {
        /// Base URL the model files are fetched from
        #[arg(long, value_name = "URL")]
        base_url: Option<String>,
    },
    /// List installed models
    List,
    /// Print model directory path
    Path,
}

/// Run the models command.
pub fn run(args: &ModelsArgs, config: &AppConfig) -> Result<()> {
    match &args.command {
        ModelsCommand::Fetch { base_url } => {
            let base_url = resolve_base_url(base_url.clone(), config)?;
            fetch_models(&base_url)
        }
        ModelsCommand::List => list_models(),
        ModelsCommand::Path => print_path(),
    }
}

/// Picks the download location: `--base-url`, then the environment, then config.
fn resolve_base_url(cli: Option<String>, config: &AppConfig) -> Result<String> {
    cli.or_else(|| std::env::var(MODELS_URL_ENV).ok().filter(|s| !s.is_empty()))
        .or_else(|| config.models.base_url.clone())
        .ok_or_else(|| {
            anyhow::anyhow!(
                "No model download location. Pass --base-url, set {MODELS_URL_ENV}, \
                 or set models.base_url in the config file"
            )
        })
}

fn fetch_models(base_url: &str) -> Result<()> {
    debug!("Fetching models from {base_url}");

    let pb = Arc::new(ProgressBar::new(0));
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta}) {msg}")
            .map_err(|e| anyhow::anyhow!("Invalid progress template: {e}"))?
            .progress_chars("#>-"),
    );

    let current_model: Arc<Mutex<String>> = Arc::new(Mutex::new(String::new()));
    let pb_clone = Arc::clone(&pb);
    let model_clone = Arc::clone(&current_model);

    let progress: ProgressCallback =
        Box::new(move |name: &str, downloaded: u64, total: Option<u64>| {
            let is_new_model = {
                let mut current = model_clone
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner);
                if *current == name {
                    false
                } else {
                    *current = name.to_string();
                    true
                }
            };
            if is_new_model {
                if let Some(t) = total {
                    pb_clone.set_length(t);
                }
                pb_clone.set_message(name.to_string());
            }
            pb_clone.set_position(downloaded);
        });

    ensure_models_with_progress(base_url, Some(&progress))?;

    pb.finish_with_message("All models downloaded");
    Ok(())
}

#[allow(clippy::unnecessary_wraps)]
fn list_models() -> Result<()> {
    let models = adapter_list_models();
    let dir = models_dir();

    println!("Models directory: {}", dir.display());
    println!();

    for (name, installed) in &models {
        let status = if *installed { "installed" } else { "missing" };
        let info = MODELS.iter().find(|m| m.name == name);
        let filename = info.map_or("unknown", |m| m.filename);
        println!("  {name} ({filename}): {status}");
    }

    println!();
    let installed_count = models.iter().filter(|(_, installed)| *installed).count();
    println!("{}/{} models installed", installed_count, models.len());

    Ok(())
}

#[allow(clippy::unnecessary_wraps)]
fn print_path() -> Result<()> {
    let path = models_dir();
    println!("{}", path.display());
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_flag_wins_over_config() {
        let mut config = AppConfig::default();
        config.models.base_url = Some("http://localhost:9000/from-config".into());

        let url = resolve_base_url(Some("http://localhost:8000/models".into()), &config).unwrap();
        assert_eq!(url, "http://localhost:8000/models");
    }
}
