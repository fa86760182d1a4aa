//! Model downloading and caching adapter.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

/// Checksum value that disables verification for a model.
const PLACEHOLDER_CHECKSUM: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// Environment variable naming the download base URL.
pub const MODELS_URL_ENV: &str = "FACIAL_EMOTION_MODELS_URL";

const DOWNLOAD_CHUNK: usize = 64 * 1024;

/// A model artifact the pipeline needs.
#[derive(Debug, Clone)]
pub struct ModelInfo {
    /// Short identifier.
    pub name: &'static str,
    /// Filename inside the models directory and under the download base URL.
    pub filename: &'static str,
    /// Expected SHA-256 of the file, hex encoded. All zeros skips verification.
    pub sha256: &'static str,
}

/// Face detector weights.
pub const DETECTOR: &str = "blazeface";
/// Emotion classifier weights.
pub const CLASSIFIER: &str = "emotion_ferplus";

/// Every model the pipeline loads.
pub const MODELS: &[ModelInfo] = &[
    ModelInfo {
        name: DETECTOR,
        filename: "blazeface.safetensors",
        sha256: PLACEHOLDER_CHECKSUM,
    },
    ModelInfo {
        name: CLASSIFIER,
        filename: "emotion_ferplus.safetensors",
        sha256: PLACEHOLDER_CHECKSUM,
    },
];

/// Called with `(model name, bytes downloaded, total bytes if known)`.
pub type ProgressCallback = Box<dyn Fn(&str, u64, Option<u64>) + Send + Sync>;

static MODELS_DIR_OVERRIDE: RwLock<Option<PathBuf>> = RwLock::new(None);

/// Overrides the models directory for the rest of the process.
///
/// `None` restores the default location.
pub fn set_models_dir(dir: Option<PathBuf>) {
    *MODELS_DIR_OVERRIDE
        .write()
        .unwrap_or_else(PoisonError::into_inner) = dir;
}

/// Returns the models directory path.
///
/// Uses the override from [`set_models_dir`] if set, otherwise
/// `XDG_DATA_HOME/facial-emotion/models` or
/// `~/.local/share/facial-emotion/models`.
#[must_use]
pub fn models_dir() -> PathBuf {
    if let Some(dir) = MODELS_DIR_OVERRIDE
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
    {
        return dir;
    }
    default_models_dir()
}

/// The models directory when no override is set.
#[must_use]
pub fn default_models_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("facial-emotion")
        .join("models")
}

/// Returns the path to a specific model file.
#[must_use]
pub fn model_path(name: &str) -> Option<PathBuf> {
    MODELS
        .iter()
        .find(|m| m.name == name)
        .map(|m| models_dir().join(m.filename))
}

/// Lists every known model with whether it is installed.
#[must_use]
pub fn list_models() -> Vec<(String, bool)> {
    let dir = models_dir();
    MODELS
        .iter()
        .map(|m| (m.name.to_string(), dir.join(m.filename).exists()))
        .collect()
}

/// Models whose files are not present.
#[must_use]
pub fn missing_models() -> Vec<&'static ModelInfo> {
    let dir = models_dir();
    MODELS
        .iter()
        .filter(|m| !dir.join(m.filename).exists())
        .collect()
}

/// Downloads every missing model from `base_url`.
///
/// Each model is fetched from `{base_url}/{filename}`, verified against its
/// checksum, and written atomically into the models directory.
///
/// # Errors
///
/// Returns an error if:
/// - The models directory cannot be created
/// - A model download fails
/// - A model's checksum doesn't match
pub fn ensure_models_with_progress(
    base_url: &str,
    progress: Option<&ProgressCallback>,
) -> Result<()> {
    let dir = models_dir();
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create models directory {}", dir.display()))?;

    for model in MODELS {
        let path = dir.join(model.filename);
        if path.exists() {
            debug!("Model {} already exists", model.name);
            continue;
        }
        let url = format!("{}/{}", base_url.trim_end_matches('/'), model.filename);
        download_model(model, &url, &path, progress)?;
    }

    Ok(())
}

fn download_model(
    model: &ModelInfo,
    url: &str,
    path: &Path,
    progress: Option<&ProgressCallback>,
) -> Result<()> {
    info!("Downloading model {} from {url}", model.name);

    let mut response = reqwest::blocking::get(url)
        .with_context(|| format!("Failed to download {}", model.name))?;
    if !response.status().is_success() {
        anyhow::bail!(
            "Download of {} failed with status: {}",
            model.name,
            response.status()
        );
    }

    let total = response.content_length();
    let mut bytes = Vec::with_capacity(total.and_then(|t| usize::try_from(t).ok()).unwrap_or(0));
    let mut chunk = vec![0_u8; DOWNLOAD_CHUNK];
    loop {
        let n = response
            .read(&mut chunk)
            .with_context(|| format!("Failed to read response for {}", model.name))?;
        if n == 0 {
            break;
        }
        bytes.extend_from_slice(&chunk[..n]);
        if let Some(cb) = progress {
            cb(model.name, bytes.len() as u64, total);
        }
    }

    verify_checksum(model, &bytes).with_context(|| {
        format!(
            "Try deleting {} and re-running to download a fresh copy",
            path.display()
        )
    })?;

    let partial = path.with_extension("part");
    fs::write(&partial, &bytes).with_context(|| format!("Failed to write {}", partial.display()))?;
    fs::rename(&partial, path)
        .with_context(|| format!("Failed to move {} into place", partial.display()))?;

    info!("Downloaded {} ({} bytes)", model.name, bytes.len());
    Ok(())
}

/// Checks downloaded bytes against the model's expected SHA-256.
///
/// # Errors
///
/// Returns an error if the digest differs. A placeholder checksum always
/// passes.
pub fn verify_checksum(model: &ModelInfo, bytes: &[u8]) -> Result<()> {
    if model.sha256 == PLACEHOLDER_CHECKSUM {
        warn!(
            "Skipping checksum verification for {} (placeholder checksum)",
            model.name
        );
        return Ok(());
    }

    let hash = format!("{:x}", Sha256::digest(bytes));
    if !hash.eq_ignore_ascii_case(model.sha256) {
        anyhow::bail!(
            "Checksum mismatch for {}: expected {}, got {hash}",
            model.name,
            model.sha256
        );
    }
    Ok(())
}
