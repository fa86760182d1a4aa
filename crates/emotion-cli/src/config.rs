//! Configuration file support for facial-emotion.
//!
//! Supports TOML configuration from:
//! - XDG config: `~/.config/facial-emotion/config.toml` (lowest priority)
//! - Project-local: `.facial-emotion.toml` (searched up directory tree)
//! - CLI flags (highest priority, applied separately)

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info, warn};

/// Project-local config filename.
pub const PROJECT_CONFIG: &str = ".facial-emotion.toml";

/// Top-level configuration structure.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// General options.
    pub general: GeneralConfig,
    /// Face detection and cropping.
    pub detection: DetectionConfig,
    /// Emotion classification.
    pub classification: ClassificationConfig,
    /// Model settings.
    pub models: ModelsConfig,
    /// Output formatting settings.
    pub output: OutputConfig,
}

/// General configuration options.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Recurse into subdirectories by default.
    pub recursive: Option<bool>,
}

/// Face detection configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Faces at or below this confidence are dropped (0.0-1.0).
    pub confidence_threshold: Option<f32>,
    /// Crop margin as a fraction of the face box (0.0-1.0).
    pub margin: Option<f64>,
    /// Longest image side before detection, in pixels.
    pub max_side: Option<u32>,
    /// Maximum faces classified per image.
    pub max_faces: Option<usize>,
    /// Minimum raw detector score before suppression (0.0-1.0).
    pub detector_min_score: Option<f32>,
}

/// Emotion classification configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct ClassificationConfig {
    /// Emotions reported per face.
    pub top_k: Option<usize>,
    /// JSON label table replacing the built-in FER+ labels.
    pub labels_file: Option<PathBuf>,
}

/// Model configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Custom models directory path.
    pub dir: Option<PathBuf>,
    /// Base URL that model files are downloaded from.
    pub base_url: Option<String>,
    /// Run inference on the CPU even when a GPU is available.
    pub cpu: Option<bool>,
}

/// Output formatting configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Output format: "json" or "jsonl".
    pub format: Option<String>,
    /// Pretty-print JSON output.
    pub pretty: Option<bool>,
    /// Show progress bar.
    pub progress: Option<bool>,
}

impl AppConfig {
    /// Load configuration from XDG and project-local files.
    ///
    /// Priority (lowest to highest):
    /// 1. XDG config: `~/.config/facial-emotion/config.toml`
    /// 2. Project-local: `.facial-emotion.toml` (searched up from cwd)
    ///
    /// Missing files are silently ignored. Invalid values are reported as
    /// warnings and dropped, so the built-in default applies.
    pub fn load() -> Self {
        let mut config = Self::default();

        if let Some(xdg_path) = xdg_config_path() {
            if xdg_path.exists() {
                info!("Loading XDG config: {}", xdg_path.display());
                if let Some(xdg_config) = load_file(&xdg_path) {
                    config = xdg_config;
                }
            } else {
                debug!("XDG config not found: {}", xdg_path.display());
            }
        }

        if let Some(project_path) = find_project_config() {
            info!("Loading project config: {}", project_path.display());
            if let Some(project_config) = load_file(&project_path) {
                config.merge(project_config);
            }
        }

        for warning in config.sanitize() {
            eprintln!("warning: {warning}");
        }

        config
    }

    /// Drop every out-of-range value so its default applies instead.
    ///
    /// Returns one message per dropped value.
    pub fn sanitize(&mut self) -> Vec<String> {
        let mut problems = Vec::new();
        let unit = |v: &f64| (0.0..=1.0).contains(v);
        let unit_f32 = |v: &f32| (0.0..=1.0).contains(v);
        let positive_u32 = |v: &u32| *v >= 1;
        let positive = |v: &usize| *v >= 1;

        let d = &mut self.detection;
        discard(
            &mut d.confidence_threshold,
            unit_f32,
            "detection.confidence_threshold must be 0.0-1.0",
            &mut problems,
        );
        discard(&mut d.margin, unit, "detection.margin must be 0.0-1.0", &mut problems);
        discard(
            &mut d.detector_min_score,
            unit_f32,
            "detection.detector_min_score must be 0.0-1.0",
            &mut problems,
        );
        discard(
            &mut d.max_side,
            positive_u32,
            "detection.max_side must be at least 1",
            &mut problems,
        );
        discard(
            &mut d.max_faces,
            positive,
            "detection.max_faces must be at least 1",
            &mut problems,
        );
        discard(
            &mut self.classification.top_k,
            positive,
            "classification.top_k must be at least 1",
            &mut problems,
        );
        discard(
            &mut self.output.format,
            |f: &String| f == "json" || f == "jsonl",
            "output.format must be 'json' or 'jsonl'",
            &mut problems,
        );

        problems
    }

    /// Merge another config into this one.
    /// Values from `other` override values in `self` when present.
    pub fn merge(&mut self, other: Self) {
        self.general.recursive = other.general.recursive.or(self.general.recursive);

        let (d, o) = (&mut self.detection, other.detection);
        d.confidence_threshold = o.confidence_threshold.or(d.confidence_threshold);
        d.margin = o.margin.or(d.margin);
        d.max_side = o.max_side.or(d.max_side);
        d.max_faces = o.max_faces.or(d.max_faces);
        d.detector_min_score = o.detector_min_score.or(d.detector_min_score);

        let (c, o) = (&mut self.classification, other.classification);
        c.top_k = o.top_k.or(c.top_k);
        c.labels_file = o.labels_file.or_else(|| c.labels_file.take());

        let (m, o) = (&mut self.models, other.models);
        m.dir = o.dir.or_else(|| m.dir.take());
        m.base_url = o.base_url.or_else(|| m.base_url.take());
        m.cpu = o.cpu.or(m.cpu);

        let (out, o) = (&mut self.output, other.output);
        out.format = o.format.or_else(|| out.format.take());
        out.pretty = o.pretty.or(out.pretty);
        out.progress = o.progress.or(out.progress);
    }
}

/// Clears `field` when it holds a value `valid` rejects.
fn discard<T: std::fmt::Debug>(
    field: &mut Option<T>,
    valid: impl Fn(&T) -> bool,
    rule: &str,
    problems: &mut Vec<String>,
) {
    if field.as_ref().is_some_and(|v| !valid(v)) {
        if let Some(value) = field.take() {
            problems.push(format!("{rule}, got {value:?}; using the default"));
        }
    }
}

/// Get the XDG config file path.
fn xdg_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("facial-emotion").join("config.toml"))
}

/// Find project-local config by searching up from current directory.
fn find_project_config() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    find_config_in_parents(&cwd)
}

/// Search for `.facial-emotion.toml` in the given directory and its parents.
fn find_config_in_parents(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(PROJECT_CONFIG))
        .find(|path| path.exists())
}

/// Load and parse a TOML config file.
fn load_file(path: &Path) -> Option<AppConfig> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read config file {}: {e}", path.display());
            return None;
        }
    };

    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            warn!("Failed to parse config file {}: {e}", path.display());
            None
        }
    }
}
