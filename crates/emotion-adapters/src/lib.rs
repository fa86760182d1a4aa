//! Emotion Adapters - External adapters for the emotion pipeline.
//!
//! This crate provides adapters for:
//! - Filesystem image source
//! - Label-table files
//! - Model downloading and caching

pub mod fs;
pub mod labels;
pub mod models;

pub use fs::FsImageSource;
pub use labels::{load_label_table, parse_label_table};
pub use models::{model_path, models_dir, set_models_dir};
