//! Candle-backed implementations of the detection and classification ports.
//!
//! - [`BlazeFace`]: face detection
//! - [`FerPlus`]: 8-class FER+ emotion classification

mod blazeface;
mod device;
mod ferplus;
mod loader;

pub use blazeface::{BlazeFace, BlazeFaceConfig};
pub use device::select_device;
pub use ferplus::FerPlus;
pub use loader::load_safetensors;
