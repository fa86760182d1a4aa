//! FER+ emotion classifier.
//!
//! A VGG-style network over 64x64 single-channel crops: four convolutional
//! stages (64, 128, 256, 256 channels) each ending in 2x2 max pooling,
//! followed by two 1024-wide dense layers and a dense head with one output
//! per emotion class. Input intensities are fed raw, in `0..=255`.

use std::path::Path;

use anyhow::{ensure, Context, Result};
use candle_core::{Device, Module, Tensor};
use candle_nn::{conv2d, linear, Conv2d, Conv2dConfig, Linear, VarBuilder};
use tracing::debug;

use super::loader::load_safetensors;
use crate::domain::FaceCrop;
use crate::ports::EmotionClassifier;

const CROP: usize = FaceCrop::SIZE as usize;

/// Output channels of each convolution, grouped by pooling stage.
const STAGES: [&[usize]; 4] = [&[64, 64], &[128, 128], &[256, 256, 256], &[256, 256, 256]];

/// Spatial side after the four pooling stages.
const FEATURE_SIDE: usize = CROP / 16;

const HIDDEN: usize = 1024;

/// Candle-backed [`EmotionClassifier`].
pub struct FerPlus {
    stages: Vec<Vec<Conv2d>>,
    fc1: Linear,
    fc2: Linear,
    head: Linear,
    num_classes: usize,
    device: Device,
}

impl FerPlus {
    /// Builds the network with `num_classes` outputs.
    ///
    /// Convolutions are named `stage{s}.conv{i}`; dense layers `fc1`, `fc2`
    /// and `head`.
    ///
    /// # Errors
    ///
    /// Returns an error if a tensor is missing or has the wrong shape.
    #[allow(clippy::needless_pass_by_value)]
    pub fn new(vb: VarBuilder, num_classes: usize) -> Result<Self> {
        let padded = Conv2dConfig {
            padding: 1,
            ..Conv2dConfig::default()
        };

        let mut in_channels = 1;
        let mut stages = Vec::with_capacity(STAGES.len());
        for (s, widths) in STAGES.iter().enumerate() {
            let mut convs = Vec::with_capacity(widths.len());
            for (i, &out_channels) in widths.iter().enumerate() {
                convs.push(conv2d(
                    in_channels,
                    out_channels,
                    3,
                    padded,
                    vb.pp(format!("stage{s}.conv{i}")),
                )?);
                in_channels = out_channels;
            }
            stages.push(convs);
        }

        let flat = in_channels * FEATURE_SIDE * FEATURE_SIDE;
        Ok(Self {
            stages,
            fc1: linear(flat, HIDDEN, vb.pp("fc1"))?,
            fc2: linear(HIDDEN, HIDDEN, vb.pp("fc2"))?,
            head: linear(HIDDEN, num_classes, vb.pp("head"))?,
            num_classes,
            device: vb.device().clone(),
        })
    }

    /// Loads weights from a safetensors file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or its tensors do not
    /// match the network.
    pub fn load(path: impl AsRef<Path>, device: &Device, num_classes: usize) -> Result<Self> {
        let path = path.as_ref();
        let vb = load_safetensors(path, device)?;
        Self::new(vb, num_classes)
            .with_context(|| format!("Invalid FER+ weights: {}", path.display()))
    }

    /// Number of classes the head produces.
    #[must_use]
    pub const fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Stacks crops into an `(N, 1, 64, 64)` tensor.
    fn batch_tensor(&self, batch: &[FaceCrop]) -> Result<Tensor> {
        let data: Vec<f32> = batch.iter().flat_map(FaceCrop::intensities).collect();
        Tensor::from_vec(data, (batch.len(), 1, CROP, CROP), &self.device)
            .context("Failed to build classifier input")
    }

    fn forward(&self, x: &Tensor) -> candle_core::Result<Tensor> {
        let mut h = x.clone();
        for convs in &self.stages {
            for conv in convs {
                h = conv.forward(&h)?.relu()?;
            }
            h = h.max_pool2d(2)?;
        }
        let h = h.flatten_from(1)?;
        let h = self.fc1.forward(&h)?.relu()?;
        let h = self.fc2.forward(&h)?.relu()?;
        self.head.forward(&h)
    }
}

impl EmotionClassifier for FerPlus {
    fn name(&self) -> &'static str {
        "ferplus"
    }

    fn infer(&self, batch: &[FaceCrop]) -> Result<Vec<Vec<f32>>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let input = self.batch_tensor(batch)?;
        let scores: Vec<Vec<f32>> = self
            .forward(&input)
            .and_then(|logits| logits.to_vec2())
            .context("FER+ forward pass failed")?;
        ensure!(
            scores.len() == batch.len(),
            "FER+ returned {} rows for {} crops",
            scores.len(),
            batch.len()
        );

        debug!(faces = batch.len(), classes = self.num_classes, "Classified faces");
        Ok(scores)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use candle_core::DType;
    use image::{GrayImage, Luma};

    use super::*;

    fn zero_model(num_classes: usize) -> FerPlus {
        let vb = VarBuilder::zeros(DType::F32, &Device::Cpu);
        FerPlus::new(vb, num_classes).unwrap()
    }

    fn crop(value: u8) -> FaceCrop {
        FaceCrop::new(GrayImage::from_pixel(64, 64, Luma([value]))).unwrap()
    }

    #[test]
    fn test_feature_side() {
        assert_eq!(FEATURE_SIDE, 4);
    }

    #[test]
    fn test_infer_shape() {
        let model = zero_model(8);
        let scores = model.infer(&[crop(0), crop(128), crop(255)]).unwrap();

        assert_eq!(scores.len(), 3);
        assert!(scores.iter().all(|row| row.len() == 8));
        assert!(scores.iter().flatten().all(|v| v.abs() < f32::EPSILON));
    }

    #[test]
    fn test_infer_empty_batch() {
        let model = zero_model(8);
        assert!(model.infer(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_custom_class_count() {
        let model = zero_model(5);
        assert_eq!(model.num_classes(), 5);
        assert_eq!(model.infer(&[crop(10)]).unwrap()[0].len(), 5);
    }

    #[test]
    fn test_load_missing_weights_fails() {
        let missing = "/nonexistent/emotion_ferplus.safetensors";
        assert!(FerPlus::load(missing, &Device::Cpu, 8).is_err());
    }
}
