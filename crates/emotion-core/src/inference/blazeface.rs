//! `BlazeFace` face detector.
//!
//! The short-range `BlazeFace` network ("`BlazeFace`: Sub-millisecond Neural
//! Face Detection on Mobile GPUs"), with weights in the layout of
//! <https://github.com/hollance/BlazeFace-PyTorch> converted to safetensors.
//! `BatchNorm` is folded into the convolution biases.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]

use std::path::Path;

use anyhow::{Context, Result};
use candle_core::{Device, Module, Tensor};
use candle_nn::{conv2d, Conv2d, Conv2dConfig, VarBuilder};
use image::imageops::{self, FilterType};
use image::RgbImage;
use tracing::{debug, trace};

use super::loader::load_safetensors;
use crate::domain::{DetectionCandidate, PixelBox};
use crate::ports::FaceDetector;

/// Side length of the square network input.
pub const INPUT_SIZE: usize = 128;

const NUM_ANCHORS: usize = 896;

/// Anchors on the 16x16 grid (2 per cell); the rest sit on the 8x8 grid.
const ANCHORS_16: usize = 512;
const ANCHORS_8: usize = NUM_ANCHORS - ANCHORS_16;

/// Box plus six keypoints, as `(x, y)` offsets.
const REGRESSION_WIDTH: usize = 16;

/// `(in, out, stride)` for each block; every kernel is 3x3.
const BACKBONE_16: [(usize, usize, usize); 11] = [
    (24, 24, 1),
    (24, 28, 1),
    (28, 32, 2),
    (32, 36, 1),
    (36, 42, 1),
    (42, 48, 2),
    (48, 56, 1),
    (56, 64, 1),
    (64, 72, 1),
    (72, 80, 1),
    (80, 88, 1),
];

const BACKBONE_8: [(usize, usize, usize); 5] = [
    (88, 96, 2),
    (96, 96, 1),
    (96, 96, 1),
    (96, 96, 1),
    (96, 96, 1),
];

/// Decoding parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlazeFaceConfig {
    /// Anchors scoring below this are dropped before suppression.
    pub min_score: f32,
    /// Overlap above which the weaker of two boxes is suppressed.
    pub nms_threshold: f32,
}

impl Default for BlazeFaceConfig {
    fn default() -> Self {
        Self {
            min_score: 0.75,
            nms_threshold: 0.3,
        }
    }
}

/// Normalized `[x_min, y_min, x_max, y_max]` box with its score.
#[derive(Debug, Clone, Copy)]
struct RawDetection {
    bbox: [f32; 4],
    score: f32,
}

/// Depthwise-separable residual block.
struct BlazeBlock {
    depthwise: Conv2d,
    pointwise: Conv2d,
    channel_pad: usize,
    stride: usize,
}

impl BlazeBlock {
    fn new(
        in_channels: usize,
        out_channels: usize,
        stride: usize,
        vb: &VarBuilder,
    ) -> Result<Self> {
        let depthwise = conv2d(
            in_channels,
            in_channels,
            3,
            Conv2dConfig {
                stride,
                padding: if stride == 2 { 0 } else { 1 },
                groups: in_channels,
                ..Conv2dConfig::default()
            },
            vb.pp("depthwise"),
        )?;
        let pointwise = conv2d(
            in_channels,
            out_channels,
            1,
            Conv2dConfig::default(),
            vb.pp("pointwise"),
        )?;

        Ok(Self {
            depthwise,
            pointwise,
            channel_pad: out_channels.saturating_sub(in_channels),
            stride,
        })
    }

    fn stack(layout: &[(usize, usize, usize)], vb: &VarBuilder, prefix: &str) -> Result<Vec<Self>> {
        layout
            .iter()
            .enumerate()
            .map(|(i, &(c_in, c_out, stride))| {
                Self::new(c_in, c_out, stride, &vb.pp(format!("{prefix}.{i}")))
            })
            .collect()
    }
}

impl Module for BlazeBlock {
    fn forward(&self, x: &Tensor) -> candle_core::Result<Tensor> {
        let (input, shortcut) = if self.stride == 2 {
            (
                x.pad_with_zeros(2, 0, 2)?.pad_with_zeros(3, 0, 2)?,
                x.max_pool2d(2)?,
            )
        } else {
            (x.clone(), x.clone())
        };

        let h = self.depthwise.forward(&input)?.relu()?;
        let h = self.pointwise.forward(&h)?;

        let shortcut = if self.channel_pad > 0 {
            shortcut.pad_with_zeros(1, 0, self.channel_pad)?
        } else {
            shortcut
        };

        (h + shortcut)?.relu()
    }
}

/// Candle-backed [`FaceDetector`].
pub struct BlazeFace {
    conv0: Conv2d,
    backbone_16: Vec<BlazeBlock>,
    backbone_8: Vec<BlazeBlock>,
    classifier_16: Conv2d,
    regressor_16: Conv2d,
    classifier_8: Conv2d,
    regressor_8: Conv2d,
    anchors: Vec<[f32; 2]>,
    config: BlazeFaceConfig,
    device: Device,
}

impl BlazeFace {
    /// Builds the network from a weight store.
    ///
    /// # Errors
    ///
    /// Returns an error if a tensor is missing or has the wrong shape.
    #[allow(clippy::needless_pass_by_value)]
    pub fn new(vb: VarBuilder, config: BlazeFaceConfig) -> Result<Self> {
        let conv0 = conv2d(
            3,
            24,
            5,
            Conv2dConfig {
                stride: 2,
                ..Conv2dConfig::default()
            },
            vb.pp("conv0"),
        )?;

        Ok(Self {
            conv0,
            backbone_16: BlazeBlock::stack(&BACKBONE_16, &vb, "backbone1")?,
            backbone_8: BlazeBlock::stack(&BACKBONE_8, &vb, "backbone2")?,
            classifier_16: conv2d(88, 2, 1, Conv2dConfig::default(), vb.pp("classifier_16"))?,
            regressor_16: conv2d(88, 32, 1, Conv2dConfig::default(), vb.pp("regressor_16"))?,
            classifier_8: conv2d(96, 6, 1, Conv2dConfig::default(), vb.pp("classifier_8"))?,
            regressor_8: conv2d(96, 96, 1, Conv2dConfig::default(), vb.pp("regressor_8"))?,
            anchors: anchors(),
            config,
            device: vb.device().clone(),
        })
    }

    /// Loads weights from a safetensors file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not hold
    /// `BlazeFace` weights.
    pub fn load(path: impl AsRef<Path>, device: &Device, config: BlazeFaceConfig) -> Result<Self> {
        let path = path.as_ref();
        let vb = load_safetensors(path, device)?;
        Self::new(vb, config)
            .with_context(|| format!("Invalid BlazeFace weights: {}", path.display()))
    }

    /// Resizes to the network input and maps pixels to `[-1, 1]`, NCHW.
    fn preprocess(&self, raster: &RgbImage) -> Result<Tensor> {
        let side = INPUT_SIZE as u32;
        let resized = imageops::resize(raster, side, side, FilterType::Triangle);
        let data: Vec<f32> = resized
            .as_raw()
            .iter()
            .map(|&v| f32::from(v) / 127.5 - 1.0)
            .collect();

        Tensor::from_vec(data, (1, INPUT_SIZE, INPUT_SIZE, 3), &self.device)?
            .permute((0, 3, 1, 2))?
            .contiguous()
            .context("Failed to build BlazeFace input")
    }

    /// Returns `(scores, regressions)` with shapes `(896,)` and `(896, 16)`.
    fn forward(&self, x: &Tensor) -> Result<(Vec<f32>, Vec<Vec<f32>>)> {
        let x = x.pad_with_zeros(2, 1, 2)?.pad_with_zeros(3, 1, 2)?;
        let mut h = self.conv0.forward(&x)?.relu()?;
        for block in &self.backbone_16 {
            h = block.forward(&h)?;
        }
        let features_16 = h.clone();
        for block in &self.backbone_8 {
            h = block.forward(&h)?;
        }
        let features_8 = h;

        let flatten = |t: Tensor, n: usize, width: usize| -> candle_core::Result<Tensor> {
            t.permute((0, 2, 3, 1))?.reshape((n, width))
        };

        let scores = Tensor::cat(
            &[
                flatten(self.classifier_16.forward(&features_16)?, ANCHORS_16, 1)?,
                flatten(self.classifier_8.forward(&features_8)?, ANCHORS_8, 1)?,
            ],
            0,
        )?;
        let boxes = Tensor::cat(
            &[
                flatten(self.regressor_16.forward(&features_16)?, ANCHORS_16, REGRESSION_WIDTH)?,
                flatten(self.regressor_8.forward(&features_8)?, ANCHORS_8, REGRESSION_WIDTH)?,
            ],
            0,
        )?;

        Ok((scores.flatten_all()?.to_vec1()?, boxes.to_vec2()?))
    }

    fn decode(&self, scores: &[f32], boxes: &[Vec<f32>]) -> Vec<RawDetection> {
        let size = INPUT_SIZE as f32;
        let detections: Vec<RawDetection> = scores
            .iter()
            .zip(boxes)
            .zip(&self.anchors)
            .filter_map(|((&logit, reg), &[ax, ay])| {
                let score = sigmoid(logit);
                if score < self.config.min_score {
                    return None;
                }
                let cx = ax + reg[0] / size;
                let cy = ay + reg[1] / size;
                let (w, h) = (reg[2] / size, reg[3] / size);
                Some(RawDetection {
                    bbox: [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0],
                    score,
                })
            })
            .collect();

        non_max_suppression(detections, self.config.nms_threshold)
    }
}

impl FaceDetector for BlazeFace {
    fn name(&self) -> &'static str {
        "blazeface"
    }

    fn detect(&self, raster: &RgbImage) -> Result<Vec<DetectionCandidate>> {
        let (width, height) = raster.dimensions();
        let input = self.preprocess(raster)?;
        let (scores, boxes) = self.forward(&input).context("BlazeFace forward pass failed")?;
        let detections = self.decode(&scores, &boxes);
        debug!(faces = detections.len(), "BlazeFace decoded detections");

        Ok(detections
            .into_iter()
            .map(|d| {
                let candidate = to_candidate(&d, width, height);
                trace!(?candidate, "Face candidate");
                candidate
            })
            .collect())
    }
}

/// Anchor centers: two per cell on the 16x16 grid, six per cell on 8x8.
fn anchors() -> Vec<[f32; 2]> {
    let grid = |cells: u8, per_cell: usize| {
        (0..cells).flat_map(move |y| {
            (0..cells).flat_map(move |x| {
                let n = f32::from(cells);
                let center = [(f32::from(x) + 0.5) / n, (f32::from(y) + 0.5) / n];
                std::iter::repeat(center).take(per_cell)
            })
        })
    };
    grid(16, 2).chain(grid(8, 6)).collect()
}

/// Scales a normalized detection to pixel coordinates of the raster.
fn to_candidate(detection: &RawDetection, width: u32, height: u32) -> DetectionCandidate {
    let [x_min, y_min, x_max, y_max] = detection.bbox;
    let (w, h) = (width as f32, height as f32);
    DetectionCandidate::new(
        PixelBox::new(x_min * w, y_min * h, (x_max - x_min) * w, (y_max - y_min) * h),
        detection.score,
    )
}

/// Greedy suppression, highest score first.
fn non_max_suppression(mut detections: Vec<RawDetection>, threshold: f32) -> Vec<RawDetection> {
    detections.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut keep: Vec<RawDetection> = Vec::with_capacity(detections.len());
    for det in detections {
        if keep.iter().all(|k| iou(&k.bbox, &det.bbox) < threshold) {
            keep.push(det);
        }
    }
    keep
}

/// Intersection over union of two corner-form boxes.
fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let iw = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let ih = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let intersection = iw * ih;
    let union = (a[2] - a[0]) * (a[3] - a[1]) + (b[2] - b[0]) * (b[3] - b[1]) - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

#[inline]
fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
