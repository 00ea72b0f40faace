// ============================================================
// Layer 5 — Model Registry
// ============================================================
// Names the four topologies, holds the hyper-parameters
// shared by all of them, and gives the training loop one
// interface over their different output arities:
//
//   unet / leap / hourglass  → one output
//   stacked-hourglass        → two outputs (both supervised)
//
// Loss is the mean-squared error of every output against the
// same target, summed.

use burn::{
    nn::loss::{MseLoss, Reduction},
    prelude::*,
};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::ml::{
    hourglass::{Hourglass, HourglassConfig, StackedHourglass},
    leap::{Leap, LeapConfig},
    unet::{UNet, UNetConfig},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Architecture {
    Unet,
    Leap,
    Hourglass,
    StackedHourglass,
}

impl Architecture {
    pub fn name(&self) -> &'static str {
        match self {
            Architecture::Unet             => "unet",
            Architecture::Leap             => "leap",
            Architecture::Hourglass        => "hourglass",
            Architecture::StackedHourglass => "stacked-hourglass",
        }
    }

    /// Rows and cols must be divisible by this for output size = input size.
    pub fn size_multiple(&self, depth: usize) -> usize {
        match self {
            Architecture::Leap => 4,
            _                  => u32::try_from(depth)
                .ok()
                .and_then(|d| 1usize.checked_shl(d))
                .unwrap_or(usize::MAX),
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Architecture {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "unet"              => Ok(Architecture::Unet),
            "leap"              => Ok(Architecture::Leap),
            "hourglass"         => Ok(Architecture::Hourglass),
            "stacked-hourglass" => Ok(Architecture::StackedHourglass),
            other => anyhow::bail!("unknown architecture '{other}'"),
        }
    }
}

/// Hyper-parameters for any of the four topologies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSpec {
    pub architecture:      Architecture,
    pub input_channels:    usize,
    pub output_channels:   usize,
    pub filters:           usize,
    /// Pooling levels (unet, hourglass); leap is fixed at 2
    pub depth:             usize,
    pub batch_norm:        bool,
    pub high_pass_sigma:   f64,
    pub upsampling_layers: bool,
}

impl ModelSpec {
    pub fn unet_config(&self) -> UNetConfig {
        UNetConfig::new(self.input_channels, self.output_channels)
            .with_filters(self.filters)
            .with_depth(self.depth)
            .with_batch_norm(self.batch_norm)
            .with_high_pass_sigma(self.high_pass_sigma)
    }

    pub fn leap_config(&self) -> LeapConfig {
        LeapConfig::new(self.input_channels, self.output_channels).with_filters(self.filters)
    }

    pub fn hourglass_config(&self) -> HourglassConfig {
        HourglassConfig::new(self.input_channels, self.output_channels)
            .with_filters(self.filters)
            .with_depth(self.depth)
            .with_upsampling_layers(self.upsampling_layers)
    }
}

// ─── SegmentationModel ────────────────────────────────────────────────────────
/// Common interface of every image-to-image topology.
pub trait SegmentationModel<B: Backend> {
    /// Every supervised output, shallowest first.
    fn forward_outputs(&self, x: Tensor<B, 4>) -> Vec<Tensor<B, 4>>;

    /// The output used for predictions (the deepest one).
    fn predict(&self, x: Tensor<B, 4>) -> Tensor<B, 4>;

    /// Summed MSE of all outputs against `targets`.
    fn forward_loss(&self, x: Tensor<B, 4>, targets: Tensor<B, 4>) -> Tensor<B, 1> {
        mse_over_outputs(self.forward_outputs(x), targets)
    }
}

pub fn mse_over_outputs<B: Backend>(outputs: Vec<Tensor<B, 4>>, targets: Tensor<B, 4>) -> Tensor<B, 1> {
    let mse = MseLoss::new();
    outputs
        .into_iter()
        .map(|out| mse.forward(out, targets.clone(), Reduction::Mean))
        .reduce(|a, b| a + b)
        .unwrap_or_else(|| Tensor::zeros([1], &targets.device()))
}

impl<B: Backend> SegmentationModel<B> for UNet<B> {
    fn forward_outputs(&self, x: Tensor<B, 4>) -> Vec<Tensor<B, 4>> {
        vec![self.forward(x)]
    }

    fn predict(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.forward(x)
    }
}

impl<B: Backend> SegmentationModel<B> for Leap<B> {
    fn forward_outputs(&self, x: Tensor<B, 4>) -> Vec<Tensor<B, 4>> {
        vec![self.forward(x)]
    }

    fn predict(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.forward(x)
    }
}

impl<B: Backend> SegmentationModel<B> for Hourglass<B> {
    fn forward_outputs(&self, x: Tensor<B, 4>) -> Vec<Tensor<B, 4>> {
        vec![self.forward(x)]
    }

    fn predict(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.forward(x)
    }
}

impl<B: Backend> SegmentationModel<B> for StackedHourglass<B> {
    fn forward_outputs(&self, x: Tensor<B, 4>) -> Vec<Tensor<B, 4>> {
        let (first, second) = self.forward(x);
        vec![first, second]
    }

    fn predict(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.forward(x).1
    }
}
