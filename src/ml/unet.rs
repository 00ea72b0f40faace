// ============================================================
// Layer 5 — U-Net Encoder-Decoder
// ============================================================
// Region proposal network.
//
//   input ─► [high-pass] ─► enc0 ─► pool ─► enc1 ─► ... ─► bottom
//                             │               │              │
//                             └──── cat ◄─ up ┴── ... ◄─ up ◄┘
//                                    │
//                                  dec0 ─► 1×1 conv ─► output
//
// Level i works with `filters * 2^i` channels. Every encoder
// output is concatenated with the up-sampled decoder input at
// the same level. The head is linear.
//
// Optional high-pass input filter: each input channel has a
// fixed Gaussian blur of width `high_pass_sigma` subtracted,
// removing slow background variation before the first conv.

use burn::{
    nn::{
        conv::{Conv2d, ConvTranspose2d},
        pool::{MaxPool2d, MaxPool2dConfig},
    },
    prelude::*,
    tensor::{activation::relu, module::conv2d, ops::ConvOptions, TensorData},
};

use crate::ml::blocks::{same_conv, up_conv, ConvBlock};

#[derive(Config, Debug)]
pub struct UNetConfig {
    pub input_channels:  usize,
    pub output_channels: usize,
    #[config(default = 16)]
    pub filters:         usize,
    #[config(default = 4)]
    pub depth:           usize,
    #[config(default = 3)]
    pub kernel_size:     usize,
    #[config(default = false)]
    pub batch_norm:      bool,
    /// 0 disables the high-pass input filter
    #[config(default = 0.0)]
    pub high_pass_sigma: f64,
}

#[derive(Module, Debug)]
pub struct UpBlock<B: Backend> {
    up:    ConvTranspose2d<B>,
    block: ConvBlock<B>,
}

#[derive(Module, Debug)]
pub struct UNet<B: Backend> {
    encoders:        Vec<ConvBlock<B>>,
    pool:            MaxPool2d,
    bottom:          ConvBlock<B>,
    decoders:        Vec<UpBlock<B>>,
    head:            Conv2d<B>,
    high_pass_sigma: f64,
}

impl UNetConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> UNet<B> {
        let width = |level: usize| self.filters.max(1) << level;

        let encoders = (0..self.depth)
            .map(|level| {
                let in_ch = if level == 0 { self.input_channels } else { width(level - 1) };
                ConvBlock::new(in_ch, width(level), self.kernel_size, self.batch_norm, device)
            })
            .collect();

        let bottom_in = if self.depth == 0 { self.input_channels } else { width(self.depth - 1) };
        let bottom    = ConvBlock::new(bottom_in, width(self.depth), self.kernel_size, self.batch_norm, device);

        // decoders[i] brings level i+1 back to level i
        let decoders = (0..self.depth)
            .map(|level| UpBlock {
                up:    up_conv(width(level + 1), width(level), device),
                block: ConvBlock::new(width(level) * 2, width(level), self.kernel_size, self.batch_norm, device),
            })
            .collect();

        UNet {
            encoders,
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            bottom,
            decoders,
            head: same_conv(width(0), self.output_channels, 1, device),
            high_pass_sigma: self.high_pass_sigma,
        }
    }
}

impl<B: Backend> UNet<B> {
    /// [batch, input_channels, rows, cols] → [batch, output_channels, rows, cols]
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut x = if self.high_pass_sigma > 0.0 {
            high_pass(x, self.high_pass_sigma)
        } else {
            x
        };

        let mut skips = Vec::with_capacity(self.encoders.len());
        for enc in &self.encoders {
            let feat = enc.forward(x);
            x = self.pool.forward(feat.clone());
            skips.push(feat);
        }

        let mut x = self.bottom.forward(x);

        for (dec, skip) in self.decoders.iter().zip(skips).rev() {
            let up = relu(dec.up.forward(x));
            x = dec.block.forward(Tensor::cat(vec![skip, up], 1));
        }

        self.head.forward(x)
    }
}

/// Subtract a separable Gaussian blur (zero padded) from every channel.
pub fn high_pass<B: Backend>(x: Tensor<B, 4>, sigma: f64) -> Tensor<B, 4> {
    let [_, channels, _, _] = x.dims();
    let device = x.device();
    let kernel = gaussian_kernel(sigma);
    let k      = kernel.len();
    let radius = k / 2;

    let weights: Vec<f32> = kernel.iter().copied().cycle().take(k * channels).collect();
    let horizontal = Tensor::<B, 4>::from_data(TensorData::new(weights.clone(), [channels, 1, 1, k]), &device);
    let vertical   = Tensor::<B, 4>::from_data(TensorData::new(weights, [channels, 1, k, 1]), &device);

    let blurred = conv2d(
        x.clone(),
        horizontal,
        None,
        ConvOptions::new([1, 1], [0, radius], [1, 1], channels),
    );
    let blurred = conv2d(
        blurred,
        vertical,
        None,
        ConvOptions::new([1, 1], [radius, 0], [1, 1], channels),
    );

    x - blurred
}

/// Normalised 1-D Gaussian covering ±3σ.
pub fn gaussian_kernel(sigma: f64) -> Vec<f32> {
    let radius = (3.0 * sigma).ceil().max(1.0) as i64;
    let raw: Vec<f64> = (-radius..=radius)
        .map(|i| (-(i * i) as f64 / (2.0 * sigma * sigma)).exp())
        .collect();
    let sum: f64 = raw.iter().sum();
    raw.iter().map(|v| (v / sum) as f32).collect()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TB = NdArray;

    #[test]
    fn test_output_channels_and_size() {
        let device = Default::default();
        for (filters, out) in [(2, 1), (4, 3)] {
            let model = UNetConfig::new(4, out).with_filters(filters).with_depth(3).init::<TB>(&device);
            let y     = model.forward(Tensor::zeros([2, 4, 16, 24], &device));
            assert_eq!(y.dims(), [2, out, 16, 24]);
        }
    }

    #[test]
    fn test_batch_norm_and_high_pass() {
        let device = Default::default();
        let model  = UNetConfig::new(1, 3)
            .with_filters(2)
            .with_depth(2)
            .with_batch_norm(true)
            .with_high_pass_sigma(1.5)
            .init::<TB>(&device);
        let y = model.forward(Tensor::ones([1, 1, 8, 8], &device));
        assert_eq!(y.dims(), [1, 3, 8, 8]);
    }

    #[test]
    fn test_gaussian_kernel_normalised() {
        let k = gaussian_kernel(2.0);
        assert_eq!(k.len(), 13);
        assert!((k.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert!(k[6] > k[5] && k[5] > k[0]);
    }

    #[test]
    fn test_high_pass_removes_constant_interior() {
        let device = Default::default();
        let x      = Tensor::<TB, 4>::ones([1, 2, 20, 20], &device);
        let y      = high_pass(x, 1.0);
        // far from the zero-padded border a constant image is fully removed
        let centre: Vec<f32> = y.slice([0..1, 0..2, 9..11, 9..11]).into_data().to_vec().unwrap();
        assert!(centre.iter().all(|v| v.abs() < 1e-4));
    }
}
