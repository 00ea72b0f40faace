// ============================================================
// Layer 5 — Shared Building Blocks
// ============================================================
// Layers used by more than one topology:
//
//   same_conv          — k×k conv, stride 1, "same" padding,
//                        Glorot-normal weights
//   ConvBlock          — conv → [bn] → relu, twice
//   ResidualBottleneck — 1×1 → 3×3 → 1×1 convs plus a skip
//                        path (projected by a 1×1 conv when the
//                        channel count changes)
//   Upsample           — 2× up-sampling, either a strided
//                        transposed conv or nearest-neighbour
//
// All spatial sizes assume rows/cols divisible by 2 at every
// pooling level; then up-sampling restores the exact size.

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig, ConvTranspose2d, ConvTranspose2dConfig},
        BatchNorm, BatchNormConfig, Initializer, PaddingConfig2d,
    },
    prelude::*,
    tensor::activation::relu,
};

pub fn glorot() -> Initializer {
    Initializer::XavierNormal { gain: 1.0 }
}

/// k×k convolution with "same" padding (odd `kernel` only).
pub fn same_conv<B: Backend>(
    in_channels:  usize,
    out_channels: usize,
    kernel:       usize,
    device:       &B::Device,
) -> Conv2d<B> {
    Conv2dConfig::new([in_channels, out_channels], [kernel, kernel])
        .with_padding(PaddingConfig2d::Same)
        .with_initializer(glorot())
        .init(device)
}

/// 3×3 transposed conv doubling rows and cols.
///
/// The transposed-conv config only passes fan-in to its initializer,
/// so the Glorot weights are drawn here with both fans.
pub fn up_conv<B: Backend>(in_channels: usize, out_channels: usize, device: &B::Device) -> ConvTranspose2d<B> {
    const K: usize = 3;
    // out = (in - 1) * 2 - 2 * 1 + 3 + 1 = 2 * in
    let mut conv = ConvTranspose2dConfig::new([in_channels, out_channels], [K, K])
        .with_stride([2, 2])
        .with_padding([1, 1])
        .with_padding_out([1, 1])
        .init(device);
    conv.weight = glorot().init_with(
        [in_channels, out_channels, K, K],
        Some(out_channels * K * K),
        Some(in_channels * K * K),
        device,
    );
    conv
}

/// Nearest-neighbour 2× up-sampling: [b, c, h, w] → [b, c, 2h, 2w].
pub fn upsample_nearest<B: Backend>(x: Tensor<B, 4>) -> Tensor<B, 4> {
    let [b, c, h, w] = x.dims();
    x.reshape([b, c, h, 1, w, 1])
        .expand([b, c, h, 2, w, 2])
        .reshape([b, c, h * 2, w * 2])
}

// ─── ConvBlock ────────────────────────────────────────────────────────────────

#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    conv1: Conv2d<B>,
    bn1:   Option<BatchNorm<B, 2>>,
    conv2: Conv2d<B>,
    bn2:   Option<BatchNorm<B, 2>>,
}

impl<B: Backend> ConvBlock<B> {
    pub fn new(
        in_channels:  usize,
        out_channels: usize,
        kernel:       usize,
        batch_norm:   bool,
        device:       &B::Device,
    ) -> Self {
        let bn = || batch_norm.then(|| BatchNormConfig::new(out_channels).init(device));
        Self {
            conv1: same_conv(in_channels, out_channels, kernel, device),
            bn1:   bn(),
            conv2: same_conv(out_channels, out_channels, kernel, device),
            bn2:   bn(),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv1.forward(x);
        let x = match &self.bn1 { Some(bn) => bn.forward(x), None => x };
        let x = relu(x);
        let x = self.conv2.forward(x);
        let x = match &self.bn2 { Some(bn) => bn.forward(x), None => x };
        relu(x)
    }
}

// ─── ResidualBottleneck ───────────────────────────────────────────────────────

#[derive(Module, Debug)]
pub struct ResidualBottleneck<B: Backend> {
    conv1:  Conv2d<B>,
    conv2:  Conv2d<B>,
    conv3:  Conv2d<B>,
    skip:   Option<Conv2d<B>>,
    /// relu after every conv when true, identity otherwise
    relu:   bool,
}

impl<B: Backend> ResidualBottleneck<B> {
    pub fn new(
        in_channels:       usize,
        out_channels:      usize,
        bottleneck_factor: usize,
        relu:              bool,
        device:            &B::Device,
    ) -> Self {
        let bottleneck = (out_channels / bottleneck_factor.max(1)).max(1);
        Self {
            conv1: same_conv(in_channels, bottleneck, 1, device),
            conv2: same_conv(bottleneck, bottleneck, 3, device),
            conv3: same_conv(bottleneck, out_channels, 1, device),
            skip:  (in_channels != out_channels).then(|| same_conv(in_channels, out_channels, 1, device)),
            relu,
        }
    }

    fn act(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        if self.relu { relu(x) } else { x }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let y = self.act(self.conv1.forward(x.clone()));
        let y = self.act(self.conv2.forward(y));
        let y = self.act(self.conv3.forward(y));
        let skip = match &self.skip {
            Some(conv) => self.act(conv.forward(x)),
            None       => x,
        };
        skip + y
    }
}

// ─── Upsample ─────────────────────────────────────────────────────────────────

#[derive(Module, Debug)]
pub struct Upsample<B: Backend> {
    /// None → nearest-neighbour up-sampling
    conv: Option<ConvTranspose2d<B>>,
}

impl<B: Backend> Upsample<B> {
    pub fn new(channels: usize, nearest: bool, device: &B::Device) -> Self {
        Self { conv: (!nearest).then(|| up_conv(channels, channels, device)) }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        match &self.conv {
            Some(conv) => relu(conv.forward(x)),
            None       => upsample_nearest(x),
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TB = NdArray;

    #[test]
    fn test_same_conv_keeps_size() {
        let device = Default::default();
        let conv   = same_conv::<TB>(2, 5, 3, &device);
        let y      = conv.forward(Tensor::zeros([1, 2, 8, 6], &device));
        assert_eq!(y.dims(), [1, 5, 8, 6]);
    }

    #[test]
    fn test_up_conv_doubles_size() {
        let device = Default::default();
        let up     = up_conv::<TB>(3, 2, &device);
        let y      = up.forward(Tensor::zeros([2, 3, 4, 5], &device));
        assert_eq!(y.dims(), [2, 2, 8, 10]);
    }

    #[test]
    fn test_up_conv_weights_are_glorot_scaled() {
        let device = Default::default();
        let up     = up_conv::<TB>(8, 4, &device);
        assert_eq!(up.weight.dims(), [8, 4, 3, 3]);

        // std = sqrt(2 / (fan_in + fan_out)) = sqrt(2 / 108)
        let w: Vec<f32> = up.weight.val().into_data().to_vec().unwrap();
        let var = w.iter().map(|v| v * v).sum::<f32>() / w.len() as f32;
        assert!(var > 0.0);
        assert!(var < 0.1, "variance {var} too large for Glorot init");
    }

    #[test]
    fn test_upsample_nearest_repeats_pixels() {
        let device = Default::default();
        let x = Tensor::<TB, 1>::from_floats([1.0, 2.0, 3.0, 4.0], &device).reshape([1, 1, 2, 2]);
        let y: Vec<f32> = upsample_nearest(x).into_data().to_vec().unwrap();
        assert_eq!(
            y,
            vec![
                1.0, 1.0, 2.0, 2.0,
                1.0, 1.0, 2.0, 2.0,
                3.0, 3.0, 4.0, 4.0,
                3.0, 3.0, 4.0, 4.0,
            ]
        );
    }

    #[test]
    fn test_residual_projection_only_when_needed() {
        let device = Default::default();
        let same   = ResidualBottleneck::<TB>::new(8, 8, 2, true, &device);
        let proj   = ResidualBottleneck::<TB>::new(3, 8, 2, true, &device);
        assert!(same.skip.is_none());
        assert!(proj.skip.is_some());
        let y = proj.forward(Tensor::zeros([1, 3, 4, 4], &device));
        assert_eq!(y.dims(), [1, 8, 4, 4]);
    }

    #[test]
    fn test_conv_block_with_batch_norm() {
        let device = Default::default();
        let block  = ConvBlock::<TB>::new(1, 4, 3, true, &device);
        let y      = block.forward(Tensor::ones([2, 1, 6, 6], &device));
        assert_eq!(y.dims(), [2, 4, 6, 6]);
    }
}
