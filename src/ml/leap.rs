// ============================================================
// Layer 5 — LEAP Encoder-Decoder
// ============================================================
// Small fully convolutional pose network:
//
//   3 × conv(f)   ─► pool
//   3 × conv(2f)  ─► pool
//   3 × conv(4f)
//   convT(2f) ─► 2 × conv(2f)
//   convT(out)                      (linear)
//
// Two poolings and two transposed convs, so the output has
// the input's size when rows/cols are divisible by 4.

use burn::{
    nn::{
        conv::{Conv2d, ConvTranspose2d},
        pool::{MaxPool2d, MaxPool2dConfig},
    },
    prelude::*,
    tensor::activation::relu,
};

use crate::ml::blocks::{same_conv, up_conv};

#[derive(Config, Debug)]
pub struct LeapConfig {
    pub input_channels:  usize,
    pub output_channels: usize,
    #[config(default = 64)]
    pub filters:         usize,
    #[config(default = 3)]
    pub kernel_size:     usize,
}

#[derive(Module, Debug)]
pub struct Leap<B: Backend> {
    stage1: Vec<Conv2d<B>>,
    stage2: Vec<Conv2d<B>>,
    stage3: Vec<Conv2d<B>>,
    up1:    ConvTranspose2d<B>,
    stage4: Vec<Conv2d<B>>,
    up2:    ConvTranspose2d<B>,
    pool:   MaxPool2d,
}

impl LeapConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Leap<B> {
        let f = self.filters.max(1);
        let k = self.kernel_size;
        let stage = |in_ch: usize, out_ch: usize, n: usize| -> Vec<Conv2d<B>> {
            (0..n)
                .map(|i| same_conv(if i == 0 { in_ch } else { out_ch }, out_ch, k, device))
                .collect()
        };

        Leap {
            stage1: stage(self.input_channels, f, 3),
            stage2: stage(f, f * 2, 3),
            stage3: stage(f * 2, f * 4, 3),
            up1:    up_conv(f * 4, f * 2, device),
            stage4: stage(f * 2, f * 2, 2),
            up2:    up_conv(f * 2, self.output_channels, device),
            pool:   MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
        }
    }
}

impl<B: Backend> Leap<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let run = |convs: &[Conv2d<B>], x: Tensor<B, 4>| {
            convs.iter().fold(x, |x, conv| relu(conv.forward(x)))
        };

        let x = self.pool.forward(run(&self.stage1, x));
        let x = self.pool.forward(run(&self.stage2, x));
        let x = run(&self.stage3, x);
        let x = run(&self.stage4, relu(self.up1.forward(x)));
        self.up2.forward(x)
    }
}
