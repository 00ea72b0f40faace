// ============================================================
// Layer 5 — Hourglass Networks
// ============================================================
// Keypoint / segmentation networks built from residual
// bottleneck modules.
//
// One hourglass body (depth 4):
//
//   res ─► pool ─► res ─► pool ─► res ─► pool ─► res ─► pool ─► res
//    │              │              │              │              │
//    │              │              │              │              up
//    │              │              │              └──── add ◄────┘
//    │              │              │                    res ─► up
//    │              │              └────────── add ◄─────────────┘
//    ⋮              ⋮                          ...
//    └───────────────────────── add ◄── up ◄── res
//                                │
//                               res ─► features
//
// Hourglass        = body + linear 3×3 conv head
// StackedHourglass = body ─► body, each followed by a linear
//                    residual head (bottleneck factor 1), giving
//                    two supervised outputs (intermediate
//                    supervision of the first stage).

use burn::{
    nn::{
        conv::Conv2d,
        pool::{MaxPool2d, MaxPool2dConfig},
    },
    prelude::*,
};

use crate::ml::blocks::{same_conv, ResidualBottleneck, Upsample};

// ─── HourglassBody ────────────────────────────────────────────────────────────

#[derive(Module, Debug)]
pub struct HourglassBody<B: Backend> {
    down:   Vec<ResidualBottleneck<B>>,
    bottom: ResidualBottleneck<B>,
    ups:    Vec<Upsample<B>>,
    up_res: Vec<ResidualBottleneck<B>>,
    pool:   MaxPool2d,
}

impl<B: Backend> HourglassBody<B> {
    pub fn new(
        in_channels: usize,
        filters:     usize,
        depth:       usize,
        nearest_up:  bool,
        device:      &B::Device,
    ) -> Self {
        let down = (0..depth)
            .map(|i| ResidualBottleneck::new(if i == 0 { in_channels } else { filters }, filters, 2, true, device))
            .collect();
        let bottom_in = if depth == 0 { in_channels } else { filters };

        Self {
            down,
            bottom: ResidualBottleneck::new(bottom_in, filters, 2, true, device),
            ups:    (0..depth).map(|_| Upsample::new(filters, nearest_up, device)).collect(),
            up_res: (0..depth).map(|_| ResidualBottleneck::new(filters, filters, 2, true, device)).collect(),
            pool:   MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
        }
    }

    /// [b, in, h, w] → [b, filters, h, w]
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut skips = Vec::with_capacity(self.down.len());
        let mut x = x;
        for res in &self.down {
            let pre = res.forward(x);
            x = self.pool.forward(pre.clone());
            skips.push(pre);
        }

        let mut x = self.bottom.forward(x);

        // deepest skip first
        for ((up, res), skip) in self.ups.iter().zip(&self.up_res).zip(skips.into_iter().rev()) {
            x = res.forward(skip + up.forward(x));
        }
        x
    }
}

#[derive(Config, Debug)]
pub struct HourglassConfig {
    pub input_channels:  usize,
    pub output_channels: usize,
    #[config(default = 64)]
    pub filters:         usize,
    #[config(default = 4)]
    pub depth:           usize,
    /// Nearest-neighbour up-sampling instead of transposed convs
    #[config(default = false)]
    pub upsampling_layers: bool,
}

// ─── Hourglass ────────────────────────────────────────────────────────────────

#[derive(Module, Debug)]
pub struct Hourglass<B: Backend> {
    body: HourglassBody<B>,
    head: Conv2d<B>,
}

impl HourglassConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Hourglass<B> {
        let filters = self.filters.max(1);
        Hourglass {
            body: HourglassBody::new(self.input_channels, filters, self.depth, self.upsampling_layers, device),
            head: same_conv(filters, self.output_channels, 3, device),
        }
    }

    pub fn init_stacked<B: Backend>(&self, device: &B::Device) -> StackedHourglass<B> {
        let filters = self.filters.max(1);
        StackedHourglass {
            first:      HourglassBody::new(self.input_channels, filters, self.depth, self.upsampling_layers, device),
            second:     HourglassBody::new(filters, filters, self.depth, self.upsampling_layers, device),
            first_out:  ResidualBottleneck::new(filters, self.output_channels, 1, false, device),
            second_out: ResidualBottleneck::new(filters, self.output_channels, 1, false, device),
        }
    }
}

impl<B: Backend> Hourglass<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.head.forward(self.body.forward(x))
    }
}

// ─── StackedHourglass ─────────────────────────────────────────────────────────

#[derive(Module, Debug)]
pub struct StackedHourglass<B: Backend> {
    first:      HourglassBody<B>,
    second:     HourglassBody<B>,
    first_out:  ResidualBottleneck<B>,
    second_out: ResidualBottleneck<B>,
}

impl<B: Backend> StackedHourglass<B> {
    /// Both supervised outputs: (intermediate, final).
    pub fn forward(&self, x: Tensor<B, 4>) -> (Tensor<B, 4>, Tensor<B, 4>) {
        let features1 = self.first.forward(x);
        let features2 = self.second.forward(features1.clone());
        (self.first_out.forward(features1), self.second_out.forward(features2))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TB = NdArray;

    #[test]
    fn test_hourglass_output_channels() {
        let device = Default::default();
        for nearest in [false, true] {
            let model = HourglassConfig::new(1, 6)
                .with_filters(4)
                .with_upsampling_layers(nearest)
                .init::<TB>(&device);
            let y = model.forward(Tensor::zeros([2, 1, 32, 16], &device));
            assert_eq!(y.dims(), [2, 6, 32, 16]);
        }
    }

    #[test]
    fn test_stacked_hourglass_has_two_full_size_outputs() {
        let device = Default::default();
        let model  = HourglassConfig::new(3, 2).with_filters(4).init_stacked::<TB>(&device);
        let (a, b) = model.forward(Tensor::ones([1, 3, 16, 32], &device));
        assert_eq!(a.dims(), [1, 2, 16, 32]);
        assert_eq!(b.dims(), [1, 2, 16, 32]);
    }

    #[test]
    fn test_shallow_body() {
        let device = Default::default();
        let model  = HourglassConfig::new(2, 1).with_filters(3).with_depth(1).init::<TB>(&device);
        let y      = model.forward(Tensor::zeros([1, 2, 6, 6], &device));
        assert_eq!(y.dims(), [1, 1, 6, 6]);
    }
}
