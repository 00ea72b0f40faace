// ============================================================
// Layer 4 — Subframe Batcher
// ============================================================
// Implements Burn's Batcher trait to stack SubframeItems into
// NCHW tensors:
//
//   inputs:  [batch, input_channels,  rows, cols]
//   targets: [batch, target_channels, rows, cols]
//
// Every item of a generator shares the same window size and
// channel counts, so the flat buffers concatenate directly.

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
    tensor::TensorData,
};

use crate::data::generator::SubframeItem;

#[derive(Debug, Clone)]
pub struct SampleBatch<B: Backend> {
    pub inputs:  Tensor<B, 4>,
    pub targets: Tensor<B, 4>,
}

#[derive(Clone, Debug)]
pub struct SampleBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> SampleBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<SubframeItem, SampleBatch<B>> for SampleBatcher<B> {
    fn batch(&self, items: Vec<SubframeItem>) -> SampleBatch<B> {
        let batch_size = items.len();
        let first      = &items[0];
        let (c_in, c_out, rows, cols) = (first.input_channels, first.target_channels, first.rows, first.cols);

        let inputs: Vec<f32> = items.iter().flat_map(|i| i.inputs.iter().copied()).collect();
        let targets: Vec<f32> = items.iter().flat_map(|i| i.targets.iter().copied()).collect();

        let inputs = Tensor::<B, 4>::from_data(
            TensorData::new(inputs, [batch_size, c_in, rows, cols]),
            &self.device,
        );
        let targets = Tensor::<B, 4>::from_data(
            TensorData::new(targets, [batch_size, c_out, rows, cols]),
            &self.device,
        );

        SampleBatch { inputs, targets }
    }
}
