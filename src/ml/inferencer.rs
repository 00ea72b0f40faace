// ============================================================
// Layer 5 — Predictor
// ============================================================
// Rebuilds the architecture of a finished run from its
// train_config.json, loads the best checkpoint and renders
// prediction images:
//
//   windows:  fixed test batch → prediction{i}.png   (during training)
//   samples:  whole prepared images → <name>.png      (predict command)
//
// Whole images are cropped to the architecture's size multiple
// so every pooling level divides evenly.

use anyhow::{anyhow, bail, Result};
use burn::{
    backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice, NdArray, Wgpu},
    data::dataloader::batcher::Batcher,
    prelude::*,
    tensor::TensorData,
};
use ndarray::{s, Array2};
use std::path::{Path, PathBuf};

use crate::application::train_use_case::TrainConfig;
use crate::data::{augment::normalize, batcher::SampleBatcher, generator::SubframeItem};
use crate::domain::sample::TrainingSample;
use crate::infra::{
    checkpoint::CheckpointManager,
    visualize::{save_prediction_img, RenderOptions},
};
use crate::ml::model::{Architecture, SegmentationModel};

// ─── Window predictions ───────────────────────────────────────────────────────

/// Split a flat (c, rows, cols) buffer into one image per channel.
pub fn split_channels(flat: &[f32], channels: usize, rows: usize, cols: usize) -> Result<Vec<Array2<f32>>> {
    let plane = rows * cols;
    if flat.len() != channels * plane {
        bail!("buffer of {} values cannot hold {} channels of {}x{}", flat.len(), channels, rows, cols);
    }
    flat.chunks(plane.max(1))
        .take(channels)
        .map(|c| Array2::from_shape_vec((rows, cols), c.to_vec()).map_err(|e| anyhow!("{e}")))
        .collect()
}

fn tensor_to_vec<B: Backend>(t: Tensor<B, 4>) -> Result<Vec<f32>> {
    t.into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| anyhow!("Cannot read prediction tensor: {e:?}"))
}

/// Predict every window and write `prediction{i}.png` into `dir`.
pub fn render_window_predictions<B: Backend, M: SegmentationModel<B>>(
    model:  &M,
    items:  &[SubframeItem],
    device: &B::Device,
    dir:    &Path,
    opts:   &RenderOptions,
) -> Result<Vec<PathBuf>> {
    if items.is_empty() {
        return Ok(Vec::new());
    }
    let batch = SampleBatcher::<B>::new(device.clone()).batch(items.to_vec());
    let [_, c_out, rows, cols] = batch.targets.dims();
    let preds = tensor_to_vec(model.predict(batch.inputs))?;

    let mut written = Vec::with_capacity(items.len());
    for (i, (item, pred)) in items.iter().zip(preds.chunks(c_out * rows * cols)).enumerate() {
        let inputs  = split_channels(&item.inputs, item.input_channels, item.rows, item.cols)?;
        let targets = split_channels(&item.targets, item.target_channels, item.rows, item.cols)?;
        let pred    = split_channels(pred, c_out, rows, cols)?;

        let path = dir.join(format!("prediction{i}.png"));
        save_prediction_img(&path, &inputs, &targets, Some(pred.as_slice()), opts)?;
        written.push(path);
    }
    Ok(written)
}

// ─── Predictor ────────────────────────────────────────────────────────────────

pub struct Predictor<B: Backend, M> {
    model:     M,
    multiple:  usize,
    normalize: bool,
    device:    B::Device,
}

impl<B: Backend, M: SegmentationModel<B>> Predictor<B, M> {
    pub fn new(model: M, cfg: &TrainConfig, device: B::Device) -> Self {
        Self {
            model,
            multiple:  cfg.architecture.size_multiple(cfg.depth),
            normalize: cfg.normalize_subframes,
            device,
        }
    }

    /// Largest (rows, cols) not exceeding `shape` that the network accepts.
    pub fn cropped_shape(&self, shape: (usize, usize)) -> (usize, usize) {
        let m = self.multiple.max(1);
        (shape.0 - shape.0 % m, shape.1 - shape.1 % m)
    }

    /// Inputs and targets of `sample` cropped to the accepted size.
    fn prepare(&self, sample: &TrainingSample) -> Result<(Vec<Array2<f32>>, Vec<Array2<f32>>)> {
        let (rows, cols) = self.cropped_shape(sample.shape());
        if rows == 0 || cols == 0 {
            bail!(
                "sample '{}' of shape {:?} is smaller than the network's size multiple {}",
                sample.name, sample.shape(), self.multiple
            );
        }
        let crop = |m: &Array2<f32>| m.slice(s![..rows, ..cols]).to_owned();
        let mut inputs: Vec<Array2<f32>> = sample.inputs.iter().map(|m| crop(&m.data)).collect();
        if self.normalize {
            inputs.iter_mut().for_each(normalize);
        }
        let targets = sample.targets.iter().map(|m| crop(&m.data)).collect();
        Ok((inputs, targets))
    }

    /// Network output for the whole (cropped) sample, one image per channel.
    pub fn predict_sample(&self, sample: &TrainingSample) -> Result<Vec<Array2<f32>>> {
        let (inputs, _) = self.prepare(sample)?;
        self.predict_inputs(&inputs)
    }

    /// Run the network on already cropped and normalised input channels.
    pub fn predict_inputs(&self, inputs: &[Array2<f32>]) -> Result<Vec<Array2<f32>>> {
        let Some(first) = inputs.first() else {
            bail!("prediction needs at least one input channel");
        };
        let (rows, cols) = first.dim();
        let flat: Vec<f32> = inputs.iter().flat_map(|m| m.iter().copied()).collect();

        let x = Tensor::<B, 4>::from_data(
            TensorData::new(flat, [1, inputs.len(), rows, cols]),
            &self.device,
        );
        let out = self.model.predict(x);
        let [_, c_out, _, _] = out.dims();
        split_channels(&tensor_to_vec(out)?, c_out, rows, cols)
    }

    /// Write `<out_dir>/<sample name>.png`.
    pub fn render_sample(&self, sample: &TrainingSample, out_dir: &Path, opts: &RenderOptions) -> Result<PathBuf> {
        let (inputs, targets) = self.prepare(sample)?;
        let preds = self.predict_inputs(&inputs)?;
        let path  = out_dir.join(format!("{}.png", sample.name));
        save_prediction_img(&path, &inputs, &targets, Some(preds.as_slice()), opts)?;
        tracing::info!("Prediction for '{}' written to '{}'", sample.name, path.display());
        Ok(path)
    }
}

/// Reload the best model of `run_dir` and render every sample into `out_dir`.
pub fn predict_run(
    run_dir: &Path,
    samples: &[TrainingSample],
    out_dir: &Path,
    opts:    &RenderOptions,
    use_cpu: bool,
) -> Result<Vec<PathBuf>> {
    if use_cpu {
        predict_on::<NdArray>(run_dir, samples, out_dir, opts, NdArrayDevice::default())
    } else {
        predict_on::<Wgpu>(run_dir, samples, out_dir, opts, WgpuDevice::default())
    }
}

fn predict_on<B: Backend>(
    run_dir: &Path,
    samples: &[TrainingSample],
    out_dir: &Path,
    opts:    &RenderOptions,
    device:  B::Device,
) -> Result<Vec<PathBuf>> {
    let cfg  = crate::infra::checkpoint::load_config(run_dir)?;
    let spec = cfg.model_spec();
    let ckpt = CheckpointManager::new(run_dir, spec.architecture.name())?;
    let best = ckpt.best()?;
    tracing::info!("Loading {} from epoch {} (val_loss={:.6})", spec.architecture, best.epoch, best.val_loss);

    match spec.architecture {
        Architecture::Unet => {
            let model = ckpt.load_best(spec.unet_config().init::<B>(&device), &device)?;
            render_all(Predictor::new(model, &cfg, device), samples, out_dir, opts)
        }
        Architecture::Leap => {
            let model = ckpt.load_best(spec.leap_config().init::<B>(&device), &device)?;
            render_all(Predictor::new(model, &cfg, device), samples, out_dir, opts)
        }
        Architecture::Hourglass => {
            let model = ckpt.load_best(spec.hourglass_config().init::<B>(&device), &device)?;
            render_all(Predictor::new(model, &cfg, device), samples, out_dir, opts)
        }
        Architecture::StackedHourglass => {
            let model = ckpt.load_best(spec.hourglass_config().init_stacked::<B>(&device), &device)?;
            render_all(Predictor::new(model, &cfg, device), samples, out_dir, opts)
        }
    }
}

fn render_all<B: Backend, M: SegmentationModel<B>>(
    predictor: Predictor<B, M>,
    samples:   &[TrainingSample],
    out_dir:   &Path,
    opts:      &RenderOptions,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(out_dir)?;
    samples
        .iter()
        .map(|s| predictor.render_sample(s, out_dir, opts))
        .collect()
}
