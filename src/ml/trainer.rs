// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Train + validation loop using Burn's DataLoader and Adam,
// with early stopping and best-only checkpointing:
//
//   for each epoch:
//     train on fresh augmented windows      (Autodiff backend)
//     evaluate on the test generator        (inner backend)
//     log metrics to every tracker
//     improved?  → save checkpoint
//     patience exhausted? → stop
//     optionally render prediction images
//
//   afterwards:
//     write loss history, delete superseded checkpoints,
//     reload the best weights, render final predictions
//
// Key Burn insight:
//   - Training uses Autodiff<Backend> for gradients
//   - model.valid() returns the model on the inner backend
//   - The validation batcher must also use the inner backend
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::Result;
use burn::{
    backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice, Autodiff, NdArray, Wgpu},
    data::dataloader::DataLoaderBuilder,
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::{backend::AutodiffBackend, ElementConversion},
};
use std::path::Path;

use crate::application::train_use_case::TrainConfig;
use crate::data::{
    batcher::SampleBatcher,
    generator::SubframeGenerator,
};
use crate::domain::traits::{EpochMetrics, ExperimentTracker};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::TrainingHistory,
    visualize::RenderOptions,
};
use crate::ml::{
    early_stopping::{EarlyStopping, Verdict},
    inferencer::render_window_predictions,
    model::{Architecture, SegmentationModel},
};

/// Seed of the fixed test batch rendered after every epoch.
const PREVIEW_SEED: u64 = 0;

/// Everything the loop needs besides the model.
pub struct TrainingRun<'a> {
    pub cfg:      &'a TrainConfig,
    pub train:    SubframeGenerator,
    pub test:     SubframeGenerator,
    pub ckpt:     CheckpointManager,
    pub trackers: Vec<Box<dyn ExperimentTracker>>,
}

#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub history:    TrainingHistory,
    pub best_epoch: Option<usize>,
    pub best_loss:  f64,
    pub stopped_early: bool,
}

/// Pick the backend, build the configured architecture and train it.
pub fn run_training(run: TrainingRun<'_>) -> Result<TrainingOutcome> {
    if run.cfg.use_cpu {
        let device = NdArrayDevice::default();
        tracing::info!("Using NdArray CPU device");
        dispatch::<Autodiff<NdArray>>(run, device)
    } else {
        let device = WgpuDevice::default();
        tracing::info!("Using WGPU device: {:?}", device);
        dispatch::<Autodiff<Wgpu>>(run, device)
    }
}

fn dispatch<B: AutodiffBackend>(run: TrainingRun<'_>, device: B::Device) -> Result<TrainingOutcome> {
    let spec = run.cfg.model_spec();
    tracing::info!(
        "Model ready: {} with {} filters, {} → {} channels",
        spec.architecture, spec.filters, spec.input_channels, spec.output_channels
    );
    match spec.architecture {
        Architecture::Unet             => train_loop(spec.unet_config().init::<B>(&device), run, device),
        Architecture::Leap             => train_loop(spec.leap_config().init::<B>(&device), run, device),
        Architecture::Hourglass        => train_loop(spec.hourglass_config().init::<B>(&device), run, device),
        Architecture::StackedHourglass => train_loop(spec.hourglass_config().init_stacked::<B>(&device), run, device),
    }
}

pub fn train_loop<B, M>(
    mut model: M,
    mut run:   TrainingRun<'_>,
    device:    B::Device,
) -> Result<TrainingOutcome>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + SegmentationModel<B>,
    M::InnerModule: SegmentationModel<B::InnerBackend>,
{
    let cfg = run.cfg;

    // ── Adam optimiser ────────────────────────────────────────────────────────
    let mut optim = AdamConfig::new().with_epsilon(1e-8).init();

    // ── Data loaders ──────────────────────────────────────────────────────────
    let preview = run.test.fixed_batch(cfg.batch_size, PREVIEW_SEED);

    let train_loader = DataLoaderBuilder::new(SampleBatcher::<B>::new(device.clone()))
        .batch_size(cfg.batch_size)
        .num_workers(cfg.num_workers)
        .build(run.train.clone());

    let test_loader = DataLoaderBuilder::new(SampleBatcher::<B::InnerBackend>::new(device.clone()))
        .batch_size(cfg.batch_size)
        .num_workers(cfg.num_workers)
        .build(run.test.clone());

    let render = RenderOptions { height: cfg.preview_height, x_contrast: (0.0, 100.0) };
    let mut early   = EarlyStopping::new(cfg.early_stopping).with_min_delta(cfg.min_delta);
    let mut history = TrainingHistory::default();
    let mut stopped_early = false;

    // ── Epoch loop ────────────────────────────────────────────────────────────
    for epoch in 1..=cfg.epochs {

        // ── Training phase ────────────────────────────────────────────────────
        let mut train_loss_sum = 0.0f64;
        let mut train_batches  = 0usize;

        for batch in train_loader.iter() {
            let loss = model.forward_loss(batch.inputs, batch.targets);

            train_loss_sum += loss.clone().into_scalar().elem::<f64>();
            train_batches  += 1;

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(cfg.lr, model, grads);
        }

        // ── Validation phase ──────────────────────────────────────────────────
        let model_valid = model.valid();

        let mut val_loss_sum = 0.0f64;
        let mut val_batches  = 0usize;
        for batch in test_loader.iter() {
            val_loss_sum += model_valid
                .forward_loss(batch.inputs, batch.targets)
                .into_scalar()
                .elem::<f64>();
            val_batches += 1;
        }

        let metrics = EpochMetrics::new(
            epoch,
            mean_or_nan(train_loss_sum, train_batches),
            mean_or_nan(val_loss_sum, val_batches),
        );

        println!(
            "Epoch {:>3}/{} | train_loss={:.6} | val_loss={:.6}",
            epoch, cfg.epochs, metrics.train_loss, metrics.val_loss,
        );

        history.push(&metrics);
        for tracker in run.trackers.iter_mut() {
            tracker.log_epoch(&metrics)?;
        }

        // ── Checkpoint / early stopping ───────────────────────────────────────
        let verdict = early.update(epoch, metrics.val_loss);
        if verdict == Verdict::Improved {
            run.ckpt.save_best(&model_valid, epoch, metrics.val_loss)?;
            tracing::info!("val_loss improved to {:.6}, checkpoint saved", metrics.val_loss);
        }

        if cfg.save_predictions_during_training {
            render_window_predictions(&model_valid, &preview, &device, run.ckpt.dir(), &render)?;
        }

        if verdict == Verdict::Stop {
            tracing::info!(
                "Early stopping at epoch {}: no improvement for {} epochs",
                epoch, cfg.early_stopping
            );
            stopped_early = true;
            break;
        }
    }

    for tracker in run.trackers.iter_mut() {
        tracker.finish()?;
    }
    history.save(run.ckpt.dir())?;

    // ── Keep the best checkpoint only and render final predictions ───────────
    if early.best_epoch().is_some() {
        run.ckpt.retain_best()?;
        let best = run.ckpt.load_best(model.valid(), &device)?;
        render_window_predictions(&best, &preview, &device, run.ckpt.dir(), &render)?;
    } else {
        tracing::warn!("Validation loss never improved; no checkpoint was saved");
    }

    tracing::info!("Training complete!");
    Ok(TrainingOutcome {
        history,
        best_epoch: early.best_epoch(),
        best_loss:  early.best_loss(),
        stopped_early,
    })
}

fn mean_or_nan(sum: f64, count: usize) -> f64 {
    if count > 0 { sum / count as f64 } else { f64::NAN }
}

/// Directory name of a new run: `yymmdd_HH.MM.SS`.
pub fn run_folder_name() -> String {
    chrono::Local::now().format("%y%m%d_%H.%M.%S").to_string()
}

/// `<data_dir>/models/<timestamp>`
pub fn new_run_dir(data_dir: &Path) -> std::path::PathBuf {
    data_dir.join("models").join(run_folder_name())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::generator::GeneratorConfig;
    use crate::domain::sample::{ImageMap, TrainingSample};
    use ndarray::Array2;

    fn generator(epoch_size: usize) -> SubframeGenerator {
        let sample = TrainingSample::new(
            "toy",
            vec![ImageMap::new("corr", Array2::from_shape_fn((24, 24), |(r, c)| ((r * c) % 7) as f32))],
            vec![ImageMap::new("somas", Array2::from_shape_fn((24, 24), |(r, _)| (r % 2) as f32))],
        )
        .unwrap();
        let cfg = GeneratorConfig { subframe_size: (8, 8), epoch_size, ..Default::default() };
        SubframeGenerator::new(vec![sample], cfg).unwrap()
    }

    fn config() -> TrainConfig {
        TrainConfig {
            architecture:   Architecture::Hourglass,
            filters:        2,
            depth:          2,
            batch_size:     2,
            epochs:         3,
            early_stopping: 5,
            use_cpu:        true,
            num_workers:    1,
            preview_height: 32,
            save_predictions_during_training: true,
            input_channels:  1,
            output_channels: 1,
            ..TrainConfig::default()
        }
    }

    #[test]
    fn test_training_keeps_single_best_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config();
        let run = TrainingRun {
            cfg:      &cfg,
            train:    generator(4),
            test:     generator(2),
            ckpt:     CheckpointManager::new(dir.path(), "hourglass").unwrap(),
            trackers: Vec::new(),
        };

        let device  = NdArrayDevice::default();
        let model   = cfg.model_spec().hourglass_config().init::<Autodiff<NdArray>>(&device);
        let outcome = train_loop(model, run, device).unwrap();

        assert!(outcome.history.epochs() >= 1 && outcome.history.epochs() <= 3);
        assert!(outcome.best_epoch.is_some());

        let ckpt = CheckpointManager::new(dir.path(), "hourglass").unwrap();
        assert_eq!(ckpt.list_checkpoints().unwrap().len(), 1);
        assert!(dir.path().join("training_history.json").exists());
        assert!(dir.path().join("prediction0.png").exists());
    }

    #[test]
    fn test_stops_after_patience_non_improving_epochs() {
        let dir = tempfile::tempdir().unwrap();
        // only the first epoch can beat infinity by this much
        let cfg = TrainConfig {
            early_stopping: 2,
            min_delta:      1e9,
            epochs:         10,
            save_predictions_during_training: false,
            ..config()
        };
        let run = TrainingRun {
            cfg:      &cfg,
            train:    generator(2),
            test:     generator(2),
            ckpt:     CheckpointManager::new(dir.path(), "hourglass").unwrap(),
            trackers: Vec::new(),
        };
        let device  = NdArrayDevice::default();
        let model   = cfg.model_spec().hourglass_config().init::<Autodiff<NdArray>>(&device);
        let outcome = train_loop(model, run, device).unwrap();

        assert!(outcome.stopped_early);
        assert_eq!(outcome.history.epochs(), cfg.early_stopping + 1);
        assert_eq!(outcome.best_epoch, Some(1));

        let ckpt = CheckpointManager::new(dir.path(), "hourglass").unwrap();
        assert_eq!(ckpt.best().unwrap().epoch, 1);
        assert_eq!(ckpt.list_checkpoints().unwrap().len(), 1);
    }

    #[test]
    fn test_run_folder_name_format() {
        let name = run_folder_name();
        assert_eq!(name.len(), "yymmdd_HH.MM.SS".len());
        assert_eq!(&name[6..7], "_");
    }
}
