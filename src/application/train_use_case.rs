// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates a full training run in order:
//
//   Step 1: Load prepared samples          (Layer 4 - data)
//   Step 2: Split train / test             (Layer 4 - data)
//   Step 3: Build subframe generators      (Layer 4 - data)
//   Step 4: Create the run directory       (Layer 6 - infra)
//   Step 5: Save config                    (Layer 6 - infra)
//   Step 6: Set up experiment trackers     (Layer 6 - infra)
//   Step 7: Run training loop              (Layer 5 - ml)
//
// Reference: Burn Book §5 (Training)

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::data::{
    generator::{GeneratorConfig, SubframeGenerator},
    loader::SampleStore,
    splitter::split_train_test,
};
use crate::domain::{sample::TrainingSample, traits::{ExperimentTracker, SampleSource}};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::MetricsLogger,
    tracker::RemoteTracker,
};
use crate::ml::{
    model::{Architecture, ModelSpec},
    trainer::{new_run_dir, run_training, TrainingOutcome, TrainingRun},
};

/// Folder under `data_dir` holding prepared `<name>.bin` samples.
pub const TRAINING_DATA_DIR: &str = "training_data";

/// Deepest pooling stack accepted; 2^8 = 256 pixel windows.
pub const MAX_DEPTH: usize = 8;

// ─── Training Configuration ──────────────────────────────────────────────────
// Every hyper-parameter of a run. Written to train_config.json in the
// run directory so `predict` can rebuild the exact architecture.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub data_dir:          String,
    /// Sample names to train on; empty means "split automatically"
    pub train_datasets:    Vec<String>,
    pub test_datasets:     Vec<String>,
    pub train_fraction:    f64,
    pub split_seed:        u64,

    pub architecture:      Architecture,
    pub filters:           usize,
    pub depth:             usize,
    pub batch_norm:        bool,
    pub high_pass_sigma:   f64,
    pub upsampling_layers: bool,
    /// 0 = take from the training data
    pub input_channels:    usize,
    pub output_channels:   usize,

    pub batch_size:        usize,
    pub epochs:            usize,
    pub lr:                f64,
    /// Patience in epochs
    pub early_stopping:    usize,
    /// Smallest val_loss decrease counted as an improvement
    pub min_delta:         f64,
    pub num_workers:       usize,

    pub subframe_size:       (usize, usize),
    pub epoch_size:          usize,
    pub normalize_subframes: bool,
    pub aug_rotation:        bool,
    pub aug_scaling:         (f32, f32),

    pub save_predictions_during_training: bool,
    pub preview_height:    u32,

    pub tracker_endpoint:  Option<String>,
    pub tracker_api_key:   Option<String>,
    pub tracker_tag:       String,

    pub use_cpu:           bool,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_dir:          "data".to_string(),
            train_datasets:    Vec::new(),
            test_datasets:     Vec::new(),
            train_fraction:    0.8,
            split_seed:        42,

            architecture:      Architecture::Unet,
            filters:           16,
            depth:             4,
            batch_norm:        false,
            high_pass_sigma:   0.0,
            upsampling_layers: false,
            input_channels:    0,
            output_channels:   0,

            batch_size:        8,
            epochs:            1000,
            lr:                1e-3,
            early_stopping:    3,
            min_delta:         0.0,
            num_workers:       2,

            subframe_size:       (160, 160),
            epoch_size:          1024,
            normalize_subframes: true,
            aug_rotation:        true,
            aug_scaling:         (0.75, 1.25),

            save_predictions_during_training: true,
            preview_height:    800,

            tracker_endpoint:  None,
            tracker_api_key:   None,
            tracker_tag:       "giterdone".to_string(),

            use_cpu:           false,
        }
    }
}

impl TrainConfig {
    pub fn model_spec(&self) -> ModelSpec {
        ModelSpec {
            architecture:      self.architecture,
            input_channels:    self.input_channels,
            output_channels:   self.output_channels,
            filters:           self.filters,
            depth:             self.depth,
            batch_norm:        self.batch_norm,
            high_pass_sigma:   self.high_pass_sigma,
            upsampling_layers: self.upsampling_layers,
        }
    }

    pub fn generator_config(&self) -> GeneratorConfig {
        GeneratorConfig {
            subframe_size:       self.subframe_size,
            epoch_size:          self.epoch_size,
            normalize_subframes: self.normalize_subframes,
            rotation:            self.aug_rotation,
            scaling:             self.aug_scaling,
        }
    }

    pub fn samples_dir(&self) -> PathBuf {
        Path::new(&self.data_dir).join(TRAINING_DATA_DIR)
    }

    /// Reject settings the network or the loaders cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 || self.epochs == 0 || self.epoch_size == 0 {
            bail!("batch_size, epochs and epoch_size must all be positive");
        }
        if self.lr.is_nan() || self.lr <= 0.0 {
            bail!("learning rate must be positive, got {}", self.lr);
        }
        if self.filters == 0 {
            bail!("filters must be positive");
        }
        if self.depth > MAX_DEPTH {
            bail!("depth {} exceeds the maximum of {}", self.depth, MAX_DEPTH);
        }
        if self.min_delta.is_nan() || self.min_delta < 0.0 {
            bail!("min_delta must be non-negative, got {}", self.min_delta);
        }
        let m = self.architecture.size_multiple(self.depth);
        if self.filters.checked_mul(m).is_none() {
            bail!("{} filters at depth {} overflow the channel count", self.filters, self.depth);
        }
        let (rows, cols) = self.subframe_size;
        if rows % m != 0 || cols % m != 0 {
            bail!(
                "subframe size {:?} must be divisible by {} for a {} of depth {}",
                self.subframe_size, m, self.architecture, self.depth
            );
        }
        if !(self.train_fraction > 0.0 && self.train_fraction < 1.0) {
            bail!("train_fraction must lie in (0, 1), got {}", self.train_fraction);
        }
        Ok(())
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Run the full pipeline; returns the run directory and outcome.
    pub fn execute(&self) -> Result<(PathBuf, TrainingOutcome)> {
        let mut cfg = self.config.clone();
        cfg.validate()?;

        // ── Step 1 + 2: Load prepared samples and split ───────────────────────
        let store = SampleStore::new(cfg.samples_dir());
        let (train, test) = select_datasets(&store, &cfg)?;
        // recorded so `predict` defaults to the held-out samples
        cfg.train_datasets = train.iter().map(|s| s.name.clone()).collect();
        cfg.test_datasets  = test.iter().map(|s| s.name.clone()).collect();
        tracing::info!("Training on {:?}, testing on {:?}", cfg.train_datasets, cfg.test_datasets);

        // ── Step 3: Generators ────────────────────────────────────────────────
        let train_gen = SubframeGenerator::new(train, cfg.generator_config())?;
        let test_gen  = SubframeGenerator::new(test, cfg.generator_config())?;
        if (train_gen.input_channels(), train_gen.target_channels())
            != (test_gen.input_channels(), test_gen.target_channels())
        {
            bail!("training and test samples have different channel counts");
        }
        cfg.input_channels  = train_gen.input_channels();
        cfg.output_channels = train_gen.target_channels();
        tracing::info!(
            "Inputs {:?} → targets {:?}",
            train_gen.input_names(), train_gen.target_names()
        );

        // ── Step 4 + 5: Run directory and config ──────────────────────────────
        let run_dir = new_run_dir(Path::new(&cfg.data_dir));
        let ckpt    = CheckpointManager::new(&run_dir, cfg.architecture.name())?;
        ckpt.save_config(&cfg)?;
        tracing::info!("Run directory: '{}'", run_dir.display());

        // ── Step 6: Trackers ──────────────────────────────────────────────────
        let trackers = build_trackers(&cfg, &run_dir)?;

        // ── Step 7: Training loop ─────────────────────────────────────────────
        let outcome = run_training(TrainingRun {
            cfg:   &cfg,
            train: train_gen,
            test:  test_gen,
            ckpt,
            trackers,
        })?;

        Ok((run_dir, outcome))
    }
}

/// Named lists when given, otherwise a seeded split of everything in `store`.
fn select_datasets(store: &SampleStore, cfg: &TrainConfig) -> Result<(Vec<TrainingSample>, Vec<TrainingSample>)> {
    let load_named = |names: &[String]| -> Result<Vec<TrainingSample>> {
        names
            .iter()
            .map(|n| crate::data::loader::load_sample(&store.path_for(n)))
            .collect()
    };

    match (cfg.train_datasets.is_empty(), cfg.test_datasets.is_empty()) {
        (false, false) => Ok((load_named(&cfg.train_datasets)?, load_named(&cfg.test_datasets)?)),
        (true, true) => {
            let all = store.load_all()?;
            if all.len() < 2 {
                bail!(
                    "need at least two prepared samples in '{}' to split, found {}",
                    store.dir().display(), all.len()
                );
            }
            Ok(split_train_test(all, cfg.train_fraction, cfg.split_seed))
        }
        _ => bail!("give both train and test dataset lists, or neither"),
    }
}

fn build_trackers(cfg: &TrainConfig, run_dir: &Path) -> Result<Vec<Box<dyn ExperimentTracker>>> {
    let mut trackers: Vec<Box<dyn ExperimentTracker>> = vec![Box::new(MetricsLogger::new(run_dir)?)];

    match (&cfg.tracker_endpoint, &cfg.tracker_api_key) {
        (Some(endpoint), Some(key)) if !key.is_empty() => {
            let session = run_dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            trackers.push(Box::new(RemoteTracker::new(endpoint, key, &cfg.tracker_tag, session)?));
            tracing::info!("Reporting metrics to {}", endpoint);
        }
        (None, Some(_)) => tracing::warn!("Tracker API key given without an endpoint; remote tracking disabled"),
        _ => {}
    }
    Ok(trackers)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sample::ImageMap;
    use ndarray::Array2;

    fn store_with(dir: &Path, names: &[&str]) -> SampleStore {
        let store = SampleStore::new(dir.join(TRAINING_DATA_DIR));
        for name in names {
            let s = TrainingSample::new(
                *name,
                vec![ImageMap::new("corr", Array2::from_elem((16, 16), 0.5))],
                vec![ImageMap::new("somas", Array2::zeros((16, 16)))],
            )
            .unwrap();
            store.save(&s).unwrap();
        }
        store
    }

    #[test]
    fn test_default_config_is_valid() {
        TrainConfig::default().validate().unwrap();
    }

    #[test]
    fn test_subframe_must_match_size_multiple() {
        let cfg = TrainConfig { subframe_size: (100, 160), ..TrainConfig::default() };
        assert!(cfg.validate().is_err());

        let leap = TrainConfig { architecture: Architecture::Leap, subframe_size: (100, 160), ..TrainConfig::default() };
        leap.validate().unwrap();
    }

    #[test]
    fn test_excessive_depth_is_an_error() {
        let cfg = TrainConfig { depth: 64, ..TrainConfig::default() };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("depth"));

        let deepest = TrainConfig { depth: MAX_DEPTH, subframe_size: (256, 256), ..TrainConfig::default() };
        deepest.validate().unwrap();
    }

    #[test]
    fn test_negative_min_delta_is_an_error() {
        let cfg = TrainConfig { min_delta: -1.0, ..TrainConfig::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_config_json_round_trip_keeps_architecture() {
        let cfg  = TrainConfig { architecture: Architecture::StackedHourglass, input_channels: 4, ..TrainConfig::default() };
        let json = serde_json::to_string(&cfg).unwrap();
        let back: TrainConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.architecture, Architecture::StackedHourglass);
        assert_eq!(back.input_channels, 4);
    }

    #[test]
    fn test_missing_fields_fall_back_to_defaults() {
        let cfg: TrainConfig = serde_json::from_str(r#"{"filters": 8}"#).unwrap();
        assert_eq!(cfg.filters, 8);
        assert_eq!(cfg.depth, TrainConfig::default().depth);
    }

    #[test]
    fn test_select_datasets_by_name() {
        let dir   = tempfile::tempdir().unwrap();
        let store = store_with(dir.path(), &["a", "b", "c"]);
        let cfg   = TrainConfig {
            train_datasets: vec!["a".into(), "b".into()],
            test_datasets:  vec!["c".into()],
            ..TrainConfig::default()
        };
        let (train, test) = select_datasets(&store, &cfg).unwrap();
        assert_eq!(train.len(), 2);
        assert_eq!(test[0].name, "c");
    }

    #[test]
    fn test_select_datasets_split_and_errors() {
        let dir   = tempfile::tempdir().unwrap();
        let store = store_with(dir.path(), &["a", "b", "c", "d"]);
        let (train, test) = select_datasets(&store, &TrainConfig::default()).unwrap();
        assert_eq!(train.len() + test.len(), 4);
        assert!(!test.is_empty());

        let half = TrainConfig { train_datasets: vec!["a".into()], ..TrainConfig::default() };
        assert!(select_datasets(&store, &half).is_err());

        let missing = TrainConfig {
            train_datasets: vec!["zzz".into()],
            test_datasets:  vec!["a".into()],
            ..TrainConfig::default()
        };
        assert!(select_datasets(&store, &missing).is_err());
    }

    #[test]
    fn test_automatic_split_is_saved_with_the_run() {
        let dir = tempfile::tempdir().unwrap();
        store_with(dir.path(), &["a", "b", "c", "d", "e"]);
        let cfg = TrainConfig {
            data_dir:       dir.path().to_string_lossy().into_owned(),
            architecture:   Architecture::Leap,
            filters:        2,
            batch_size:     2,
            epochs:         1,
            epoch_size:     2,
            num_workers:    1,
            subframe_size:  (8, 8),
            preview_height: 32,
            save_predictions_during_training: false,
            use_cpu:        true,
            ..TrainConfig::default()
        };
        let (run_dir, _) = TrainUseCase::new(cfg).execute().unwrap();

        let saved = crate::infra::checkpoint::load_config(&run_dir).unwrap();
        assert!(!saved.train_datasets.is_empty());
        assert!(!saved.test_datasets.is_empty());
        assert_eq!(saved.train_datasets.len() + saved.test_datasets.len(), 5);
        assert!(saved.test_datasets.iter().all(|t| !saved.train_datasets.contains(t)));
        assert_eq!((saved.input_channels, saved.output_channels), (1, 1));
    }

    #[test]
    fn test_trackers_local_only_without_key() {
        let dir = tempfile::tempdir().unwrap();
        let trackers = build_trackers(&TrainConfig::default(), dir.path()).unwrap();
        assert_eq!(trackers.len(), 1);

        let cfg = TrainConfig {
            tracker_endpoint: Some("http://127.0.0.1:9/track".into()),
            tracker_api_key:  Some("key".into()),
            ..TrainConfig::default()
        };
        assert_eq!(build_trackers(&cfg, dir.path()).unwrap().len(), 2);
    }
}
