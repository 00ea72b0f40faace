// ============================================================
// Layer 2 — PredictUseCase
// ============================================================
// Loads the best model of a finished run and renders predictions
// for prepared samples:
//
//   Step 1: Resolve samples (named, or the run's test set)
//   Step 2: Rebuild + load the model   (Layer 5 - ml)
//   Step 3: Write <out_dir>/<name>.png  (Layer 6 - infra)

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};

use crate::data::loader::{load_sample, SampleStore};
use crate::domain::{sample::TrainingSample, traits::SampleSource};
use crate::infra::{checkpoint::load_config, visualize::RenderOptions};
use crate::ml::inferencer::predict_run;

#[derive(Debug, Clone)]
pub struct PredictConfig {
    /// `<data_dir>/models/<timestamp>` of the run to use
    pub run_dir:    String,
    /// Sample names; empty means the run's test datasets, or every sample
    pub datasets:   Vec<String>,
    /// Defaults to `<run_dir>/predictions`
    pub out_dir:    Option<String>,
    pub height:     u32,
    pub x_contrast: (f64, f64),
    pub use_cpu:    bool,
}

pub struct PredictUseCase {
    config: PredictConfig,
}

impl PredictUseCase {
    pub fn new(config: PredictConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<Vec<PathBuf>> {
        let cfg     = &self.config;
        let run_dir = Path::new(&cfg.run_dir);
        let train   = load_config(run_dir)?;
        let store   = SampleStore::new(train.samples_dir());

        let names = if !cfg.datasets.is_empty() { cfg.datasets.clone() } else { train.test_datasets.clone() };
        let samples: Vec<TrainingSample> = if names.is_empty() {
            store.load_all()?
        } else {
            names.iter().map(|n| load_sample(&store.path_for(n))).collect::<Result<_>>()?
        };
        if samples.is_empty() {
            bail!("no prepared samples found in '{}'", store.dir().display());
        }

        let out_dir = cfg
            .out_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| run_dir.join("predictions"));
        let opts = RenderOptions { height: cfg.height, x_contrast: cfg.x_contrast };

        tracing::info!("Predicting {} samples into '{}'", samples.len(), out_dir.display());
        predict_run(run_dir, &samples, &out_dir, &opts, cfg.use_cpu)
    }
}
