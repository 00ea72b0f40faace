// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores model weights using Burn's CompactRecorder.
//
// Only improving epochs are saved (best-only). After training
// every checkpoint except the best one is deleted.
//
// File layout of one training run:
//
//   models/<yymmdd_HH.MM.SS>/
//     unet-epoch003.mpk   ← weights, one per improving epoch
//     unet-epoch007.mpk
//     best.json              ← {"epoch": 7, "val_loss": ..., "stem": "unet-epoch007"}
//     train_config.json      ← everything needed to rebuild the model
//
// Stems carry no dots: the recorder replaces the extension.

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::CompactRecorder,
};
use serde::{Deserialize, Serialize};
use std::{fs, path::{Path, PathBuf}};

use crate::application::train_use_case::TrainConfig;

const BEST_FILE:   &str = "best.json";
const CONFIG_FILE: &str = "train_config.json";

/// Pointer to the best checkpoint of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestCheckpoint {
    pub epoch:    usize,
    pub val_loss: f64,
    /// File name without extension
    pub stem:     String,
}

pub struct CheckpointManager {
    dir:        PathBuf,
    model_name: String,
}

impl CheckpointManager {
    /// Use (and create) `dir` for checkpoints of a model called `model_name`.
    pub fn new(dir: impl Into<PathBuf>, model_name: impl Into<String>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { dir, model_name: model_name.into() })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn prefix(&self) -> String {
        format!("{}-epoch", self.model_name)
    }

    pub fn stem_for(&self, epoch: usize) -> String {
        format!("{}{:03}", self.prefix(), epoch)
    }

    /// Save `model` as the new best checkpoint.
    pub fn save_best<B: Backend, M: Module<B>>(
        &self,
        model:    &M,
        epoch:    usize,
        val_loss: f64,
    ) -> Result<BestCheckpoint> {
        let stem = self.stem_for(epoch);
        let path = self.dir.join(&stem);

        model
            .clone()
            .save_file(path.clone(), &CompactRecorder::new())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        let best = BestCheckpoint { epoch, val_loss, stem };
        let best_path = self.dir.join(BEST_FILE);
        fs::write(&best_path, serde_json::to_string_pretty(&best)?)
            .with_context(|| format!("Failed to write '{}'", best_path.display()))?;

        tracing::debug!("Saved checkpoint '{}' (val_loss={:.6})", best.stem, val_loss);
        Ok(best)
    }

    /// Read the best-checkpoint pointer.
    pub fn best(&self) -> Result<BestCheckpoint> {
        let path = self.dir.join(BEST_FILE);
        let json = fs::read_to_string(&path).with_context(|| {
            format!("Cannot find '{}'. Has this run saved a checkpoint?", path.display())
        })?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Load the best weights into `model`, which must have the same architecture.
    pub fn load_best<B: Backend, M: Module<B>>(&self, model: M, device: &B::Device) -> Result<M> {
        let best = self.best()?;
        let path = self.dir.join(&best.stem);
        tracing::info!("Loading checkpoint from epoch {} (val_loss={:.6})", best.epoch, best.val_loss);
        model
            .load_file(path.clone(), &CompactRecorder::new(), device)
            .with_context(|| format!("Cannot load checkpoint '{}'", path.display()))
    }

    /// Checkpoint files of this model, sorted by name.
    pub fn list_checkpoints(&self) -> Result<Vec<PathBuf>> {
        let prefix = self.prefix();
        let mut files: Vec<PathBuf> = fs::read_dir(&self.dir)
            .with_context(|| format!("Cannot read '{}'", self.dir.display()))?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| {
                p.is_file()
                    && p.file_name()
                        .and_then(|n| n.to_str())
                        .map(|n| n.starts_with(&prefix))
                        .unwrap_or(false)
            })
            .collect();
        files.sort();
        Ok(files)
    }

    /// Delete every checkpoint except the best one. Returns how many were removed.
    pub fn retain_best(&self) -> Result<usize> {
        let keep = format!("{}.", self.best()?.stem);
        let mut removed = 0;
        for path in self.list_checkpoints()? {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            if !name.starts_with(&keep) {
                fs::remove_file(&path)
                    .with_context(|| format!("Cannot delete '{}'", path.display()))?;
                removed += 1;
            }
        }
        tracing::info!("Removed {} superseded checkpoints", removed);
        Ok(removed)
    }

    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join(CONFIG_FILE);
        fs::write(&path, serde_json::to_string_pretty(cfg)?)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<TrainConfig> {
        load_config(&self.dir)
    }
}

/// Read `train_config.json` from a run directory.
pub fn load_config(dir: &Path) -> Result<TrainConfig> {
    let path = dir.join(CONFIG_FILE);
    let json = fs::read_to_string(&path).with_context(|| {
        format!("Cannot read config from '{}'. Is this a training run directory?", path.display())
    })?;
    Ok(serde_json::from_str(&json)?)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::leap::{Leap, LeapConfig};
    use burn::backend::NdArray;

    type TB = NdArray;

    #[test]
    fn test_retain_best_keeps_only_best_file() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = CheckpointManager::new(dir.path(), "unet").unwrap();
        for stem in ["unet-epoch001", "unet-epoch002", "unet-epoch005"] {
            fs::write(dir.path().join(format!("{stem}.mpk")), b"weights").unwrap();
        }
        fs::write(dir.path().join("metrics.csv"), "epoch").unwrap();
        let best = BestCheckpoint { epoch: 2, val_loss: 0.1, stem: "unet-epoch002".into() };
        fs::write(dir.path().join(BEST_FILE), serde_json::to_string(&best).unwrap()).unwrap();

        assert_eq!(mgr.retain_best().unwrap(), 2);
        let left = mgr.list_checkpoints().unwrap();
        assert_eq!(left.len(), 1);
        assert!(left[0].ends_with("unet-epoch002.mpk"));
        assert!(dir.path().join("metrics.csv").exists());
    }

    #[test]
    fn test_missing_best_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = CheckpointManager::new(dir.path(), "leap").unwrap();
        assert!(mgr.best().is_err());
        assert!(mgr.retain_best().is_err());
    }

    #[test]
    fn test_save_and_load_best_weights() {
        let dir    = tempfile::tempdir().unwrap();
        let device = Default::default();
        let mgr    = CheckpointManager::new(dir.path(), "leap").unwrap();
        let cfg    = LeapConfig::new(1, 1).with_filters(1);

        let trained: Leap<TB> = cfg.init(&device);
        mgr.save_best(&trained, 1, 0.5).unwrap();
        mgr.save_best(&trained, 4, 0.25).unwrap();

        let best = mgr.best().unwrap();
        assert_eq!(best.epoch, 4);
        assert_eq!(best.stem, "leap-epoch004");

        let fresh: Leap<TB> = cfg.init(&device);
        let loaded = mgr.load_best(fresh, &device).unwrap();
        let x = Tensor::<TB, 4>::ones([1, 1, 4, 4], &device);
        let a: Vec<f32> = trained.forward(x.clone()).into_data().to_vec().unwrap();
        let b: Vec<f32> = loaded.forward(x).into_data().to_vec().unwrap();
        for (u, v) in a.iter().zip(&b) {
            // CompactRecorder stores half precision
            assert!((u - v).abs() < 1e-2);
        }

        assert_eq!(mgr.retain_best().unwrap(), 1);
        assert!(dir.path().join("leap-epoch004.mpk").exists());
        assert!(!dir.path().join("leap-epoch001.mpk").exists());
    }
}
