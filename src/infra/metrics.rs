// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Records training losses after each epoch:
//
//   metrics.csv             — one row per epoch, appended live
//   training_history.json   — {"loss": [...], "val_loss": [...]}
//                             written once training ends
//
// Example CSV output:
//   epoch,train_loss,val_loss
//   1,0.081200,0.079900
//   2,0.052300,0.055100
//
// If val_loss rises while train_loss keeps falling the model
// is overfitting; early stopping will end the run.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::domain::traits::{EpochMetrics, ExperimentTracker};

/// Appends epoch metrics to a CSV file.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the CSV header if the file doesn't exist yet.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "epoch,train_loss,val_loss")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

impl ExperimentTracker for MetricsLogger {
    fn log_epoch(&mut self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        writeln!(f, "{},{:.6},{:.6}", m.epoch, m.train_loss, m.val_loss)?;
        Ok(())
    }
}

/// Loss curves of a whole run, keyed like the usual fit history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub loss:     Vec<f64>,
    pub val_loss: Vec<f64>,
}

impl TrainingHistory {
    pub fn push(&mut self, m: &EpochMetrics) {
        self.loss.push(m.train_loss);
        self.val_loss.push(m.val_loss);
    }

    pub fn epochs(&self) -> usize {
        self.loss.len()
    }

    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join("training_history.json");
        fs::write(&path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("Cannot write '{}'", path.display()))?;
        Ok(path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Cannot read '{}'", path.display()))?;
        Ok(serde_json::from_str(&json)?)
    }
}
