// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// By programming against traits instead of concrete types,
// the application layer can swap where samples come from or
// where metrics go without changing the training workflow.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::domain::sample::TrainingSample;

// ─── SampleSource ─────────────────────────────────────────────────────────────
/// Any component that can provide prepared training samples.
///
/// Implementations:
///   - SampleStore → reads bincode sample files from a directory
pub trait SampleSource {
    fn load_all(&self) -> Result<Vec<TrainingSample>>;
}

// ─── EpochMetrics ─────────────────────────────────────────────────────────────
/// Losses recorded at the end of one training epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// Epoch number, starting at 1
    pub epoch:      usize,
    pub train_loss: f64,
    pub val_loss:   f64,
}

impl EpochMetrics {
    pub fn new(epoch: usize, train_loss: f64, val_loss: f64) -> Self {
        Self { epoch, train_loss, val_loss }
    }
}

// ─── ExperimentTracker ────────────────────────────────────────────────────────
/// Any sink for per-epoch training metrics.
///
/// Implementations:
///   - MetricsLogger → appends to a CSV file
///   - RemoteTracker → posts to an experiment-tracking service
pub trait ExperimentTracker {
    fn log_epoch(&mut self, metrics: &EpochMetrics) -> Result<()>;

    /// Called once after the last epoch.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}
