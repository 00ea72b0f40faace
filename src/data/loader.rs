// ============================================================
// Layer 4 — Prepared Sample Store
// ============================================================
// Reads and writes prepared TrainingSamples, one bincode file
// per dataset:
//
//   training_data/
//     00.00.bin
//     00.01.bin
//     ...
//
// bincode keeps the f32 channel data compact and fast to load;
// samples are loaded once and held in memory for the whole run.

use anyhow::{Context, Result};
use std::{
    fs,
    io::{BufReader, BufWriter},
    path::{Path, PathBuf},
};

use crate::domain::{sample::TrainingSample, traits::SampleSource};

pub const SAMPLE_EXTENSION: &str = "bin";

/// A directory of prepared sample files.
pub struct SampleStore {
    dir: PathBuf,
}

impl SampleStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path the sample called `name` is stored under.
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.{SAMPLE_EXTENSION}"))
    }

    /// Write a sample, creating the directory if needed.
    pub fn save(&self, sample: &TrainingSample) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;
        let path = self.path_for(&sample.name);
        let file = fs::File::create(&path)
            .with_context(|| format!("Cannot create '{}'", path.display()))?;
        bincode::serialize_into(BufWriter::new(file), sample)
            .with_context(|| format!("Cannot write sample '{}'", path.display()))?;
        tracing::debug!("Saved sample '{}' to '{}'", sample.name, path.display());
        Ok(path)
    }

    /// Sorted list of sample files in the directory.
    pub fn list(&self) -> Result<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = fs::read_dir(&self.dir)
            .with_context(|| format!("Cannot read directory '{}'", self.dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some(SAMPLE_EXTENSION))
            .collect();
        files.sort();
        Ok(files)
    }
}

impl SampleSource for SampleStore {
    fn load_all(&self) -> Result<Vec<TrainingSample>> {
        if !self.dir.exists() {
            tracing::warn!("Sample directory '{}' does not exist — returning no samples", self.dir.display());
            return Ok(Vec::new());
        }
        let samples = load_samples(&self.list()?)?;
        tracing::info!("Loaded {} samples from '{}'", samples.len(), self.dir.display());
        Ok(samples)
    }
}

/// Load one prepared sample file.
pub fn load_sample(path: &Path) -> Result<TrainingSample> {
    let file = fs::File::open(path)
        .with_context(|| format!("Cannot open sample '{}'", path.display()))?;
    let sample: TrainingSample = bincode::deserialize_from(BufReader::new(file))
        .with_context(|| format!("Cannot decode sample '{}'", path.display()))?;
    sample
        .validate()
        .with_context(|| format!("Invalid sample '{}'", path.display()))?;
    Ok(sample)
}

/// Load an explicit list of sample files; any failure aborts.
pub fn load_samples(paths: &[PathBuf]) -> Result<Vec<TrainingSample>> {
    paths.iter().map(|p| load_sample(p)).collect()
}
