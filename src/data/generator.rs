// ============================================================
// Layer 4 — Subframe Generator
// ============================================================
// Implements Burn's Dataset trait over a set of prepared
// TrainingSamples. Every index yields a fresh augmented
// training pair:
//
//   1. pick a random sample
//   2. pick a random window centre inside it
//   3. draw a random rotation (0-360°) and scale
//   4. resample inputs (bilinear) and targets (nearest)
//   5. optionally z-score every input channel
//
// The generator is finite per epoch (`epoch_size` items) and
// restartable: the DataLoader simply iterates it again next
// epoch and gets new random windows.

use anyhow::{bail, Result};
use burn::data::dataset::Dataset;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::data::augment::{normalize, warp_window, Interpolation, Transform};
use crate::domain::sample::TrainingSample;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Window (rows, cols) cut out of each sample
    pub subframe_size:       (usize, usize),
    /// Number of items per epoch
    pub epoch_size:          usize,
    pub normalize_subframes: bool,
    /// Random rotation in [0, 360)
    pub rotation:            bool,
    /// Scale drawn uniformly from (min, max); (1, 1) disables scaling
    pub scaling:             (f32, f32),
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            subframe_size:       (160, 160),
            epoch_size:          1024,
            normalize_subframes: true,
            rotation:            true,
            scaling:             (0.75, 1.25),
        }
    }
}

/// One augmented training pair, channel-major (c, rows, cols) flattened.
#[derive(Debug, Clone)]
pub struct SubframeItem {
    pub inputs:          Vec<f32>,
    pub targets:         Vec<f32>,
    pub input_channels:  usize,
    pub target_channels: usize,
    pub rows:            usize,
    pub cols:            usize,
}

#[derive(Clone)]
pub struct SubframeGenerator {
    samples: Arc<Vec<TrainingSample>>,
    cfg:     GeneratorConfig,
}

impl SubframeGenerator {
    /// All samples must share input and target channel counts.
    pub fn new(samples: Vec<TrainingSample>, cfg: GeneratorConfig) -> Result<Self> {
        let Some(first) = samples.first() else {
            bail!("generator needs at least one sample");
        };
        let (n_in, n_out) = (first.input_channels(), first.target_channels());
        if let Some(bad) = samples
            .iter()
            .find(|s| s.input_channels() != n_in || s.target_channels() != n_out)
        {
            bail!(
                "sample '{}' has {}/{} channels, expected {}/{}",
                bad.name, bad.input_channels(), bad.target_channels(), n_in, n_out
            );
        }
        if cfg.subframe_size.0 == 0 || cfg.subframe_size.1 == 0 {
            bail!("subframe size must be positive, got {:?}", cfg.subframe_size);
        }
        if cfg.scaling.0 <= 0.0 || cfg.scaling.1 < cfg.scaling.0 {
            bail!("invalid scaling range {:?}", cfg.scaling);
        }
        Ok(Self { samples: Arc::new(samples), cfg })
    }

    pub fn input_channels(&self) -> usize {
        self.samples[0].input_channels()
    }

    pub fn target_channels(&self) -> usize {
        self.samples[0].target_channels()
    }

    pub fn input_names(&self) -> Vec<String> {
        self.samples[0].input_names().into_iter().map(String::from).collect()
    }

    pub fn target_names(&self) -> Vec<String> {
        self.samples[0].target_names().into_iter().map(String::from).collect()
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.cfg
    }

    /// A reproducible batch, used for prediction images.
    pub fn fixed_batch(&self, size: usize, seed: u64) -> Vec<SubframeItem> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..size).map(|_| self.generate(&mut rng)).collect()
    }

    /// Draw one augmented window.
    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> SubframeItem {
        let sample = &self.samples[rng.gen_range(0..self.samples.len())];
        let (rows, cols) = sample.shape();
        let shape = self.cfg.subframe_size;

        let center = (
            random_center(rng, rows, shape.0),
            random_center(rng, cols, shape.1),
        );
        let angle_deg = if self.cfg.rotation { rng.gen_range(0.0..360.0) } else { 0.0 };
        let (lo, hi)  = self.cfg.scaling;
        let scale     = if hi > lo { rng.gen_range(lo..hi) } else { lo };
        let transform = Transform { center, angle_deg, scale };

        let mut inputs = Vec::with_capacity(sample.input_channels() * shape.0 * shape.1);
        for map in &sample.inputs {
            let mut window = warp_window(&map.data, shape, &transform, Interpolation::Bilinear);
            if self.cfg.normalize_subframes {
                normalize(&mut window);
            }
            inputs.extend(window.iter().copied());
        }

        let mut targets = Vec::with_capacity(sample.target_channels() * shape.0 * shape.1);
        for map in &sample.targets {
            let window = warp_window(&map.data, shape, &transform, Interpolation::Nearest);
            targets.extend(window.iter().copied());
        }

        SubframeItem {
            inputs,
            targets,
            input_channels:  sample.input_channels(),
            target_channels: sample.target_channels(),
            rows:            shape.0,
            cols:            shape.1,
        }
    }
}

/// Centre coordinate so an unrotated window stays inside the image when it fits.
fn random_center<R: Rng + ?Sized>(rng: &mut R, extent: usize, window: usize) -> f32 {
    let half = (window as f32 - 1.0) / 2.0;
    let lo   = half;
    let hi   = extent as f32 - 1.0 - half;
    if hi > lo {
        rng.gen_range(lo..=hi)
    } else {
        (extent as f32 - 1.0) / 2.0
    }
}

impl Dataset<SubframeItem> for SubframeGenerator {
    fn get(&self, index: usize) -> Option<SubframeItem> {
        if index >= self.cfg.epoch_size {
            return None;
        }
        Some(self.generate(&mut rand::thread_rng()))
    }

    fn len(&self) -> usize {
        self.cfg.epoch_size
    }
}
