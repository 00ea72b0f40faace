// ============================================================
// Layer 3 — TrainingSample Domain Type
// ============================================================
// A prepared dataset ready for training: a handful of named
// input images (summary projections of a video, or a frame)
// and named target maps (masks or keypoint confidence maps).
//
// Example (region proposal):
//   inputs:  corr, mean, median, max
//   targets: somas, borders, centroids
//
// Every channel of a sample has the same (rows, cols) shape.

use anyhow::{bail, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// A single named 2-D image channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageMap {
    pub name: String,
    pub data: Array2<f32>,
}

impl ImageMap {
    pub fn new(name: impl Into<String>, data: Array2<f32>) -> Self {
        Self { name: name.into(), data }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSample {
    /// Dataset identifier, usually the raw folder name
    pub name:    String,
    pub inputs:  Vec<ImageMap>,
    pub targets: Vec<ImageMap>,
}

impl TrainingSample {
    /// Build a sample, rejecting empty channel lists and mismatched shapes.
    pub fn new(
        name:    impl Into<String>,
        inputs:  Vec<ImageMap>,
        targets: Vec<ImageMap>,
    ) -> Result<Self> {
        let sample = Self { name: name.into(), inputs, targets };
        sample.validate()?;
        Ok(sample)
    }

    pub fn validate(&self) -> Result<()> {
        if self.inputs.is_empty() || self.targets.is_empty() {
            bail!("sample '{}' needs at least one input and one target channel", self.name);
        }
        let shape = self.inputs[0].data.dim();
        for map in self.inputs.iter().chain(self.targets.iter()) {
            if map.data.dim() != shape {
                bail!(
                    "sample '{}': channel '{}' has shape {:?}, expected {:?}",
                    self.name, map.name, map.data.dim(), shape
                );
            }
        }
        Ok(())
    }

    /// `(rows, cols)` shared by all channels
    pub fn shape(&self) -> (usize, usize) {
        self.inputs[0].data.dim()
    }

    pub fn input_channels(&self) -> usize {
        self.inputs.len()
    }

    pub fn target_channels(&self) -> usize {
        self.targets.len()
    }

    pub fn input_names(&self) -> Vec<&str> {
        self.inputs.iter().map(|m| m.name.as_str()).collect()
    }

    pub fn target_names(&self) -> Vec<&str> {
        self.targets.iter().map(|m| m.name.as_str()).collect()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_sample() {
        let s = TrainingSample::new(
            "00.00",
            vec![ImageMap::new("corr", Array2::zeros((4, 5))), ImageMap::new("mean", Array2::zeros((4, 5)))],
            vec![ImageMap::new("somas", Array2::zeros((4, 5)))],
        )
        .unwrap();
        assert_eq!(s.shape(), (4, 5));
        assert_eq!(s.input_channels(), 2);
        assert_eq!(s.target_names(), vec!["somas"]);
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let res = TrainingSample::new(
            "bad",
            vec![ImageMap::new("corr", Array2::zeros((4, 5)))],
            vec![ImageMap::new("somas", Array2::zeros((5, 4)))],
        );
        assert!(res.is_err());
    }

    #[test]
    fn test_missing_targets_rejected() {
        let res = TrainingSample::new("bad", vec![ImageMap::new("corr", Array2::zeros((2, 2)))], Vec::new());
        assert!(res.is_err());
    }
}
