// ============================================================
// Layer 3 — Labelled Dataset Types
// ============================================================
// A raw region-proposal dataset folder looks like:
//
//   <dataset>/
//     images/image00000.tif ...        ← one TIFF per video frame
//     info.json                        ← {"dimensions": [frames, rows, cols], ...}
//     regions/consensus_regions.json   ← [{"coordinates": [[row, col], ...]}, ...]
//
// Coordinates are stored (row, col): the first value indexes
// image rows, the second image columns.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Parsed `info.json` of a raw dataset.
/// Only `dimensions` is required; other keys are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetInfo {
    /// `[frames, rows, cols]`
    pub dimensions: Vec<usize>,
}

impl DatasetInfo {
    /// The `(rows, cols)` size of every frame.
    pub fn image_shape(&self) -> Result<(usize, usize)> {
        match self.dimensions.as_slice() {
            [_, rows, cols, ..] => Ok((*rows, *cols)),
            other => bail!(
                "info.json dimensions must be [frames, rows, cols], got {:?}",
                other
            ),
        }
    }
}

/// One labelled cell: the set of pixels belonging to its soma.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellRegion {
    /// `(row, col)` pixel coordinates
    pub coordinates: Vec<[usize; 2]>,
}

impl CellRegion {
    pub fn new(coordinates: Vec<[usize; 2]>) -> Self {
        Self { coordinates }
    }

    /// Integer mean of the coordinates, truncated toward zero.
    /// Returns `None` for a region without pixels.
    pub fn centroid(&self) -> Option<(usize, usize)> {
        if self.coordinates.is_empty() {
            return None;
        }
        let n = self.coordinates.len() as f64;
        let (sum_r, sum_c) = self
            .coordinates
            .iter()
            .fold((0.0f64, 0.0f64), |(r, c), p| (r + p[0] as f64, c + p[1] as f64));
        Some(((sum_r / n) as usize, (sum_c / n) as usize))
    }

    /// True if every coordinate lies inside a `rows x cols` image.
    pub fn fits(&self, rows: usize, cols: usize) -> bool {
        self.coordinates.iter().all(|p| p[0] < rows && p[1] < cols)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_shape_skips_frame_count() {
        let info: DatasetInfo = serde_json::from_str(r#"{"dimensions": [3000, 512, 480], "id": "00.00"}"#).unwrap();
        assert_eq!(info.image_shape().unwrap(), (512, 480));
    }

    #[test]
    fn test_image_shape_rejects_short_dimensions() {
        let info = DatasetInfo { dimensions: vec![512] };
        assert!(info.image_shape().is_err());
    }

    #[test]
    fn test_centroid_is_truncated_mean() {
        let cell = CellRegion::new(vec![[10, 4], [11, 5], [11, 6]]);
        // rows: 32/3 = 10.67 → 10, cols: 15/3 = 5
        assert_eq!(cell.centroid(), Some((10, 5)));
    }

    #[test]
    fn test_empty_region_has_no_centroid() {
        assert_eq!(CellRegion::new(Vec::new()).centroid(), None);
    }

    #[test]
    fn test_regions_parse_from_json() {
        let json = r#"[{"id": 0, "coordinates": [[1, 2], [3, 4]]}]"#;
        let cells: Vec<CellRegion> = serde_json::from_str(json).unwrap();
        assert_eq!(cells[0].coordinates, vec![[1, 2], [3, 4]]);
        assert!(cells[0].fits(4, 5));
        assert!(!cells[0].fits(3, 5));
    }
}
