// ============================================================
// Layer 4 — TIFF Frame Loader
// ============================================================
// Loads a stack of video frames from a folder holding one
// `.tif` file per frame.
//
// Files are sorted by name so frame order is deterministic.
// Every frame is converted to single-channel f32; integer
// TIFFs are scaled by the `image` crate into [0, 1].
//
// Result shape: (frames, rows, cols)

use anyhow::{bail, Context, Result};
use ndarray::{Array2, Array3, Axis};
use std::{fs, path::{Path, PathBuf}};

/// Which frames of a folder to load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameSelection {
    /// Every frame in the folder
    All,
    /// Exactly these frame indices, in this order
    Indices(Vec<usize>),
    /// This many evenly spaced frames
    Count(usize),
}

/// `floor(linspace(0, total - 1, count))`.
///
/// Duplicates are kept when `count > total`, which repeats frames.
pub fn evenly_spaced(total: usize, count: usize) -> Vec<usize> {
    if total == 0 || count == 0 {
        return Vec::new();
    }
    if count == 1 {
        return vec![0];
    }
    let last = (total - 1) as f64;
    (0..count)
        .map(|i| (last * i as f64 / (count - 1) as f64).floor() as usize)
        .collect()
}

/// All `.tif` files in `folder`, sorted by file name.
pub fn list_tiffs(folder: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(folder)
        .with_context(|| format!("Cannot read frame folder '{}'", folder.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case("tif"))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Load a single TIFF frame as a (rows, cols) f32 image.
pub fn load_frame(path: &Path) -> Result<Array2<f32>> {
    let img = image::open(path)
        .with_context(|| format!("Cannot decode TIFF '{}'", path.display()))?
        .to_luma32f();
    let (cols, rows) = img.dimensions();
    Array2::from_shape_vec((rows as usize, cols as usize), img.into_raw())
        .with_context(|| format!("Bad pixel buffer in '{}'", path.display()))
}

/// Load the selected frames of `folder` into a (frames, rows, cols) stack.
pub fn get_frames(folder: impl AsRef<Path>, selection: &FrameSelection) -> Result<Array3<f32>> {
    let folder = folder.as_ref();
    let files  = list_tiffs(folder)?;

    if files.is_empty() {
        bail!("no *.tif files found in '{}'", folder.display());
    }

    let indices: Vec<usize> = match selection {
        FrameSelection::All           => (0..files.len()).collect(),
        FrameSelection::Indices(list) => list.clone(),
        FrameSelection::Count(n)      => evenly_spaced(files.len(), *n),
    };

    if indices.is_empty() {
        bail!("frame selection for '{}' is empty", folder.display());
    }
    if let Some(bad) = indices.iter().find(|&&i| i >= files.len()) {
        bail!(
            "frame index {} out of range: '{}' has {} frames",
            bad, folder.display(), files.len()
        );
    }

    tracing::debug!("Loading {} of {} frames from '{}'", indices.len(), files.len(), folder.display());

    let frames: Vec<Array2<f32>> = indices
        .iter()
        .map(|&i| load_frame(&files[i]))
        .collect::<Result<_>>()?;

    let shape = frames[0].dim();
    if let Some(pos) = frames.iter().position(|f| f.dim() != shape) {
        bail!(
            "frame '{}' has shape {:?}, expected {:?}",
            files[indices[pos]].display(), frames[pos].dim(), shape
        );
    }

    let views: Vec<_> = frames.iter().map(|f| f.view()).collect();
    Ok(ndarray::stack(Axis(0), &views)?)
}
