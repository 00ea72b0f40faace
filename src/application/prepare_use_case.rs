// ============================================================
// Layer 2 — PrepareUseCase
// ============================================================
// Turns raw labelled recordings into prepared training samples:
//
//   <raw_dir>/<name>/images/*.tif
//   <raw_dir>/<name>/info.json
//   <raw_dir>/<name>/regions/consensus_regions.json
//        │
//        ▼  sample frames → corr / mean / median / max
//        ▼  labels        → somas / borders / centroids (collapsed)
//        │
//   <data_dir>/training_data/<name>.bin
//   <data_dir>/training_data/<name>.png          (optional preview)
//   <data_dir>/training_data/<name>_borders.png  (optional overlay)

use ab_glyph::FontVec;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::{Path, PathBuf}};

use crate::application::train_use_case::TRAINING_DATA_DIR;
use crate::data::{
    contrast::scale_img,
    frames::{get_frames, FrameSelection},
    loader::SampleStore,
    summary::{correlation_image, max_image, mean_image, median_image},
    targets::{add_contours, get_targets, TargetOptions},
};
use crate::domain::sample::{ImageMap, TrainingSample};
use crate::infra::visualize::{add_column_titles, load_font, render_prediction_img, save_rgb, RenderOptions};

const BORDER_COLOR: [f32; 3] = [1.0, 0.0, 0.0];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepareConfig {
    /// Folder containing one sub-folder per labelled recording
    pub raw_dir:          String,
    pub data_dir:         String,
    /// Recordings to prepare; empty means every sub-folder
    pub datasets:         Vec<String>,
    /// Frames sampled for the summary images; 0 means all
    pub frames:           usize,
    pub centroid_radius:  u32,
    pub border_thickness: u32,
    pub write_previews:   bool,
    pub preview_height:   u32,
    /// Font file for channel-name titles on previews; none → untitled
    pub title_font:       Option<String>,
}

impl Default for PrepareConfig {
    fn default() -> Self {
        Self {
            raw_dir:          "data/raw".to_string(),
            data_dir:         "data".to_string(),
            datasets:         Vec::new(),
            frames:           1000,
            centroid_radius:  2,
            border_thickness: 2,
            write_previews:   true,
            preview_height:   800,
            title_font:       None,
        }
    }
}

pub struct PrepareUseCase {
    config: PrepareConfig,
}

impl PrepareUseCase {
    pub fn new(config: PrepareConfig) -> Self {
        Self { config }
    }

    /// Prepare every selected recording; returns the written sample files.
    pub fn execute(&self) -> Result<Vec<PathBuf>> {
        let cfg     = &self.config;
        let raw_dir = Path::new(&cfg.raw_dir);
        let names   = if cfg.datasets.is_empty() { list_datasets(raw_dir)? } else { cfg.datasets.clone() };
        if names.is_empty() {
            bail!("no recordings found in '{}'", raw_dir.display());
        }

        let font = match (&cfg.title_font, cfg.write_previews) {
            (Some(path), true) => Some(load_font(Path::new(path))?),
            _                  => None,
        };

        let store = SampleStore::new(Path::new(&cfg.data_dir).join(TRAINING_DATA_DIR));
        let mut written = Vec::with_capacity(names.len());
        for name in &names {
            tracing::info!("Preparing '{}'", name);
            let sample = prepare_sample(&raw_dir.join(name), name, cfg)
                .with_context(|| format!("Failed to prepare '{}'", name))?;
            let path = store.save(&sample)?;
            if cfg.write_previews {
                write_sample_imgs(&sample, store.dir(), cfg.preview_height, font.as_ref())?;
            }
            written.push(path);
        }
        tracing::info!("Prepared {} samples into '{}'", written.len(), store.dir().display());
        Ok(written)
    }
}

/// Sorted names of the sub-folders of `raw_dir`.
pub fn list_datasets(raw_dir: &Path) -> Result<Vec<String>> {
    let mut names: Vec<String> = fs::read_dir(raw_dir)
        .with_context(|| format!("Cannot read directory '{}'", raw_dir.display()))?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    Ok(names)
}

/// Summary images and collapsed masks of one recording.
pub fn prepare_sample(folder: &Path, name: &str, cfg: &PrepareConfig) -> Result<TrainingSample> {
    let selection = if cfg.frames == 0 { FrameSelection::All } else { FrameSelection::Count(cfg.frames) };
    let stack = get_frames(folder.join("images"), &selection)?;
    let (_, rows, cols) = stack.dim();

    let inputs = vec![
        ImageMap::new("corr",   correlation_image(&stack)),
        ImageMap::new("mean",   mean_image(&stack)),
        ImageMap::new("median", median_image(&stack)),
        ImageMap::new("max",    max_image(&stack)),
    ];

    let opts = TargetOptions {
        collapse_masks:   true,
        centroid_radius:  cfg.centroid_radius,
        border_thickness: cfg.border_thickness,
    };
    let targets = get_targets(folder, &opts)?;
    let (_, t_rows, t_cols) = targets.somas.dim();
    if (t_rows, t_cols) != (rows, cols) {
        bail!("frames are {}x{} but labels declare {}x{}", rows, cols, t_rows, t_cols);
    }

    TrainingSample::new(name, inputs, targets.to_image_maps())
}

/// Preview of a prepared sample: inputs over targets, plus the
/// correlation image with cell borders painted in. With a font,
/// every column is titled `<input> / <target>`.
pub fn write_sample_imgs(sample: &TrainingSample, dir: &Path, height: u32, font: Option<&FontVec>) -> Result<()> {
    let inputs:  Vec<_> = sample.inputs.iter().map(|m| m.data.clone()).collect();
    let targets: Vec<_> = sample.targets.iter().map(|m| m.data.clone()).collect();
    let opts = RenderOptions { height, ..Default::default() };

    let mut img = render_prediction_img(&inputs, &targets, None, &opts)?;
    if let Some(font) = font {
        img = add_column_titles(&img, &column_titles(sample), font);
    }
    let path = dir.join(format!("{}.png", sample.name));
    img.save(&path)
        .with_context(|| format!("Cannot write preview '{}'", path.display()))?;

    let corr    = sample.inputs.iter().find(|m| m.name == "corr");
    let borders = sample.targets.iter().find(|m| m.name == "borders");
    if let (Some(corr), Some(borders)) = (corr, borders) {
        let overlay = add_contours(&scale_img(&corr.data), &borders.data.mapv(|v| v > 0.5), BORDER_COLOR);
        save_rgb(&dir.join(format!("{}_borders.png", sample.name)), &overlay)?;
    }
    Ok(())
}

/// `corr / somas`, `mean / borders`, ... one per mosaic column.
pub fn column_titles(sample: &TrainingSample) -> Vec<String> {
    let columns = sample.inputs.len().max(sample.targets.len());
    (0..columns)
        .map(|i| {
            [sample.inputs.get(i), sample.targets.get(i)]
                .into_iter()
                .flatten()
                .map(|m| m.name.as_str())
                .collect::<Vec<_>>()
                .join(" / ")
        })
        .collect()
}
