// ============================================================
// Layer 6 — Prediction Images
// ============================================================
// Writes one PNG per sample for visual QA of training:
//
//   ┌────────┬────────┬────────┬────────┐
//   │ input0 │ input1 │ input2 │ input3 │   ← inputs, scaled to [0, 1]
//   ├────────┼────────┼────────┼────────┤
//   │ somas  │borders │centroid│        │   ← targets
//   ├────────┼────────┼────────┼────────┤
//   │ pred0  │ pred1  │ pred2  │        │   ← predictions, scaled
//   └────────┴────────┴────────┴────────┘
//
// Channels are laid side by side; unused cells stay black.
// The mosaic is resized to a fixed height with nearest
// neighbour so single pixels remain visible. Column titles
// are drawn in a band above the mosaic when a font is given.

use ab_glyph::{FontVec, PxScale};
use anyhow::{anyhow, bail, Context, Result};
use image::{imageops::FilterType, GrayImage, Luma, Rgb, RgbImage};
use imageproc::drawing::{draw_text_mut, text_size};
use ndarray::{s, Array2, Array3};
use std::{fs, path::Path};

use crate::data::contrast::{enhance_contrast, scale_img};

#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    /// Output height in pixels
    pub height:     u32,
    /// Percentile window applied to inputs; (0, 100) disables it
    pub x_contrast: (f64, f64),
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self { height: 800, x_contrast: (0.0, 100.0) }
    }
}

/// Build the [inputs | targets | predictions] mosaic with values in [0, 1].
pub fn prediction_mosaic(
    inputs:      &[Array2<f32>],
    targets:     &[Array2<f32>],
    predictions: Option<&[Array2<f32>]>,
    x_contrast:  (f64, f64),
) -> Result<Array2<f32>> {
    let Some(first) = inputs.first() else {
        bail!("prediction image needs at least one input channel");
    };
    let (rows, cols) = first.dim();
    let all = inputs
        .iter()
        .chain(targets)
        .chain(predictions.unwrap_or_default());
    for img in all {
        if img.dim() != (rows, cols) {
            bail!("channel of shape {:?} does not match {:?}", img.dim(), (rows, cols));
        }
    }

    let inputs: Vec<Array2<f32>> = inputs
        .iter()
        .map(|x| {
            let x = scale_img(x);
            if x_contrast != (0.0, 100.0) { enhance_contrast(&x, x_contrast) } else { x }
        })
        .collect();
    let predictions: Option<Vec<Array2<f32>>> =
        predictions.map(|p| p.iter().map(scale_img).collect());

    let mut layers: Vec<&[Array2<f32>]> = vec![inputs.as_slice(), targets];
    if let Some(p) = &predictions {
        layers.push(p.as_slice());
    }
    let width = layers.iter().map(|l| l.len()).max().unwrap_or(0) * cols;

    let mut mosaic = Array2::<f32>::zeros((rows * layers.len(), width));
    for (row, layer) in layers.iter().enumerate() {
        for (col, img) in layer.iter().enumerate() {
            mosaic
                .slice_mut(s![row * rows..(row + 1) * rows, col * cols..(col + 1) * cols])
                .assign(img);
        }
    }
    Ok(mosaic)
}

/// Prediction mosaic as an 8-bit image `opts.height` pixels tall.
pub fn render_prediction_img(
    inputs:      &[Array2<f32>],
    targets:     &[Array2<f32>],
    predictions: Option<&[Array2<f32>]>,
    opts:        &RenderOptions,
) -> Result<GrayImage> {
    let mosaic = prediction_mosaic(inputs, targets, predictions, opts.x_contrast)?;
    let img    = to_gray(&mosaic);

    let (w, h)   = img.dimensions();
    let height   = opts.height.max(1);
    let width    = ((w as f64 / h.max(1) as f64) * height as f64).round().max(1.0) as u32;
    Ok(image::imageops::resize(&img, width, height, FilterType::Nearest))
}

/// Render a prediction mosaic to `path` (PNG).
pub fn save_prediction_img(
    path:        &Path,
    inputs:      &[Array2<f32>],
    targets:     &[Array2<f32>],
    predictions: Option<&[Array2<f32>]>,
    opts:        &RenderOptions,
) -> Result<()> {
    render_prediction_img(inputs, targets, predictions, opts)?
        .save(path)
        .with_context(|| format!("Cannot write prediction image '{}'", path.display()))?;
    tracing::debug!("Wrote prediction image '{}'", path.display());
    Ok(())
}

/// Read a TrueType / OpenType font for column titles.
pub fn load_font(path: &Path) -> Result<FontVec> {
    let bytes = fs::read(path)
        .with_context(|| format!("Cannot read font '{}'", path.display()))?;
    FontVec::try_from_vec(bytes).map_err(|e| anyhow!("Invalid font '{}': {e}", path.display()))
}

/// Copy of `img` with a title band on top, one title centred per column.
pub fn add_column_titles(img: &GrayImage, titles: &[String], font: &FontVec) -> GrayImage {
    let scale = PxScale::from((img.height() as f32 / 25.0).max(12.0));
    let band  = (scale.y * 1.5).ceil() as u32;

    let mut out = GrayImage::new(img.width(), img.height() + band);
    image::imageops::replace(&mut out, img, 0, band as i64);

    let col_width = img.width() / titles.len().max(1) as u32;
    for (i, title) in titles.iter().enumerate() {
        let (text_width, _) = text_size(scale, font, title);
        let x = i as u32 * col_width + col_width.saturating_sub(text_width) / 2;
        draw_text_mut(&mut out, Luma([255u8]), x as i32, (scale.y * 0.25) as i32, scale, font, title);
    }
    out
}

/// [0, 1] floats → 8-bit grey, clamping anything outside.
pub fn to_gray(img: &Array2<f32>) -> GrayImage {
    let (rows, cols) = img.dim();
    GrayImage::from_fn(cols as u32, rows as u32, |x, y| {
        let v = img[[y as usize, x as usize]];
        let v = if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 };
        Luma([(v * 255.0) as u8])
    })
}

/// (rows, cols, 3) floats in [0, 1] → RGB PNG at `path`.
pub fn save_rgb(path: &Path, img: &Array3<f32>) -> Result<()> {
    let (rows, cols, channels) = img.dim();
    if channels != 3 {
        bail!("RGB image needs 3 channels, got {}", channels);
    }
    let to_u8 = |v: f32| if v.is_finite() { (v.clamp(0.0, 1.0) * 255.0) as u8 } else { 0 };
    let rgb = RgbImage::from_fn(cols as u32, rows as u32, |x, y| {
        let (r, c) = (y as usize, x as usize);
        Rgb([to_u8(img[[r, c, 0]]), to_u8(img[[r, c, 1]]), to_u8(img[[r, c, 2]])])
    });
    rgb.save(path)
        .with_context(|| format!("Cannot write image '{}'", path.display()))?;
    Ok(())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(rows: usize, cols: usize) -> Array2<f32> {
        Array2::from_shape_fn((rows, cols), |(r, c)| (r * cols + c) as f32)
    }

    #[test]
    fn test_mosaic_layout() {
        let inputs  = vec![ramp(4, 5), ramp(4, 5)];
        let targets = vec![Array2::ones((4, 5))];
        let preds   = vec![ramp(4, 5) * 10.0];
        let mosaic  = prediction_mosaic(&inputs, &targets, Some(preds.as_slice()), (0.0, 100.0)).unwrap();

        assert_eq!(mosaic.dim(), (12, 10));
        // scaled input corner, target block, empty target slot, scaled prediction
        assert_eq!(mosaic[[3, 4]], 1.0);
        assert_eq!(mosaic[[4, 0]], 1.0);
        assert_eq!(mosaic[[4, 7]], 0.0);
        assert_eq!(mosaic[[11, 4]], 1.0);
        assert!(mosaic.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_mosaic_without_predictions() {
        let mosaic = prediction_mosaic(&[ramp(3, 3)], &[ramp(3, 3) / 8.0], None, (5.0, 95.0)).unwrap();
        assert_eq!(mosaic.dim(), (6, 3));
    }

    #[test]
    fn test_mismatched_channels_rejected() {
        assert!(prediction_mosaic(&[ramp(3, 3)], &[ramp(4, 3)], None, (0.0, 100.0)).is_err());
        assert!(prediction_mosaic(&[], &[ramp(4, 3)], None, (0.0, 100.0)).is_err());
    }

    #[test]
    fn test_png_is_resized_to_height() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("prediction0.png");
        let opts = RenderOptions { height: 60, ..Default::default() };
        let preds = vec![ramp(4, 8)];
        save_prediction_img(&path, &[ramp(4, 8)], &[ramp(4, 8)], Some(preds.as_slice()), &opts).unwrap();

        let img = image::open(&path).unwrap();
        assert_eq!(img.height(), 60);
        // mosaic is 12x8 → width 40
        assert_eq!(img.width(), 40);
    }

    #[test]
    fn test_save_rgb_checks_channels() {
        let dir = tempfile::tempdir().unwrap();
        let ok  = Array3::<f32>::from_elem((4, 5, 3), 0.5);
        let path = dir.path().join("rgb.png");
        save_rgb(&path, &ok).unwrap();
        let back = image::open(&path).unwrap().to_rgb8();
        assert_eq!(back.dimensions(), (5, 4));

        let bad = Array3::<f32>::zeros((4, 5, 2));
        assert!(save_rgb(&dir.path().join("bad.png"), &bad).is_err());
    }

    #[test]
    fn test_render_matches_requested_height() {
        let img = render_prediction_img(&[ramp(4, 8)], &[ramp(4, 8)], None, &RenderOptions { height: 16, ..Default::default() }).unwrap();
        // mosaic is 8x8 → 16x16
        assert_eq!(img.dimensions(), (16, 16));
    }

    #[test]
    fn test_invalid_font_is_rejected() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.ttf");
        fs::write(&path, b"not a font").unwrap();
        assert!(load_font(&path).is_err());
        assert!(load_font(&dir.path().join("missing.ttf")).is_err());
    }
}
