// ============================================================
// Layer 4 — Region Proposal Targets
// ============================================================
// Turns labelled cell coordinates into the three training
// targets of the region proposal network:
//
//   somas      — every labelled pixel of the cell
//   borders    — the outer contour of the soma, drawn thick
//   centroids  — a small filled disc at the cell's mean position
//
// Masks are computed per cell, giving (cells, rows, cols)
// stacks. With `collapse_masks` the max across cells is taken
// and each stack has a single layer.
//
// Coordinates are (row, col); see domain::labels.

use anyhow::{bail, Context, Result};
use image::{GrayImage, Luma};
use imageproc::{
    contours::{find_contours, BorderType},
    drawing::draw_filled_circle_mut,
};
use ndarray::{Array2, Array3, Axis};
use std::{fs, path::Path};

use crate::domain::{
    labels::{CellRegion, DatasetInfo},
    sample::ImageMap,
};

#[derive(Debug, Clone, Copy)]
pub struct TargetOptions {
    pub collapse_masks:   bool,
    pub centroid_radius:  u32,
    pub border_thickness: u32,
}

impl Default for TargetOptions {
    fn default() -> Self {
        Self { collapse_masks: false, centroid_radius: 2, border_thickness: 2 }
    }
}

/// Soma, border and centroid masks, each (layers, rows, cols).
#[derive(Debug, Clone)]
pub struct MaskTargets {
    pub somas:     Array3<bool>,
    pub borders:   Array3<bool>,
    pub centroids: Array3<bool>,
}

impl MaskTargets {
    /// Max across the cell axis → one layer per mask type.
    pub fn collapse(&self) -> Self {
        Self {
            somas:     collapse_stack(&self.somas),
            borders:   collapse_stack(&self.borders),
            centroids: collapse_stack(&self.centroids),
        }
    }

    pub fn num_layers(&self) -> usize {
        self.somas.dim().0
    }

    /// The first layer of every mask as f32 target channels.
    /// Intended for collapsed targets.
    pub fn to_image_maps(&self) -> Vec<ImageMap> {
        [("somas", &self.somas), ("borders", &self.borders), ("centroids", &self.centroids)]
            .into_iter()
            .map(|(name, stack)| {
                let layer = stack.index_axis(Axis(0), 0).mapv(|b| if b { 1.0 } else { 0.0 });
                ImageMap::new(name, layer)
            })
            .collect()
    }
}

fn collapse_stack(stack: &Array3<bool>) -> Array3<bool> {
    stack
        .fold_axis(Axis(0), false, |&acc, &v| acc || v)
        .insert_axis(Axis(0))
}

/// Load labels from a raw dataset folder and build its masks.
pub fn get_targets(folder: impl AsRef<Path>, opts: &TargetOptions) -> Result<MaskTargets> {
    let folder = folder.as_ref();

    let info_path = folder.join("info.json");
    let info: DatasetInfo = serde_json::from_str(
        &fs::read_to_string(&info_path)
            .with_context(|| format!("Cannot read '{}'", info_path.display()))?,
    )
    .with_context(|| format!("Malformed '{}'", info_path.display()))?;

    let regions_path = folder.join("regions").join("consensus_regions.json");
    let cells: Vec<CellRegion> = serde_json::from_str(
        &fs::read_to_string(&regions_path)
            .with_context(|| format!("Cannot read '{}'", regions_path.display()))?,
    )
    .with_context(|| format!("Malformed '{}'", regions_path.display()))?;

    let (rows, cols) = info.image_shape()?;
    tracing::debug!("{} labelled cells in '{}' ({}x{})", cells.len(), folder.display(), rows, cols);

    let masks = cell_masks(&cells, rows, cols, opts)?;
    Ok(if opts.collapse_masks { masks.collapse() } else { masks })
}

/// Build per-cell masks for an image of `rows x cols` pixels.
pub fn cell_masks(
    cells: &[CellRegion],
    rows:  usize,
    cols:  usize,
    opts:  &TargetOptions,
) -> Result<MaskTargets> {
    let mut somas     = Array3::from_elem((cells.len(), rows, cols), false);
    let mut borders   = Array3::from_elem((cells.len(), rows, cols), false);
    let mut centroids = Array3::from_elem((cells.len(), rows, cols), false);

    for (i, cell) in cells.iter().enumerate() {
        if cell.coordinates.is_empty() {
            bail!("cell {} has no coordinates", i);
        }
        if !cell.fits(rows, cols) {
            bail!("cell {} has coordinates outside the {}x{} image", i, rows, cols);
        }

        let mut soma = GrayImage::new(cols as u32, rows as u32);
        for &[r, c] in &cell.coordinates {
            somas[[i, r, c]] = true;
            soma.put_pixel(c as u32, r as u32, Luma([255]));
        }

        let border = draw_border(&soma, opts.border_thickness);
        copy_into(&mut borders, i, &border);

        // `fits` guarantees a centroid inside the image
        if let Some((r, c)) = cell.centroid() {
            let mut disc = GrayImage::new(cols as u32, rows as u32);
            draw_filled_circle_mut(&mut disc, (c as i32, r as i32), opts.centroid_radius as i32, Luma([255]));
            disc.put_pixel(c as u32, r as u32, Luma([255]));
            copy_into(&mut centroids, i, &disc);
        }
    }

    Ok(MaskTargets { somas, borders, centroids })
}

/// Outer contours of a binary image, stamped with discs of `thickness / 2`.
fn draw_border(mask: &GrayImage, thickness: u32) -> GrayImage {
    let (w, h)  = mask.dimensions();
    let radius  = (thickness / 2) as i32;
    let mut out = GrayImage::new(w, h);

    for contour in find_contours::<i32>(mask) {
        if contour.border_type != BorderType::Outer {
            continue;
        }
        for p in &contour.points {
            if radius == 0 {
                out.put_pixel(p.x as u32, p.y as u32, Luma([255]));
            } else {
                draw_filled_circle_mut(&mut out, (p.x, p.y), radius, Luma([255]));
            }
        }
    }
    out
}

fn copy_into(stack: &mut Array3<bool>, layer: usize, img: &GrayImage) {
    for (x, y, px) in img.enumerate_pixels() {
        if px[0] > 0 {
            stack[[layer, y as usize, x as usize]] = true;
        }
    }
}

/// Grey image → (rows, cols, 3) RGB image with `contour` pixels painted `color`.
pub fn add_contours(img: &Array2<f32>, contour: &Array2<bool>, color: [f32; 3]) -> Array3<f32> {
    let (rows, cols) = img.dim();
    Array3::from_shape_fn((rows, cols, 3), |(r, c, ch)| {
        if contour[[r, c]] { color[ch] } else { img[[r, c]] }
    })
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn square(r0: usize, c0: usize, side: usize) -> CellRegion {
        let mut coords = Vec::new();
        for r in r0..r0 + side {
            for c in c0..c0 + side {
                coords.push([r, c]);
            }
        }
        CellRegion::new(coords)
    }

    #[test]
    fn test_mask_shapes_match_dimensions() {
        let cells = vec![square(2, 3, 5), square(12, 10, 4)];
        let masks = cell_masks(&cells, 20, 24, &TargetOptions::default()).unwrap();
        assert_eq!(masks.somas.dim(), (2, 20, 24));
        assert_eq!(masks.borders.dim(), (2, 20, 24));
        assert_eq!(masks.centroids.dim(), (2, 20, 24));
    }

    #[test]
    fn test_every_cell_has_a_centroid_pixel() {
        let cells = vec![square(0, 0, 1), square(5, 5, 3), CellRegion::new(vec![[19, 23]])];
        let opts  = TargetOptions { centroid_radius: 0, ..Default::default() };
        let masks = cell_masks(&cells, 20, 24, &opts).unwrap();
        for layer in masks.centroids.axis_iter(Axis(0)) {
            assert!(layer.iter().any(|&b| b));
        }
    }

    #[test]
    fn test_soma_and_centroid_positions() {
        let masks = cell_masks(&[square(4, 6, 3)], 12, 12, &TargetOptions::default()).unwrap();
        assert_eq!(masks.somas.iter().filter(|&&b| b).count(), 9);
        // mean of rows 4..7 is 5, of cols 6..9 is 7 — (row, col) order
        assert!(masks.centroids[[0, 5, 7]]);
        assert!(!masks.centroids[[0, 0, 0]]);
    }

    #[test]
    fn test_border_surrounds_soma() {
        let masks = cell_masks(&[square(5, 5, 6)], 16, 16, &TargetOptions::default()).unwrap();
        // corner of the soma is on the contour, far pixels are not
        assert!(masks.borders[[0, 5, 5]]);
        assert!(!masks.borders[[0, 0, 15]]);
        assert!(masks.borders.iter().filter(|&&b| b).count() > 0);
    }

    #[test]
    fn test_collapse_takes_max() {
        let opts  = TargetOptions { collapse_masks: true, ..Default::default() };
        let masks = cell_masks(&[square(0, 0, 2), square(6, 6, 2)], 10, 10, &opts).unwrap().collapse();
        assert_eq!(masks.num_layers(), 1);
        assert!(masks.somas[[0, 0, 0]] && masks.somas[[0, 7, 7]]);
        assert_eq!(masks.to_image_maps().len(), 3);
    }

    #[test]
    fn test_out_of_bounds_cell_rejected() {
        assert!(cell_masks(&[square(8, 8, 4)], 10, 10, &TargetOptions::default()).is_err());
    }

    #[test]
    fn test_get_targets_reads_label_folder() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("info.json"), r#"{"dimensions": [100, 8, 10]}"#).unwrap();
        fs::create_dir(dir.path().join("regions")).unwrap();
        fs::write(
            dir.path().join("regions").join("consensus_regions.json"),
            r#"[{"coordinates": [[1, 1], [1, 2], [2, 1], [2, 2]]}, {"coordinates": [[6, 8]]}]"#,
        )
        .unwrap();

        let opts  = TargetOptions { collapse_masks: true, ..Default::default() };
        let masks = get_targets(dir.path(), &opts).unwrap();
        assert_eq!(masks.somas.dim(), (1, 8, 10));
        assert!(masks.somas[[0, 6, 8]]);
    }

    #[test]
    fn test_add_contours_paints_color() {
        let img     = Array2::from_elem((2, 2), 0.5f32);
        let mut ctr = Array2::from_elem((2, 2), false);
        ctr[[1, 0]] = true;
        let rgb = add_contours(&img, &ctr, [1.0, 0.0, 0.0]);
        assert_eq!(rgb.dim(), (2, 2, 3));
        assert_eq!(rgb[[1, 0, 0]], 1.0);
        assert_eq!(rgb[[1, 0, 1]], 0.0);
        assert_eq!(rgb[[0, 0, 1]], 0.5);
    }
}
