// ============================================================
// Layer 4 — Subframe Augmentation
// ============================================================
// Cuts an output window out of a source image under a random
// similarity transform (rotation + isotropic scale) around a
// chosen source centre.
//
// For output pixel (i, j):
//   (dy, dx)   = (i, j) - output centre
//   (sy, sx)   = centre + R(-angle) · (dy, dx) / scale
//
// Samples falling outside the source image read as 0.
// Inputs use bilinear interpolation; binary targets use
// nearest neighbour so they stay binary.

use ndarray::Array2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    Nearest,
    Bilinear,
}

/// Similarity transform from output window to source image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Source position (row, col) the window is centred on
    pub center:    (f32, f32),
    /// Rotation in degrees
    pub angle_deg: f32,
    /// > 1 zooms in, < 1 zooms out
    pub scale:     f32,
}

impl Transform {
    pub fn identity(center: (f32, f32)) -> Self {
        Self { center, angle_deg: 0.0, scale: 1.0 }
    }

    /// Source coordinates of output pixel (i, j) in a window of `shape`.
    pub fn source_of(&self, i: usize, j: usize, shape: (usize, usize)) -> (f32, f32) {
        let dy = i as f32 - (shape.0 as f32 - 1.0) / 2.0;
        let dx = j as f32 - (shape.1 as f32 - 1.0) / 2.0;
        let (sin, cos) = self.angle_deg.to_radians().sin_cos();
        let scale = if self.scale > 0.0 { self.scale } else { 1.0 };
        let sy = ( cos * dy + sin * dx) / scale;
        let sx = (-sin * dy + cos * dx) / scale;
        (self.center.0 + sy, self.center.1 + sx)
    }
}

/// Resample `src` into a window of `shape` under `transform`.
pub fn warp_window(
    src:       &Array2<f32>,
    shape:     (usize, usize),
    transform: &Transform,
    interp:    Interpolation,
) -> Array2<f32> {
    Array2::from_shape_fn(shape, |(i, j)| {
        let (v, u) = transform.source_of(i, j, shape);
        match interp {
            Interpolation::Nearest  => nearest_sample(src, u, v),
            Interpolation::Bilinear => bilinear_sample(src, u, v),
        }
    })
}

/// Nearest-neighbour sample at column `u`, row `v`; 0 outside the image.
pub fn nearest_sample(data: &Array2<f32>, u: f32, v: f32) -> f32 {
    let (rows, cols) = data.dim();
    let (r, c) = (v.round(), u.round());
    if r < 0.0 || c < 0.0 || r >= rows as f32 || c >= cols as f32 {
        return 0.0;
    }
    data[[r as usize, c as usize]]
}

/// Bilinear sample at column `u`, row `v`; 0 outside the image.
pub fn bilinear_sample(data: &Array2<f32>, u: f32, v: f32) -> f32 {
    let (rows, cols) = data.dim();
    if rows == 0 || cols == 0 {
        return 0.0;
    }
    if u < 0.0 || v < 0.0 || u > (cols - 1) as f32 || v > (rows - 1) as f32 {
        return 0.0;
    }

    let u0 = u.floor() as usize;
    let v0 = v.floor() as usize;
    let u1 = (u0 + 1).min(cols - 1);
    let v1 = (v0 + 1).min(rows - 1);

    let fu = u - u0 as f32;
    let fv = v - v0 as f32;

    let val0 = data[[v0, u0]] * (1.0 - fu) + data[[v0, u1]] * fu;
    let val1 = data[[v1, u0]] * (1.0 - fu) + data[[v1, u1]] * fu;

    val0 * (1.0 - fv) + val1 * fv
}

/// Z-score in place; a constant image is only mean-centred.
pub fn normalize(img: &mut Array2<f32>) {
    let n = img.len();
    if n == 0 {
        return;
    }
    let mean = img.sum() / n as f32;
    let var  = img.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / n as f32;
    let std  = var.sqrt();
    img.mapv_inplace(|v| if std > 0.0 { (v - mean) / std } else { v - mean });
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> Array2<f32> {
        Array2::from_shape_fn((5, 5), |(r, c)| (r * 5 + c) as f32)
    }

    #[test]
    fn test_identity_window_copies_source() {
        let src = ramp();
        let out = warp_window(&src, (5, 5), &Transform::identity((2.0, 2.0)), Interpolation::Bilinear);
        for (a, b) in out.iter().zip(src.iter()) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn test_quarter_turn() {
        let src = ramp();
        let t   = Transform { center: (2.0, 2.0), angle_deg: 90.0, scale: 1.0 };
        let out = warp_window(&src, (5, 5), &t, Interpolation::Nearest);
        // centre stays put, corners move to their neighbours
        assert_eq!(out[[2, 2]], src[[2, 2]]);
        assert_eq!(out[[0, 0]], src[[0, 4]]);
    }

    #[test]
    fn test_outside_reads_zero() {
        let src = Array2::from_elem((4, 4), 1.0f32);
        let out = warp_window(&src, (8, 8), &Transform::identity((1.5, 1.5)), Interpolation::Nearest);
        assert_eq!(out[[0, 0]], 0.0);
        assert_eq!(out[[4, 4]], 1.0);
    }

    #[test]
    fn test_nearest_keeps_binary_values() {
        let src = Array2::from_shape_fn((6, 6), |(r, c)| if (r + c) % 2 == 0 { 1.0 } else { 0.0 });
        let t   = Transform { center: (3.0, 3.0), angle_deg: 33.0, scale: 1.3 };
        let out = warp_window(&src, (6, 6), &t, Interpolation::Nearest);
        assert!(out.iter().all(|&v| v == 0.0 || v == 1.0));
    }

    #[test]
    fn test_normalize_zero_mean_unit_std() {
        let mut img = ramp();
        normalize(&mut img);
        let mean = img.sum() / img.len() as f32;
        let var  = img.iter().map(|v| v * v).sum::<f32>() / img.len() as f32;
        assert!(mean.abs() < 1e-5);
        assert!((var - 1.0).abs() < 1e-4);
    }
}
