// ============================================================
// Layer 4 — Intensity Scaling
// ============================================================
// Two ways of squeezing an image into [0, 1] for display or
// as network input:
//
//   scale_img         — plain min/max rescale
//   enhance_contrast  — clip to a percentile window first,
//                       so a few hot pixels don't wash out
//                       the rest of the image

use ndarray::Array2;

/// Rescale between 0 and 1. Constant images are returned unchanged.
pub fn scale_img(img: &Array2<f32>) -> Array2<f32> {
    let (min, max) = min_max(img);
    let ptp = max - min;
    if ptp > 0.0 && ptp.is_finite() {
        img.mapv(|v| (v - min) / ptp)
    } else {
        img.clone()
    }
}

/// Clip to the `percentiles.0`..`percentiles.1` percentile window and rescale.
///
/// Output always lies in [0, 1]. A degenerate window (upper limit not
/// above the lower one) yields an all-zero image.
pub fn enhance_contrast(img: &Array2<f32>, percentiles: (f64, f64)) -> Array2<f32> {
    let mut values: Vec<f32> = img.iter().copied().filter(|v| v.is_finite()).collect();
    if values.is_empty() {
        return Array2::zeros(img.dim());
    }
    values.sort_by(|a, b| a.total_cmp(b));

    let lo    = percentile_sorted(&values, percentiles.0);
    let hi    = percentile_sorted(&values, percentiles.1);
    let range = hi - lo;

    if !(range > 0.0) || !range.is_finite() {
        return Array2::zeros(img.dim());
    }

    img.mapv(|v| {
        let scaled = (v - lo).clamp(0.0, range) / range;
        if scaled.is_nan() { 0.0 } else { scaled }
    })
}

/// Percentile of already sorted values using linear interpolation
/// between closest ranks. `q` is clamped to [0, 100].
pub fn percentile_sorted(sorted: &[f32], q: f64) -> f32 {
    if sorted.is_empty() {
        return f32::NAN;
    }
    let q    = q.clamp(0.0, 100.0);
    let rank = q / 100.0 * (sorted.len() - 1) as f64;
    let lo   = rank.floor() as usize;
    let hi   = rank.ceil() as usize;
    let frac = (rank - lo as f64) as f32;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

fn min_max(img: &Array2<f32>) -> (f32, f32) {
    img.iter().fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
}
