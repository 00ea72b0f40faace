// ============================================================
// Layer 4 — Summary Images
// ============================================================
// Collapses a (frames, rows, cols) video into single 2-D
// images that the networks take as input channels.
//
// The correlation image highlights pixels whose activity
// rises and falls together with their eight neighbours,
// which is what an active cell body looks like:
//
//   z(t, p)   = (x(t, p) - mean_t x(p)) / std_t x(p)
//   n(t, p)   = sum of z(t, q) over the 8 neighbours q of p
//               (zero outside the image) / number of in-bounds q
//   corr(p)   = mean_t  z(t, p) * n(t, p)

use ndarray::{Array2, Array3, Axis};

/// Temporal correlation between each pixel and its 8 neighbours.
/// Pixels with zero variance through time correlate as 0.
pub fn correlation_image(stack: &Array3<f32>) -> Array2<f32> {
    let (frames, rows, cols) = stack.dim();
    if frames == 0 {
        return Array2::zeros((rows, cols));
    }

    let mean = stack.mean_axis(Axis(0)).unwrap_or_else(|| Array2::zeros((rows, cols)));
    let std  = stack.std_axis(Axis(0), 0.0);

    let mut z = stack.clone();
    for mut frame in z.axis_iter_mut(Axis(0)) {
        frame -= &mean;
        frame.zip_mut_with(&std, |v, &s| {
            *v = if s == 0.0 { 0.0 } else { *v / s };
        });
    }

    let neighbours = neighbour_counts(rows, cols);
    let mut corr   = Array2::<f32>::zeros((rows, cols));

    for frame in z.axis_iter(Axis(0)) {
        for r in 0..rows {
            for c in 0..cols {
                let mut sum = 0.0f32;
                for dr in -1i64..=1 {
                    for dc in -1i64..=1 {
                        if dr == 0 && dc == 0 {
                            continue;
                        }
                        let rr = r as i64 + dr;
                        let cc = c as i64 + dc;
                        if rr >= 0 && cc >= 0 && (rr as usize) < rows && (cc as usize) < cols {
                            sum += frame[[rr as usize, cc as usize]];
                        }
                    }
                }
                corr[[r, c]] += frame[[r, c]] * sum / neighbours[[r, c]];
            }
        }
    }

    corr /= frames as f32;
    corr
}

/// Number of in-bounds 8-neighbours of each pixel.
/// A 1x1 image reports 1 to avoid dividing by zero; its sum is always 0.
fn neighbour_counts(rows: usize, cols: usize) -> Array2<f32> {
    Array2::from_shape_fn((rows, cols), |(r, c)| {
        let r_span = 1 + usize::from(r > 0) + usize::from(r + 1 < rows);
        let c_span = 1 + usize::from(c > 0) + usize::from(c + 1 < cols);
        ((r_span * c_span - 1) as f32).max(1.0)
    })
}

pub fn mean_image(stack: &Array3<f32>) -> Array2<f32> {
    let (_, rows, cols) = stack.dim();
    stack.mean_axis(Axis(0)).unwrap_or_else(|| Array2::zeros((rows, cols)))
}

pub fn max_image(stack: &Array3<f32>) -> Array2<f32> {
    let (frames, rows, cols) = stack.dim();
    if frames == 0 {
        return Array2::zeros((rows, cols));
    }
    stack.fold_axis(Axis(0), f32::NEG_INFINITY, |&acc, &v| acc.max(v))
}

/// Per-pixel median through time (mean of the two middle values for even counts).
pub fn median_image(stack: &Array3<f32>) -> Array2<f32> {
    let (frames, rows, cols) = stack.dim();
    if frames == 0 {
        return Array2::zeros((rows, cols));
    }
    Array2::from_shape_fn((rows, cols), |(r, c)| {
        let mut trace: Vec<f32> = stack.slice(ndarray::s![.., r, c]).to_vec();
        trace.sort_by(|a, b| a.total_cmp(b));
        let mid = frames / 2;
        if frames % 2 == 1 {
            trace[mid]
        } else {
            (trace[mid - 1] + trace[mid]) / 2.0
        }
    })
}
