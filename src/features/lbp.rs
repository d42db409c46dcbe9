//! Rotation-invariant uniform local binary pattern histogram

use ndarray::Array2;

const HIST_EPS: f64 = 1e-6;

/// Compute the uniform LBP histogram of an image.
///
/// Each interior pixel is coded against `n_points` bilinear samples on a
/// circle of `radius`; uniform codes (at most two 0/1 transitions around the
/// circle) map to their popcount, all others to the shared `n_points + 1`
/// bin. The histogram has `n_points + 2` bins and is L1-normalized with a
/// small epsilon so a degenerate image cannot divide by zero.
pub(crate) fn lbp_histogram(img: &Array2<f64>, radius: usize, n_points: usize) -> Vec<f64> {
    let (h, w) = img.dim();
    let n_bins = n_points + 2;
    let mut counts = vec![0u64; n_bins];

    if h <= 2 * radius || w <= 2 * radius {
        return vec![0.0; n_bins];
    }

    // Sample offsets around the circle, fixed for every pixel
    let offsets: Vec<(f64, f64)> = (0..n_points)
        .map(|k| {
            let theta = 2.0 * std::f64::consts::PI * k as f64 / n_points as f64;
            (-(radius as f64) * theta.sin(), (radius as f64) * theta.cos())
        })
        .collect();

    let mut bits = vec![false; n_points];
    for r in radius..h - radius {
        for c in radius..w - radius {
            let center = img[[r, c]];
            for (k, &(dr, dc)) in offsets.iter().enumerate() {
                let sample = bilinear(img, r as f64 + dr, c as f64 + dc);
                bits[k] = sample >= center;
            }
            counts[uniform_code(&bits, n_points)] += 1;
        }
    }

    let total: f64 = counts.iter().map(|&c| c as f64).sum();
    counts
        .iter()
        .map(|&c| c as f64 / (total + HIST_EPS))
        .collect()
}

/// Uniform coding: popcount for patterns with at most two circular
/// transitions, the overflow bin otherwise.
fn uniform_code(bits: &[bool], n_points: usize) -> usize {
    let transitions = (0..n_points)
        .filter(|&k| bits[k] != bits[(k + 1) % n_points])
        .count();
    if transitions <= 2 {
        bits.iter().filter(|&&b| b).count()
    } else {
        n_points + 1
    }
}

fn bilinear(img: &Array2<f64>, y: f64, x: f64) -> f64 {
    let (h, w) = img.dim();
    let y0 = y.floor() as usize;
    let x0 = x.floor() as usize;
    let y1 = (y0 + 1).min(h - 1);
    let x1 = (x0 + 1).min(w - 1);
    let fy = y - y0 as f64;
    let fx = x - x0 as f64;

    let top = img[[y0, x0]] * (1.0 - fx) + img[[y0, x1]] * fx;
    let bottom = img[[y1, x0]] * (1.0 - fx) + img[[y1, x1]] * fx;
    top * (1.0 - fy) + bottom * fy
}
