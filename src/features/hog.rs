//! Gradient-orientation histogram descriptor
//!
//! Unsigned orientations over [0°, 180°), magnitude-weighted cell histograms,
//! L2-Hys normalization per 1×1-cell block.

use ndarray::Array2;

const L2_HYS_EPS: f64 = 1e-5;
const L2_HYS_CLIP: f64 = 0.2;

/// Compute the gradient-orientation histogram block of an image.
///
/// The image is divided into `cell_size`×`cell_size` cells (trailing pixels
/// that do not fill a cell are ignored); each cell contributes `orientations`
/// values, laid out row-major with the orientation bins innermost.
pub(crate) fn hog_descriptor(
    img: &Array2<f64>,
    orientations: usize,
    cell_size: usize,
) -> Vec<f64> {
    let (h, w) = img.dim();
    let cells_y = h / cell_size;
    let cells_x = w / cell_size;
    let bin_width = 180.0 / orientations as f64;

    // Centered differences, zero at the borders
    let mut gx = Array2::<f64>::zeros((h, w));
    let mut gy = Array2::<f64>::zeros((h, w));
    for r in 0..h {
        for c in 1..w.saturating_sub(1) {
            gx[[r, c]] = img[[r, c + 1]] - img[[r, c - 1]];
        }
    }
    for r in 1..h.saturating_sub(1) {
        for c in 0..w {
            gy[[r, c]] = img[[r + 1, c]] - img[[r - 1, c]];
        }
    }

    let mut descriptor = Vec::with_capacity(cells_y * cells_x * orientations);

    for cy in 0..cells_y {
        for cx in 0..cells_x {
            let mut hist = vec![0.0f64; orientations];
            for r in cy * cell_size..(cy + 1) * cell_size {
                for c in cx * cell_size..(cx + 1) * cell_size {
                    let dx = gx[[r, c]];
                    let dy = gy[[r, c]];
                    let magnitude = (dx * dx + dy * dy).sqrt();
                    if magnitude == 0.0 {
                        continue;
                    }
                    let mut angle = dy.atan2(dx).to_degrees();
                    if angle < 0.0 {
                        angle += 180.0;
                    }
                    if angle >= 180.0 {
                        angle -= 180.0;
                    }
                    let bin = ((angle / bin_width) as usize).min(orientations - 1);
                    hist[bin] += magnitude;
                }
            }
            l2_hys_normalize(&mut hist);
            descriptor.extend_from_slice(&hist);
        }
    }

    descriptor
}

/// L2 normalize, clip at 0.2, renormalize. Blocks are single cells here, so
/// this runs once per cell histogram.
fn l2_hys_normalize(block: &mut [f64]) {
    let norm = (block.iter().map(|v| v * v).sum::<f64>() + L2_HYS_EPS * L2_HYS_EPS).sqrt();
    for v in block.iter_mut() {
        *v = (*v / norm).min(L2_HYS_CLIP);
    }
    let norm = (block.iter().map(|v| v * v).sum::<f64>() + L2_HYS_EPS * L2_HYS_EPS).sqrt();
    for v in block.iter_mut() {
        *v /= norm;
    }
}
