//! Training report artifacts
//!
//! Renders the evaluation summary as a plain-text report and the confusion
//! matrix as a PNG heatmap.

use crate::error::Result;
use crate::training::ClassificationReport;
use image::{Rgb, RgbImage};
use std::path::Path;

const CELL_PX: u32 = 48;

/// Write the plain-text training report.
pub fn write_text_report(
    report: &ClassificationReport,
    class_names: &[&str],
    training_time_secs: f64,
    peak_memory_mb: f64,
    path: impl AsRef<Path>,
) -> Result<()> {
    let mut out = String::new();
    out.push_str("Classification report\n");
    out.push_str("=====================\n\n");
    out.push_str(&report.render_table(class_names));
    out.push_str(&format!(
        "\ntraining time: {training_time_secs:.2}s\npeak memory:   {peak_memory_mb:.1} MB\n"
    ));
    std::fs::write(path, out)?;
    Ok(())
}

/// Render the confusion matrix as a PNG heatmap. Each cell is shaded by its
/// count relative to the matrix maximum, light for zero through dark blue
/// for the largest count.
pub fn write_confusion_png(report: &ClassificationReport, path: impl AsRef<Path>) -> Result<()> {
    let k = report.confusion.nrows() as u32;
    let side = (k * CELL_PX).max(CELL_PX);
    let max_count = report.confusion.iter().copied().max().unwrap_or(0).max(1);

    let mut img = RgbImage::new(side, side);
    for (x, y, pixel) in img.enumerate_pixels_mut() {
        let col = (x / CELL_PX).min(k - 1);
        let row = (y / CELL_PX).min(k - 1);
        let count = report.confusion[[row as usize, col as usize]];
        let t = count as f64 / max_count as f64;
        *pixel = shade(t);

        // One-pixel grid line between cells
        if x % CELL_PX == 0 || y % CELL_PX == 0 {
            *pixel = Rgb([200, 200, 200]);
        }
    }

    img.save(path.as_ref())
        .map_err(|e| crate::error::RadscanError::Serialization(e.to_string()))?;
    Ok(())
}

/// Linear blend from near-white to dark blue.
fn shade(t: f64) -> Rgb<u8> {
    let t = t.clamp(0.0, 1.0);
    let lerp = |a: f64, b: f64| (a + t * (b - a)).round() as u8;
    Rgb([lerp(247.0, 8.0), lerp(251.0, 48.0), lerp(255.0, 107.0)])
}
