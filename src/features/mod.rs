//! Image feature extraction
//!
//! Turns raw image bytes into a fixed-length descriptor: a
//! gradient-orientation histogram block concatenated with a uniform local
//! binary pattern histogram. The same extractor runs at dataset-build time
//! and at inference time; its configuration is stamped into every persisted
//! artifact so the two can never silently diverge.

mod hog;
mod lbp;

use crate::error::{RadscanError, Result};
use hog::hog_descriptor;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage};
use lbp::lbp_histogram;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Bumped whenever the descriptor layout or preprocessing changes shape or
/// meaning. Artifacts stamped with another version are refused at load.
pub const DESCRIPTOR_VERSION: u32 = 1;

/// Descriptor configuration shared by training and inference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Descriptor layout version
    pub version: u32,
    /// Square resize target in pixels
    pub image_side: u32,
    /// Orientation bins in the gradient histogram
    pub orientations: usize,
    /// Cell side in pixels for the gradient histogram
    pub cell_size: usize,
    /// Circle radius for the texture descriptor
    pub lbp_radius: usize,
    /// Sample points on the circle (`8 × radius`)
    pub lbp_points: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        let lbp_radius = 3;
        Self {
            version: DESCRIPTOR_VERSION,
            image_side: 150,
            orientations: 8,
            cell_size: 16,
            lbp_radius,
            lbp_points: 8 * lbp_radius,
        }
    }
}

impl ExtractorConfig {
    /// Total descriptor length for this configuration. Constant for a fixed
    /// config; all downstream code depends on it.
    pub fn feature_len(&self) -> usize {
        let cells = (self.image_side as usize / self.cell_size).pow(2);
        cells * self.orientations + self.lbp_points + 2
    }
}

/// Stateless image-to-descriptor transform.
#[derive(Debug, Clone, Default)]
pub struct FeatureExtractor {
    config: ExtractorConfig,
}

impl FeatureExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    pub fn feature_len(&self) -> usize {
        self.config.feature_len()
    }

    /// Decode raw bytes and extract the descriptor. A decode failure
    /// propagates; it is never substituted with a zero vector.
    pub fn extract_bytes(&self, bytes: &[u8], entry: &str) -> Result<Array1<f64>> {
        if bytes.is_empty() {
            return Err(RadscanError::Decode {
                entry: entry.to_string(),
                reason: "empty image payload".to_string(),
            });
        }
        let img = image::load_from_memory(bytes).map_err(|e| RadscanError::Decode {
            entry: entry.to_string(),
            reason: e.to_string(),
        })?;
        Ok(self.extract_image(&img))
    }

    /// Extract the descriptor from a decoded image. Deterministic: identical
    /// pixels produce bit-identical output.
    pub fn extract_image(&self, img: &DynamicImage) -> Array1<f64> {
        let side = self.config.image_side;
        let gray = img.to_luma8();
        let resized = imageops::resize(&gray, side, side, FilterType::Triangle);
        let equalized = equalize_histogram(&resized);

        let scaled = Array2::from_shape_fn(
            (side as usize, side as usize),
            |(r, c)| equalized.get_pixel(c as u32, r as u32).0[0] as f64 / 255.0,
        );

        let mut descriptor = hog_descriptor(&scaled, self.config.orientations, self.config.cell_size);
        descriptor.extend(lbp_histogram(
            &scaled,
            self.config.lbp_radius,
            self.config.lbp_points,
        ));
        debug_assert_eq!(descriptor.len(), self.config.feature_len());
        Array1::from_vec(descriptor)
    }
}

/// Global histogram equalization over 256 intensity levels.
fn equalize_histogram(img: &GrayImage) -> GrayImage {
    let mut hist = [0u64; 256];
    for p in img.pixels() {
        hist[p.0[0] as usize] += 1;
    }

    let mut cdf = [0u64; 256];
    let mut acc = 0u64;
    for (i, &count) in hist.iter().enumerate() {
        acc += count;
        cdf[i] = acc;
    }

    let total = acc;
    let cdf_min = cdf.iter().copied().find(|&v| v > 0).unwrap_or(0);
    if total == cdf_min {
        // Constant image: nothing to spread
        return img.clone();
    }

    let mut map = [0u8; 256];
    for i in 0..256 {
        let num = cdf[i].saturating_sub(cdf_min) as f64;
        let den = (total - cdf_min) as f64;
        map[i] = (num / den * 255.0).round() as u8;
    }

    let mut out = img.clone();
    for p in out.pixels_mut() {
        p.0[0] = map[p.0[0] as usize];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use std::io::Cursor;

    fn test_png(w: u32, h: u32, seed: u8) -> Vec<u8> {
        let img = GrayImage::from_fn(w, h, |x, y| {
            Luma([((x * 7 + y * 13) as u8).wrapping_add(seed)])
        });
        let mut bytes = Vec::new();
        DynamicImage::ImageLuma8(img)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_feature_len_constant() {
        let config = ExtractorConfig::default();
        assert_eq!(config.feature_len(), 674);
    }

    #[test]
    fn test_fixed_length_for_any_input_size() {
        let extractor = FeatureExtractor::default();
        for (w, h) in [(30, 30), (150, 150), (320, 200), (97, 311)] {
            let bytes = test_png(w, h, 3);
            let vec = extractor.extract_bytes(&bytes, "t.png").unwrap();
            assert_eq!(vec.len(), 674);
        }
    }

    #[test]
    fn test_deterministic() {
        let extractor = FeatureExtractor::default();
        let bytes = test_png(120, 90, 11);
        let a = extractor.extract_bytes(&bytes, "a.png").unwrap();
        let b = extractor.extract_bytes(&bytes, "a.png").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_texture_block_sums_to_one() {
        let extractor = FeatureExtractor::default();
        let bytes = test_png(150, 150, 29);
        let vec = extractor.extract_bytes(&bytes, "t.png").unwrap();
        let lbp_sum: f64 = vec.iter().skip(9 * 9 * 8).sum();
        assert!((lbp_sum - 1.0).abs() < 1e-4, "texture block sum {lbp_sum}");
    }

    #[test]
    fn test_invalid_bytes_fail_with_decode_error() {
        let extractor = FeatureExtractor::default();
        let err = extractor
            .extract_bytes(b"definitely not an image", "bad.png")
            .unwrap_err();
        assert!(matches!(err, RadscanError::Decode { .. }));
    }

    #[test]
    fn test_empty_bytes_fail() {
        let extractor = FeatureExtractor::default();
        assert!(extractor.extract_bytes(&[], "empty.png").is_err());
    }

    #[test]
    fn test_equalize_constant_image() {
        let img = GrayImage::from_pixel(10, 10, Luma([80]));
        let out = equalize_histogram(&img);
        assert_eq!(out.get_pixel(5, 5).0[0], 80);
    }

    #[test]
    fn test_equalize_spreads_range() {
        let img = GrayImage::from_fn(16, 16, |x, _| Luma([100 + (x as u8 % 4)]));
        let out = equalize_histogram(&img);
        let max = out.pixels().map(|p| p.0[0]).max().unwrap();
        assert_eq!(max, 255);
    }
}
