// ============================================================
// Layer 4 — Image Preprocessor
// ============================================================
// Turns raw grayscale graphemes into binarized, optionally
// resized, flattened images.
//
// Steps per image (applied in order):
//   1. Validate the pixel count against the declared input shape
//   2. Otsu threshold: pick the global threshold that maximises
//      the between-class variance of the intensity histogram
//   3. Binarize: pixels above the threshold → 255, others → 0
//   4. Area resize to the target shape (box average with
//      fractional pixel coverage, anti-aliases when shrinking)
//
// Handwritten glyphs have strongly bimodal intensities, so the
// per-image Otsu threshold adapts to scan conditions where a
// fixed cut-off would not.
//
// Output layout: one row per image, pixels in row-major order.

use ndarray::Array2;

use crate::domain::error::{PipelineError, Result};
use crate::domain::labels::ImageShape;

/// Binarizes and resizes images of one fixed input shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImagePreprocessor {
    input: ImageShape,
    /// None keeps the input resolution
    target: Option<ImageShape>,
}

impl ImagePreprocessor {
    /// Create a preprocessor for `input`-sized images.
    /// Fails if either shape has a zero dimension.
    pub fn new(input: ImageShape, target: Option<ImageShape>) -> Result<Self> {
        for shape in std::iter::once(input).chain(target) {
            if shape.pixels() == 0 {
                return Err(PipelineError::Validation(format!(
                    "image shape {shape} has a zero dimension"
                )));
            }
        }
        Ok(Self { input, target })
    }

    pub fn input_shape(&self) -> ImageShape {
        self.input
    }

    /// Shape of every image this preprocessor emits
    pub fn output_shape(&self) -> ImageShape {
        self.target.unwrap_or(self.input)
    }

    /// Binarize and resize one flattened image.
    pub fn process_image(&self, pixels: &[u8]) -> Result<Vec<u8>> {
        if pixels.len() != self.input.pixels() {
            return Err(PipelineError::Validation(format!(
                "image has {} pixels, expected {} ({})",
                pixels.len(),
                self.input.pixels(),
                self.input
            )));
        }

        let threshold = otsu_threshold(pixels);
        let binary = binarize(pixels, threshold);

        match self.target {
            Some(target) if target != self.input => Ok(resize_area(&binary, self.input, target)),
            _ => Ok(binary),
        }
    }

    /// Process a batch of images into a table with one row per image.
    ///
    /// The first image that fails validation aborts the batch; the error
    /// names its position.
    pub fn process_batch<I>(&self, images: I) -> Result<Array2<u8>>
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        let width = self.output_shape().pixels();
        let mut flat = Vec::new();
        let mut rows = 0usize;

        for (index, image) in images.into_iter().enumerate() {
            let processed = self.process_image(image.as_ref()).map_err(|e| match e {
                PipelineError::Validation(msg) => {
                    PipelineError::Validation(format!("image #{index}: {msg}"))
                }
                other => other,
            })?;
            flat.extend_from_slice(&processed);
            rows += 1;
        }

        Array2::from_shape_vec((rows, width), flat)
            .map_err(|e| PipelineError::Validation(format!("cannot shape batch: {e}")))
    }
}

// ─── Otsu Threshold ───────────────────────────────────────────────────────────
/// Global threshold maximising the between-class variance.
///
/// Class 0 is `[0, t]`, class 1 is `(t, 255]`. Ties keep the lowest `t`.
/// A constant image yields 0.
pub fn otsu_threshold(pixels: &[u8]) -> u8 {
    let mut histogram = [0u64; 256];
    for &p in pixels {
        histogram[p as usize] += 1;
    }

    let total = pixels.len() as f64;
    let weighted_total: f64 = histogram
        .iter()
        .enumerate()
        .map(|(i, &count)| i as f64 * count as f64)
        .sum();

    let mut background = 0.0f64;
    let mut background_sum = 0.0f64;
    let mut best_threshold = 0u8;
    let mut best_variance = -1.0f64;

    for (t, &count) in histogram.iter().enumerate() {
        background += count as f64;
        if background == 0.0 {
            continue;
        }
        let foreground = total - background;
        if foreground == 0.0 {
            break;
        }

        background_sum += t as f64 * count as f64;
        let mean_bg = background_sum / background;
        let mean_fg = (weighted_total - background_sum) / foreground;
        let variance = background * foreground * (mean_bg - mean_fg).powi(2);

        if variance > best_variance {
            best_variance = variance;
            best_threshold = t as u8;
        }
    }

    best_threshold
}

/// Pixels strictly above `threshold` become 255, the rest 0.
pub fn binarize(pixels: &[u8], threshold: u8) -> Vec<u8> {
    pixels
        .iter()
        .map(|&p| if p > threshold { 255 } else { 0 })
        .collect()
}

// ─── Area Resize ──────────────────────────────────────────────────────────────
/// Resize by averaging the source area each destination pixel covers.
///
/// Source pixels that are only partly covered contribute in proportion
/// to the covered fraction, so shrinking by a non-integer factor still
/// conserves mean intensity.
pub fn resize_area(pixels: &[u8], from: ImageShape, to: ImageShape) -> Vec<u8> {
    let rows = coverage(from.height, to.height);
    let cols = coverage(from.width, to.width);

    let mut out = Vec::with_capacity(to.pixels());
    for row_weights in &rows {
        for col_weights in &cols {
            let mut acc = 0.0f32;
            for &(sy, wy) in row_weights {
                let line = &pixels[sy * from.width..(sy + 1) * from.width];
                for &(sx, wx) in col_weights {
                    acc += line[sx] as f32 * wy * wx;
                }
            }
            out.push(acc.round().clamp(0.0, 255.0) as u8);
        }
    }
    out
}

/// For each destination index, the source indices it covers and their weights.
/// Weights of one destination index sum to 1.
fn coverage(src: usize, dst: usize) -> Vec<Vec<(usize, f32)>> {
    let scale = src as f64 / dst as f64;

    (0..dst)
        .map(|d| {
            let start = d as f64 * scale;
            let end = start + scale;
            let mut weights = Vec::new();
            let mut s = start.floor() as usize;

            while (s as f64) < end && s < src {
                let lo = start.max(s as f64);
                let hi = end.min(s as f64 + 1.0);
                if hi > lo {
                    weights.push((s, ((hi - lo) / scale) as f32));
                }
                s += 1;
            }
            weights
        })
        .collect()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_otsu_splits_bimodal_image() {
        let mut pixels = vec![20u8; 50];
        pixels.extend(vec![230u8; 50]);
        let t = otsu_threshold(&pixels);
        assert!((20..230).contains(&t));

        let binary = binarize(&pixels, t);
        assert!(binary[..50].iter().all(|&p| p == 0));
        assert!(binary[50..].iter().all(|&p| p == 255));
    }

    #[test]
    fn test_otsu_constant_image() {
        assert_eq!(otsu_threshold(&[128u8; 16]), 0);
    }

    #[test]
    fn test_resize_area_averages_blocks() {
        // 4x4 → 2x2, each output pixel is the mean of a 2x2 block
        #[rustfmt::skip]
        let pixels = vec![
            0, 0, 255, 255,
            0, 0, 255, 255,
            100, 100, 50, 50,
            100, 100, 50, 50,
        ];
        let out = resize_area(&pixels, ImageShape::new(4, 4), ImageShape::new(2, 2));
        assert_eq!(out, vec![0, 255, 100, 50]);
    }

    #[test]
    fn test_resize_area_fractional_coverage() {
        // 3 columns → 2 columns: each output covers 1.5 source pixels
        let pixels = vec![0, 90, 180];
        let out = resize_area(&pixels, ImageShape::new(1, 3), ImageShape::new(1, 2));
        // (0*1 + 90*0.5)/1.5 = 30, (90*0.5 + 180*1)/1.5 = 150
        assert_eq!(out, vec![30, 150]);
    }

    #[test]
    fn test_batch_shape_matches_target() {
        let pre = ImagePreprocessor::new(
            ImageShape::new(6, 8),
            Some(ImageShape::new(3, 4)),
        )
        .unwrap();
        let images: Vec<Vec<u8>> = (0..5).map(|i| vec![i * 40; 48]).collect();
        let table = pre.process_batch(&images).unwrap();
        assert_eq!(table.nrows(), 5);
        assert_eq!(table.ncols(), 3 * 4);
    }

    #[test]
    fn test_wrong_pixel_count_is_validation_error() {
        let pre = ImagePreprocessor::new(ImageShape::new(4, 4), None).unwrap();
        let images = vec![vec![0u8; 16], vec![0u8; 15]];
        match pre.process_batch(&images) {
            Err(PipelineError::Validation(msg)) => assert!(msg.contains("image #1")),
            other => panic!("expected Validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_target_rejected() {
        assert!(ImagePreprocessor::new(ImageShape::RAW, Some(ImageShape::new(0, 10))).is_err());
    }
}
