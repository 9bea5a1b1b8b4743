// ============================================================
// Layer 4 — Single-Target Image Augmenter
// ============================================================
// Streams randomly rotated and shifted mini-batches of images
// together with ONE aligned label array.
//
// Random transform per image (parameters drawn independently):
//   θ  ~ U(-rotation_range, rotation_range) degrees
//   tr ~ U(-height_shift_range, height_shift_range) × height
//   tc ~ U(-width_shift_range,  width_shift_range)  × width
//
// Each output pixel is pulled from the source through the
// inverse mapping
//
//   src = R(θ) · (dst − centre) + centre + (tr, tc)
//
// with bilinear interpolation; coordinates outside the image
// are clamped to the nearest edge pixel.
//
// Labels are never transformed: every label row travels with
// the image row it was selected with, in the same batch slot.
//
// Batching follows epoch semantics: the sample order is
// reshuffled at the start of every epoch, an epoch yields
// ceil(n / batch_size) batches (the last one may be short),
// and the stream never ends on its own.

use std::path::PathBuf;

use ndarray::{Array1, Array2, ArrayView1, Axis, CowArray, Ix2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::domain::error::{PipelineError, Result};
use crate::domain::labels::ImageShape;

/// Augmentation ranges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AugmentConfig {
    /// Maximum rotation in degrees, either direction
    pub rotation_range: f32,
    /// Maximum horizontal shift as a fraction of the width
    pub width_shift_range: f32,
    /// Maximum vertical shift as a fraction of the height
    pub height_shift_range: f32,
}

impl Default for AugmentConfig {
    fn default() -> Self {
        Self {
            rotation_range: 10.0,
            width_shift_range: 0.2,
            height_shift_range: 0.2,
        }
    }
}

impl AugmentConfig {
    /// No rotation, no shift: images pass through unchanged
    #[cfg(test)]
    pub fn identity() -> Self {
        Self {
            rotation_range: 0.0,
            width_shift_range: 0.0,
            height_shift_range: 0.0,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let ranges = [
            ("rotation_range", self.rotation_range),
            ("width_shift_range", self.width_shift_range),
            ("height_shift_range", self.height_shift_range),
        ];
        for (name, value) in ranges {
            if !value.is_finite() || value < 0.0 {
                return Err(PipelineError::Validation(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Where augmented samples are written when previewing a stream.
#[derive(Debug, Clone)]
struct SaveOptions {
    dir: PathBuf,
    prefix: String,
}

/// Applies random rotation/shift to flattened images of one shape.
#[derive(Debug, Clone)]
pub struct ImageAugmenter {
    config: AugmentConfig,
    shape: ImageShape,
    save: Option<SaveOptions>,
}

impl ImageAugmenter {
    pub fn new(config: AugmentConfig, shape: ImageShape) -> Result<Self> {
        config.validate()?;
        if shape.pixels() == 0 {
            return Err(PipelineError::Validation(format!(
                "image shape {shape} has a zero dimension"
            )));
        }
        Ok(Self {
            config,
            shape,
            save: None,
        })
    }

    /// Also write every augmented image as `<prefix>_<epoch>_<batch>_<slot>.png` in `dir`.
    pub fn save_to_dir(mut self, dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        self.save = Some(SaveOptions {
            dir: dir.into(),
            prefix: prefix.into(),
        });
        self
    }

    /// Draw transform parameters and apply them to one flattened image.
    pub fn random_transform<R: Rng>(&self, image: ArrayView1<'_, f32>, rng: &mut R) -> Array1<f32> {
        let cfg = &self.config;
        let theta = rng
            .gen_range(-cfg.rotation_range..=cfg.rotation_range)
            .to_radians();
        let shift_r = rng.gen_range(-cfg.height_shift_range..=cfg.height_shift_range)
            * self.shape.height as f32;
        let shift_c = rng.gen_range(-cfg.width_shift_range..=cfg.width_shift_range)
            * self.shape.width as f32;

        self.apply_transform(image, theta, shift_r, shift_c)
    }

    /// Rotate by `theta` radians about the centre, then shift by (rows, cols).
    pub fn apply_transform(
        &self,
        image: ArrayView1<'_, f32>,
        theta: f32,
        shift_r: f32,
        shift_c: f32,
    ) -> Array1<f32> {
        if theta == 0.0 && shift_r == 0.0 && shift_c == 0.0 {
            return image.to_owned();
        }

        let (h, w) = (self.shape.height, self.shape.width);
        let (cy, cx) = ((h as f32 - 1.0) / 2.0, (w as f32 - 1.0) / 2.0);
        let (sin, cos) = theta.sin_cos();

        let mut out = Array1::<f32>::zeros(h * w);
        for r in 0..h {
            for c in 0..w {
                let dy = r as f32 - cy;
                let dx = c as f32 - cx;
                let src_r = cos * dy - sin * dx + cy + shift_r;
                let src_c = sin * dy + cos * dx + cx + shift_c;
                out[r * w + c] = sample_bilinear(image, self.shape, src_r, src_c);
            }
        }
        out
    }

    /// Endless stream of (image batch, label batch).
    ///
    /// `labels` may be borrowed or owned; its rows are selected with the
    /// same indices as the images and returned untouched.
    pub fn flow<'a>(
        &'a self,
        images: &'a Array2<f32>,
        labels: impl Into<CowArray<'a, f32, Ix2>>,
        batch_size: usize,
        shuffle: bool,
        seed: u64,
    ) -> Result<Flow<'a>> {
        let labels = labels.into();

        if images.ncols() != self.shape.pixels() {
            return Err(PipelineError::Validation(format!(
                "images have {} columns, expected {} for {}",
                images.ncols(),
                self.shape.pixels(),
                self.shape
            )));
        }
        if labels.nrows() != images.nrows() {
            return Err(PipelineError::ShapeMismatch {
                name: "labels".to_string(),
                expected: images.nrows(),
                found: labels.nrows(),
            });
        }
        if images.nrows() == 0 {
            return Err(PipelineError::Validation("cannot stream an empty array".to_string()));
        }
        if batch_size == 0 {
            return Err(PipelineError::Validation("batch size must be positive".to_string()));
        }

        let mut flow = Flow {
            augmenter: self,
            images,
            labels,
            batch_size,
            shuffle,
            seed,
            rng: StdRng::seed_from_u64(seed),
            order: Vec::new(),
            cursor: 0,
            epoch: 0,
            batch_in_epoch: 0,
            drop_last: false,
        };
        flow.start_epoch();
        Ok(flow)
    }
}

/// Bilinear sample at a fractional position, clamping to the edges.
fn sample_bilinear(image: ArrayView1<'_, f32>, shape: ImageShape, r: f32, c: f32) -> f32 {
    let (h, w) = (shape.height, shape.width);
    let r = r.clamp(0.0, (h - 1) as f32);
    let c = c.clamp(0.0, (w - 1) as f32);

    let r0 = r.floor() as usize;
    let c0 = c.floor() as usize;
    let r1 = (r0 + 1).min(h - 1);
    let c1 = (c0 + 1).min(w - 1);
    let fr = r - r0 as f32;
    let fc = c - c0 as f32;

    let top = image[r0 * w + c0] * (1.0 - fc) + image[r0 * w + c1] * fc;
    let bottom = image[r1 * w + c0] * (1.0 - fc) + image[r1 * w + c1] * fc;
    top * (1.0 - fr) + bottom * fr
}

// ─── Flow ─────────────────────────────────────────────────────────────────────
/// Lazy batch stream produced by [`ImageAugmenter::flow`].
pub struct Flow<'a> {
    augmenter: &'a ImageAugmenter,
    images: &'a Array2<f32>,
    labels: CowArray<'a, f32, Ix2>,
    batch_size: usize,
    shuffle: bool,
    seed: u64,
    rng: StdRng,
    order: Vec<usize>,
    cursor: usize,
    epoch: usize,
    batch_in_epoch: usize,
    drop_last: bool,
}

impl<'a> Flow<'a> {
    fn start_epoch(&mut self) {
        self.order = (0..self.images.nrows()).collect();
        if self.shuffle {
            self.order.shuffle(&mut self.rng);
        }
        self.cursor = 0;
        self.batch_in_epoch = 0;
    }

    /// End every pass after the last full batch. The leftover samples of a
    /// pass are skipped; they may land in a full batch after the next shuffle.
    pub fn drop_last(mut self) -> Self {
        self.drop_last = true;
        self
    }

    /// Rewind to the state right after construction.
    #[cfg(test)]
    pub fn reset(&mut self) {
        self.rng = StdRng::seed_from_u64(self.seed);
        self.epoch = 0;
        self.start_epoch();
    }

    /// Batches in one pass: the short final batch counts unless dropped
    pub fn batches_per_epoch(&self) -> usize {
        if self.drop_last {
            self.images.nrows() / self.batch_size
        } else {
            self.images.nrows().div_ceil(self.batch_size)
        }
    }

    fn save_batch(&self, images: &Array2<f32>) {
        let Some(save) = &self.augmenter.save else {
            return;
        };
        let shape = self.augmenter.shape;

        for (slot, row) in images.outer_iter().enumerate() {
            let (lo, hi) = row
                .iter()
                .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
            let span = if hi > lo { hi - lo } else { 1.0 };
            let bytes: Vec<u8> = row
                .iter()
                .map(|&v| ((v - lo) / span * 255.0).round() as u8)
                .collect();

            let path = save.dir.join(format!(
                "{}_{}_{}_{}.png",
                save.prefix, self.epoch, self.batch_in_epoch, slot
            ));
            let written = image::GrayImage::from_raw(shape.width as u32, shape.height as u32, bytes)
                .map(|img| img.save(&path));
            match written {
                Some(Ok(())) => tracing::debug!("Saved augmented sample '{}'", path.display()),
                Some(Err(e)) => tracing::warn!("Cannot save '{}': {}", path.display(), e),
                None => tracing::warn!("Augmented sample does not fit {}", shape),
            }
        }
    }
}

impl<'a> Iterator for Flow<'a> {
    type Item = (Array2<f32>, Array2<f32>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.drop_last && self.order.len() < self.batch_size {
            return None;
        }
        let remaining = self.order.len() - self.cursor;
        if remaining == 0 || (self.drop_last && remaining < self.batch_size) {
            self.epoch += 1;
            self.start_epoch();
        }

        let end = (self.cursor + self.batch_size).min(self.order.len());
        let indices: Vec<usize> = self.order[self.cursor..end].to_vec();
        self.cursor = end;

        let mut images = Array2::<f32>::zeros((indices.len(), self.images.ncols()));
        for (slot, &src) in indices.iter().enumerate() {
            let transformed = self
                .augmenter
                .random_transform(self.images.row(src), &mut self.rng);
            images.row_mut(slot).assign(&transformed);
        }
        let labels = self.labels.select(Axis(0), &indices);

        self.save_batch(&images);
        self.batch_in_epoch += 1;

        Some((images, labels))
    }
}
