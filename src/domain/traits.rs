// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The experiment runner is written against these traits only:
//
//   Predictor       → anything that maps images to per-head
//                     probabilities (trained model, checkpoint)
//   MultiHeadModel  → a Predictor that can also be fitted on
//                     in-memory arrays or on a batch stream
//   EpochObserver   → hears about every epoch the moment it
//                     closes, before the fit call returns
//   MetricsSink     → append-only experiment tracking store
//
// The burn CNN implements the model traits in the ml layer and
// the file-backed run tracker implements MetricsSink in infra.
// Tests swap in small fakes.

use std::collections::BTreeMap;

use anyhow::Result;
use ndarray::Array2;

use crate::domain::bundle::TargetBundle;
use crate::domain::error::PipelineError;

// ─── Batch ────────────────────────────────────────────────────────────────────
/// One mini-batch: flattened images plus the synchronized per-head labels.
#[derive(Debug, Clone)]
pub struct Batch {
    /// Shape: [batch_size, height * width]
    pub images: Array2<f32>,
    pub targets: TargetBundle,
}

/// Features and labels held out for validation after each epoch.
#[derive(Debug, Clone, Copy)]
pub struct Validation<'a> {
    pub images: &'a Array2<f32>,
    pub targets: &'a TargetBundle,
}

/// Settings shared by both fit entry points.
#[derive(Debug, Clone)]
pub struct FitOptions {
    pub epochs: usize,
    pub batch_size: usize,
    /// Seeds the per-epoch shuffle of in-memory fitting
    pub seed: u64,
}

/// Metrics recorded for one epoch, keyed the way the tracker stores them
/// (`loss`, `output_root_accuracy`, `val_loss`, ...).
pub type EpochMetrics = BTreeMap<String, f64>;

/// Per-epoch metrics of one fit call, oldest first.
#[derive(Debug, Clone, Default)]
pub struct FitHistory {
    pub epochs: Vec<EpochMetrics>,
}

impl FitHistory {
    pub fn last(&self) -> Option<&EpochMetrics> {
        self.epochs.last()
    }
}

// ─── EpochObserver ────────────────────────────────────────────────────────────
/// Called once per finished epoch, in order. An error aborts the fit.
pub trait EpochObserver {
    fn epoch_finished(&mut self, metrics: &EpochMetrics) -> Result<()>;
}

/// Collecting into a history is the plain in-memory observer.
impl EpochObserver for FitHistory {
    fn epoch_finished(&mut self, metrics: &EpochMetrics) -> Result<()> {
        self.epochs.push(metrics.clone());
        Ok(())
    }
}

// ─── Predictor ────────────────────────────────────────────────────────────────
/// Maps a batch of flattened images to one probability array per head,
/// in model head order (root, vowel, consonant).
pub trait Predictor {
    fn predict(&self, images: &Array2<f32>) -> Result<Vec<Array2<f32>>>;
}

// ─── MultiHeadModel ───────────────────────────────────────────────────────────
/// A trainable multi-head classifier.
pub trait MultiHeadModel: Predictor {
    /// Fit directly on in-memory arrays. Every sample is used each epoch.
    fn fit(
        &mut self,
        images: &Array2<f32>,
        targets: &TargetBundle,
        validation: Validation<'_>,
        options: &FitOptions,
        observer: &mut dyn EpochObserver,
    ) -> Result<FitHistory>;

    /// Fit by pulling `steps_per_epoch` batches per epoch from a lazy stream.
    fn fit_batches(
        &mut self,
        batches: &mut dyn Iterator<Item = std::result::Result<Batch, PipelineError>>,
        steps_per_epoch: usize,
        validation: Validation<'_>,
        options: &FitOptions,
        observer: &mut dyn EpochObserver,
    ) -> Result<FitHistory>;
}

// ─── MetricsSink ──────────────────────────────────────────────────────────────
/// Append-only experiment tracking store.
pub trait MetricsSink {
    /// Record a run parameter. Parameters are written once.
    fn log_param(&mut self, key: &str, value: &str) -> Result<()>;

    /// Append one metric observation at the given step.
    fn log_metric(&mut self, key: &str, value: f64, step: usize) -> Result<()>;
}
