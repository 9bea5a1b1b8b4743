// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Implements the model collaborator the experiment runner talks
// to. Two ways in:
//
//   fit          — in-memory arrays, reshuffled every epoch
//   fit_batches  — a pulled batch stream (augmented), a fixed
//                  number of steps per epoch
//
// Both end in the same per-batch step:
//   forward → CE(root) + CE(vowel) + CE(consonant) → backward → Adam
//
// Key Burn insight:
//   - Training uses B (an AutodiffBackend) for gradients
//   - model.valid() returns the model on B::InnerBackend
//   - the inner backend shares B's device type, so one
//     GraphemeBatcher serves both phases
//   - argmax(1) returns [batch,1] so we flatten before .equal()
//
// Metric names follow the head output names:
//   loss, output_root_loss, output_root_accuracy, ...
//   and the same with a val_ prefix for the held-out split.
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::{bail, Result};
use burn::{
    module::AutodiffModule,
    nn::loss::CrossEntropyLossConfig,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use ndarray::{Array2, Axis};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::domain::bundle::TargetBundle;
use crate::domain::error::PipelineError;
use crate::domain::labels::{ImageShape, LabelHead};
use crate::domain::traits::{
    Batch, EpochMetrics, EpochObserver, FitHistory, FitOptions, MultiHeadModel, Predictor,
    Validation,
};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::batcher::GraphemeBatcher;
use crate::ml::inferencer::{predict_probabilities, PREDICT_CHUNK};
use crate::ml::model::{GraphemeCnn, GraphemeCnnConfig, HeadLogits};

// ─── Running Totals ───────────────────────────────────────────────────────────
/// Sample-weighted sums over one epoch (or one validation pass).
#[derive(Debug, Default)]
struct Totals {
    loss:       f64,
    head_loss:  [f64; 3],
    correct:    [usize; 3],
    samples:    usize,
}

impl Totals {
    fn add(&mut self, stats: &StepStats) {
        let n = stats.samples as f64;
        self.loss += stats.loss * n;
        for i in 0..3 {
            self.head_loss[i] += stats.head_loss[i] * n;
            self.correct[i]   += stats.correct[i];
        }
        self.samples += stats.samples;
    }

    /// Averages under `prefix` ("" or "val_").
    fn write_into(&self, metrics: &mut EpochMetrics, prefix: &str) {
        if self.samples == 0 {
            return;
        }
        let n = self.samples as f64;
        metrics.insert(format!("{prefix}loss"), self.loss / n);
        for (i, head) in LabelHead::ALL.into_iter().enumerate() {
            let name = head.output_name();
            metrics.insert(format!("{prefix}{name}_loss"), self.head_loss[i] / n);
            metrics.insert(format!("{prefix}{name}_accuracy"), self.correct[i] as f64 / n);
        }
    }
}

/// Scalars read back from one batch.
#[derive(Debug)]
struct StepStats {
    loss:      f64,
    head_loss: [f64; 3],
    correct:   [usize; 3],
    samples:   usize,
}

/// Summed cross-entropy of the three heads plus per-head readings.
///
/// Generic over the backend so training (autodiff) and validation
/// (inner backend) share the exact same loss definition.
fn head_losses<B: Backend>(
    logits:  &HeadLogits<B>,
    targets: &[Tensor<B, 1, Int>; 3],
) -> (Tensor<B, 1>, StepStats) {
    let ce = CrossEntropyLossConfig::new().init(&logits.root.device());
    let mut total: Option<Tensor<B, 1>> = None;
    let mut head_loss = [0.0f64; 3];
    let mut correct   = [0usize; 3];

    for (i, head) in LabelHead::ALL.into_iter().enumerate() {
        let scores = logits.get(head).clone();
        let loss = ce.forward(scores.clone(), targets[i].clone());
        head_loss[i] = loss.clone().into_scalar().elem::<f64>();

        // argmax(1) returns shape [batch, 1] — flatten to [batch]
        let predicted = scores.argmax(1).flatten::<1>(0, 1);
        let hits: i64 = predicted
            .equal(targets[i].clone())
            .int().sum().into_scalar().elem::<i64>();
        correct[i] = hits as usize;

        total = Some(match total {
            Some(t) => t + loss,
            None    => loss,
        });
    }

    let samples = targets[0].dims()[0];
    let total = total.unwrap_or_else(|| Tensor::zeros([1], &logits.root.device()));
    let loss = total.clone().into_scalar().elem::<f64>();
    (total, StepStats { loss, head_loss, correct, samples })
}

/// `loss=.. | val_loss=.. | root_acc=..% | ...`
///
/// Accuracies are read from the validation split when it was scored,
/// from the training batches otherwise.
fn epoch_line(metrics: &EpochMetrics) -> String {
    let read = |key: &str| metrics.get(key).copied().unwrap_or(0.0);
    let mut parts = vec![format!("loss={:.4}", read("loss"))];
    let prefix = if metrics.contains_key("val_loss") {
        parts.push(format!("val_loss={:.4}", read("val_loss")));
        "val_"
    } else {
        ""
    };
    for head in LabelHead::ALL {
        let name = head.output_name();
        let short = name.trim_start_matches("output_");
        parts.push(format!("{short}_acc={:.1}%", read(&format!("{prefix}{name}_accuracy")) * 100.0));
    }
    parts.join(" | ")
}

// ─── BurnTrainer ──────────────────────────────────────────────────────────────
/// Owns the model and its optimizer state across every shard.
pub struct BurnTrainer<B: AutodiffBackend, O: Optimizer<GraphemeCnn<B>, B>> {
    model:         GraphemeCnn<B>,
    optim:         O,
    batcher:       GraphemeBatcher,
    device:        B::Device,
    learning_rate: f64,
    checkpoints:   Option<CheckpointManager>,
    /// Epochs trained so far, counted across all fit calls
    epochs_done:   usize,
}

/// Build a CNN from `config` and pair it with Adam.
pub fn adam_trainer<B: AutodiffBackend>(
    config:        &GraphemeCnnConfig,
    learning_rate: f64,
    device:        B::Device,
) -> Result<BurnTrainer<B, impl Optimizer<GraphemeCnn<B>, B>>> {
    let model = config.init::<B>(&device)?;
    // m = β1*m + (1-β1)*g        (mean)
    // v = β2*v + (1-β2)*g²       (variance)
    // θ = θ - lr * m / (√v + ε)  (update)
    let optim = AdamConfig::new()
        .with_epsilon(1e-8)
        .init::<B, GraphemeCnn<B>>();
    tracing::info!(
        "Model ready: {} conv blocks x {} filters, dense {}/{}",
        config.conv_blocks, config.conv_filters, config.dense1, config.dense2
    );
    BurnTrainer::new(model, optim, learning_rate, device)
}

impl<B, O> BurnTrainer<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<GraphemeCnn<B>, B>,
{
    pub fn new(model: GraphemeCnn<B>, optim: O, learning_rate: f64, device: B::Device) -> Result<Self> {
        if !(learning_rate > 0.0) {
            bail!("learning rate must be positive, got {learning_rate}");
        }
        let batcher = GraphemeBatcher::new(ImageShape::new(model.input_height, model.input_width));
        Ok(Self {
            model,
            optim,
            batcher,
            device,
            learning_rate,
            checkpoints: None,
            epochs_done: 0,
        })
    }

    /// Save weights after every epoch.
    pub fn with_checkpoints(mut self, manager: CheckpointManager) -> Self {
        self.checkpoints = Some(manager);
        self
    }

    pub fn epochs_done(&self) -> usize {
        self.epochs_done
    }

    /// Forward, backward and one Adam update on a single batch.
    fn train_step(&mut self, batch: &Batch) -> Result<StepStats> {
        let batch = self.batcher.batch::<B>(batch.images.view(), &batch.targets, &self.device)?;
        let logits = self.model.forward(batch.images);
        let (loss, stats) = head_losses(&logits, &batch.targets);

        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, &self.model);
        self.model = self.optim.step(self.learning_rate, self.model.clone(), grads);
        Ok(stats)
    }

    /// Loss and accuracy on the held-out split, dropout disabled.
    fn evaluate(&self, validation: Validation<'_>, batch_size: usize) -> Result<Totals> {
        let mut totals = Totals::default();
        if validation.images.nrows() == 0 {
            return Ok(totals);
        }

        // model.valid() → GraphemeCnn<B::InnerBackend>
        let model = self.model.valid();
        let classes = self.batcher.class_indices(validation.targets)?;
        let chunk = batch_size.max(1);

        for (index, rows) in validation.images.axis_chunks_iter(Axis(0), chunk).enumerate() {
            let start = index * chunk;
            let end = start + rows.nrows();
            let images = self.batcher.images::<B::InnerBackend>(rows, &self.device)?;
            let targets = [0, 1, 2].map(|h| {
                self.batcher.labels::<B::InnerBackend>(&classes[h][start..end], &self.device)
            });
            let logits = model.forward(images);
            let (_, stats) = head_losses(&logits, &targets);
            totals.add(&stats);
        }
        Ok(totals)
    }

    /// Close an epoch: validate, print, checkpoint, hand the metrics on.
    fn finish_epoch(
        &mut self,
        epoch:      usize,
        options:    &FitOptions,
        train:      &Totals,
        validation: Validation<'_>,
        observer:   &mut dyn EpochObserver,
    ) -> Result<EpochMetrics> {
        let val = self.evaluate(validation, options.batch_size)?;
        let mut metrics = EpochMetrics::new();
        train.write_into(&mut metrics, "");
        val.write_into(&mut metrics, "val_");
        self.epochs_done += 1;

        println!("Epoch {:>3}/{} | {}", epoch, options.epochs, epoch_line(&metrics));

        if let Some(ckpt) = &self.checkpoints {
            ckpt.save_model(&self.model, self.epochs_done)?;
            tracing::info!("Checkpoint saved for epoch {}", self.epochs_done);
        }
        observer.epoch_finished(&metrics)?;
        Ok(metrics)
    }
}

impl<B, O> Predictor for BurnTrainer<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<GraphemeCnn<B>, B>,
{
    fn predict(&self, images: &Array2<f32>) -> Result<Vec<Array2<f32>>> {
        let model = self.model.valid();
        predict_probabilities::<B::InnerBackend>(&model, &self.batcher, images, PREDICT_CHUNK, &self.device)
    }
}

impl<B, O> MultiHeadModel for BurnTrainer<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<GraphemeCnn<B>, B>,
{
    fn fit(
        &mut self,
        images:     &Array2<f32>,
        targets:    &TargetBundle,
        validation: Validation<'_>,
        options:    &FitOptions,
        observer:   &mut dyn EpochObserver,
    ) -> Result<FitHistory> {
        let n = targets.sample_count()?;
        if n != images.nrows() {
            return Err(PipelineError::ShapeMismatch {
                name: "images".to_string(),
                expected: n,
                found: images.nrows(),
            }
            .into());
        }
        if options.batch_size == 0 {
            bail!("batch size must be positive");
        }

        let mut order: Vec<usize> = (0..n).collect();
        let mut history = FitHistory::default();

        for epoch in 1..=options.epochs {
            let mut rng = StdRng::seed_from_u64(options.seed.wrapping_add(epoch as u64));
            order.shuffle(&mut rng);

            let mut totals = Totals::default();
            for indices in order.chunks(options.batch_size) {
                let mut batch_targets = TargetBundle::new();
                for (name, labels) in targets.iter() {
                    batch_targets.insert(name, labels.select(Axis(0), indices));
                }
                let batch = Batch {
                    images: images.select(Axis(0), indices),
                    targets: batch_targets,
                };
                totals.add(&self.train_step(&batch)?);
            }

            history.epochs.push(self.finish_epoch(epoch, options, &totals, validation, observer)?);
        }
        Ok(history)
    }

    fn fit_batches(
        &mut self,
        batches:         &mut dyn Iterator<Item = std::result::Result<Batch, PipelineError>>,
        steps_per_epoch: usize,
        validation:      Validation<'_>,
        options:         &FitOptions,
        observer:        &mut dyn EpochObserver,
    ) -> Result<FitHistory> {
        if steps_per_epoch == 0 {
            return Err(PipelineError::Validation("steps_per_epoch must be positive".to_string()).into());
        }

        let mut history = FitHistory::default();
        for epoch in 1..=options.epochs {
            let mut totals = Totals::default();
            for step in 0..steps_per_epoch {
                let Some(batch) = batches.next() else {
                    tracing::warn!(
                        "Batch stream ended at epoch {} step {}; stopping early",
                        epoch, step
                    );
                    return Ok(history);
                };
                totals.add(&self.train_step(&batch?)?);
            }
            history.epochs.push(self.finish_epoch(epoch, options, &totals, validation, observer)?);
        }
        Ok(history)
    }
}
