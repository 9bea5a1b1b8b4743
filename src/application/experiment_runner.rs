// ============================================================
// Layer 2 — Experiment Runner
// ============================================================
// Drives training across every shard of the corpus:
//
//   for each shard i:
//     Step 1: load + split   train_image_data_{i}.parquet
//     Step 2a: augment on →  MultiOutputGenerator stream,
//                            steps = floor(n_train / batch_size)
//     Step 2b: augment off → fit on the in-memory arrays
//     Step 3: each epoch's metrics go to the sink as it closes
//     Step 4: shard arrays are dropped at the end of the call
//
// All shard-local arrays live inside `run_shard`, so they are
// released when it returns, whether it succeeded or failed.
// At most one shard is resident at a time.
//
// A failing shard is recorded in the outcome list and the run
// moves on to the next shard.
//
// Step-count truncation: with augmentation on, the samples left
// over after the last full batch are not trained on for that
// epoch. 402 samples at batch size 100 → 4 steps. The stream
// drops its short batch too, so one epoch is one full pass.
//
// Metric steps count epochs across the whole run, matching the
// checkpoint numbering. Epochs finished before a shard fails
// stay logged and keep their step.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::data::{
    augmenter::{AugmentConfig, ImageAugmenter},
    generator::MultiOutputGenerator,
    labels::LabelTable,
    loader::{shard_path, LoaderConfig, ShardLoader},
    preprocessor::ImagePreprocessor,
};
use crate::domain::labels::ImageShape;
use crate::domain::traits::{
    EpochMetrics, EpochObserver, FitHistory, FitOptions, MetricsSink, MultiHeadModel, Validation,
};
use crate::ml::model::GraphemeCnnConfig;

/// Added to a shard's seed to drive its augmentation stream,
/// so split and augmentation never share a random sequence.
pub const AUGMENT_SEED_OFFSET: u64 = 0x5eed_a06d;

// ─── Experiment Configuration ────────────────────────────────────────────────
// Everything a training run needs, serialisable so it can be
// saved next to the checkpoints and reloaded by `submit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub experiment_name:     String,
    pub data_dir:            String,
    pub labels_csv:          String,
    pub n_shards:            usize,
    pub batch_size:          usize,
    pub epochs:              usize,
    pub lr:                  f64,
    pub augment:             bool,
    pub augmentation:        AugmentConfig,
    /// Write augmented samples as PNG here, if set
    pub augment_save_dir:    Option<String>,
    pub source_height:       usize,
    pub source_width:        usize,
    pub resize:              bool,
    pub target_height:       usize,
    pub target_width:        usize,
    pub normalize:           bool,
    pub validation_fraction: f64,
    pub seed:                u64,
    pub read_batch_rows:     usize,
    pub tracking_dir:        String,
    pub checkpoint_dir:      String,
    pub model:               GraphemeCnnConfig,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            experiment_name:     "grapheme_cnn".to_string(),
            data_dir:            "data".to_string(),
            labels_csv:          "data/train.csv".to_string(),
            n_shards:            4,
            batch_size:          100,
            epochs:              5,
            lr:                  1e-3,
            augment:             false,
            augmentation:        AugmentConfig::default(),
            augment_save_dir:    None,
            source_height:       ImageShape::RAW.height,
            source_width:        ImageShape::RAW.width,
            resize:              true,
            target_height:       68,
            target_width:        118,
            normalize:           true,
            validation_fraction: 0.1,
            seed:                42,
            read_batch_rows:     1024,
            tracking_dir:        "runs".to_string(),
            checkpoint_dir:      "checkpoints".to_string(),
            model:               GraphemeCnnConfig::new(),
        }
    }
}

impl ExperimentConfig {
    pub fn input_shape(&self) -> ImageShape {
        ImageShape::new(self.source_height, self.source_width)
    }

    /// Shape of the images the model sees
    pub fn output_shape(&self) -> ImageShape {
        if self.resize {
            ImageShape::new(self.target_height, self.target_width)
        } else {
            self.input_shape()
        }
    }

    /// Point the CNN input at the preprocessed image shape.
    pub fn sync_model_input(mut self) -> Self {
        let shape = self.output_shape();
        self.model.input_height = shape.height;
        self.model.input_width  = shape.width;
        self
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.experiment_name.trim().is_empty(), "experiment name must not be empty");
        anyhow::ensure!(self.batch_size > 0, "batch size must be positive");
        anyhow::ensure!(self.epochs > 0, "epochs must be positive");
        anyhow::ensure!(self.lr > 0.0, "learning rate must be positive, got {}", self.lr);
        anyhow::ensure!(self.read_batch_rows > 0, "read batch rows must be positive");
        anyhow::ensure!(
            (0.0..1.0).contains(&self.validation_fraction),
            "validation fraction {} must be in [0, 1)",
            self.validation_fraction
        );
        self.augmentation.validate()?;
        self.preprocessor()?;

        let shape = self.output_shape();
        anyhow::ensure!(
            self.model.input_height == shape.height && self.model.input_width == shape.width,
            "model input {}x{} does not match preprocessed images {}",
            self.model.input_height,
            self.model.input_width,
            shape
        );
        self.model.flattened_features()?;
        Ok(())
    }

    pub fn preprocessor(&self) -> Result<ImagePreprocessor> {
        let target = self.resize.then(|| ImageShape::new(self.target_height, self.target_width));
        Ok(ImagePreprocessor::new(self.input_shape(), target)?)
    }

    pub fn loader_config(&self) -> Result<LoaderConfig> {
        Ok(LoaderConfig {
            preprocessor: self.preprocessor()?,
            normalize: self.normalize,
            validation_fraction: self.validation_fraction,
            read_batch_rows: self.read_batch_rows,
        })
    }

    /// Split seed of shard `index`
    pub fn shard_seed(&self, index: usize) -> u64 {
        self.seed.wrapping_add(index as u64)
    }

    /// Augmentation seed of shard `index`
    pub fn augment_seed(&self, index: usize) -> u64 {
        self.shard_seed(index).wrapping_add(AUGMENT_SEED_OFFSET)
    }

    pub fn train_shard(&self, index: usize) -> PathBuf {
        shard_path(Path::new(&self.data_dir), "train", index)
    }

    /// Flat key/value view for the run tracker.
    pub fn params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("n_shards",            self.n_shards.to_string()),
            ("batch_size",          self.batch_size.to_string()),
            ("epochs",              self.epochs.to_string()),
            ("lr",                  self.lr.to_string()),
            ("augment",             self.augment.to_string()),
            ("rotation_range",      self.augmentation.rotation_range.to_string()),
            ("width_shift_range",   self.augmentation.width_shift_range.to_string()),
            ("height_shift_range",  self.augmentation.height_shift_range.to_string()),
            ("image_shape",         self.output_shape().to_string()),
            ("normalize",           self.normalize.to_string()),
            ("validation_fraction", self.validation_fraction.to_string()),
            ("seed",                self.seed.to_string()),
            ("conv_blocks",         self.model.conv_blocks.to_string()),
            ("conv_filters",        self.model.conv_filters.to_string()),
            ("kernel_size",         self.model.kernel_size.to_string()),
            ("pool_size",           self.model.pool_size.to_string()),
            ("dense1",              self.model.dense1.to_string()),
            ("dense2",              self.model.dense2.to_string()),
        ]
    }
}

/// Optimisation steps per epoch when training from a batch stream.
/// Remainder samples beyond the last full batch are dropped.
pub fn steps_per_epoch(n_train: usize, batch_size: usize) -> usize {
    n_train.checked_div(batch_size).unwrap_or(0)
}

// ─── Shard Outcomes ───────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct ShardReport {
    pub n_train: usize,
    pub n_val: usize,
    /// Some when trained from the augmented stream
    pub steps_per_epoch: Option<usize>,
    pub history: FitHistory,
}

#[derive(Debug, Clone)]
pub enum ShardStatus {
    Completed(ShardReport),
    /// Nothing to train on, e.g. fewer samples than one batch
    Skipped(String),
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct ShardOutcome {
    pub index: usize,
    pub path: PathBuf,
    pub status: ShardStatus,
}

impl ShardOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self.status, ShardStatus::Failed(_))
    }
}

// ─── EpochLogger ──────────────────────────────────────────────────────────────
/// Forwards each finished epoch to the sink under the next run-wide step.
struct EpochLogger<'s, S: MetricsSink> {
    sink: &'s mut S,
    epochs_logged: &'s mut usize,
}

impl<S: MetricsSink> EpochObserver for EpochLogger<'_, S> {
    fn epoch_finished(&mut self, metrics: &EpochMetrics) -> Result<()> {
        *self.epochs_logged += 1;
        for (key, value) in metrics {
            self.sink.log_metric(key, *value, *self.epochs_logged)?;
        }
        Ok(())
    }
}

// ─── ExperimentRunner ─────────────────────────────────────────────────────────
pub struct ExperimentRunner<'a> {
    config: &'a ExperimentConfig,
    labels: &'a LabelTable,
    loader: LoaderConfig,
}

impl<'a> ExperimentRunner<'a> {
    pub fn new(config: &'a ExperimentConfig, labels: &'a LabelTable) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, labels, loader: config.loader_config()? })
    }

    /// Train `model` on every shard in order, logging to `sink`.
    pub fn run<M, S>(&self, model: &mut M, sink: &mut S) -> Result<Vec<ShardOutcome>>
    where
        M: MultiHeadModel,
        S: MetricsSink,
    {
        for (key, value) in self.config.params() {
            sink.log_param(key, &value)?;
        }

        let mut outcomes = Vec::with_capacity(self.config.n_shards);
        let mut epochs_logged = 0usize;

        for index in 0..self.config.n_shards {
            let path = self.config.train_shard(index);
            tracing::info!("Shard {}/{}: '{}'", index + 1, self.config.n_shards, path.display());

            let status = match self.run_shard(index, &path, model, sink, &mut epochs_logged) {
                Ok(status) => status,
                Err(e) => {
                    tracing::warn!("Shard {} failed: {:#}", index, e);
                    ShardStatus::Failed(format!("{e:#}"))
                }
            };
            outcomes.push(ShardOutcome { index, path, status });
        }

        let failed = outcomes.iter().filter(|o| o.is_failed()).count();
        tracing::info!(
            "Experiment '{}' done: {} shards, {} failed",
            self.config.experiment_name,
            outcomes.len(),
            failed
        );
        Ok(outcomes)
    }

    /// Load, train and log one shard. Every array is dropped on return.
    fn run_shard<M, S>(
        &self,
        index: usize,
        path: &Path,
        model: &mut M,
        sink: &mut S,
        epochs_logged: &mut usize,
    ) -> Result<ShardStatus>
    where
        M: MultiHeadModel,
        S: MetricsSink,
    {
        let cfg = self.config;

        // ── Step 1: load and split ────────────────────────────────────────────
        let split = ShardLoader::new(self.labels, &self.loader)
            .load(path, cfg.shard_seed(index))
            .with_context(|| format!("Cannot load shard '{}'", path.display()))?;
        let (n_train, n_val) = (split.n_train(), split.n_val());
        let (x_train, x_val, y_train, y_val) = split.into_parts();

        if n_train == 0 {
            tracing::warn!("Shard {} has no training samples, skipping", index);
            return Ok(ShardStatus::Skipped("no training samples".to_string()));
        }

        let validation = Validation { images: &x_val, targets: &y_val };
        let options = FitOptions {
            epochs: cfg.epochs,
            batch_size: cfg.batch_size,
            seed: cfg.shard_seed(index),
        };
        let mut logger = EpochLogger { sink, epochs_logged };

        // ── Step 2: fit ───────────────────────────────────────────────────────
        let (history, steps) = if cfg.augment {
            let steps = steps_per_epoch(n_train, cfg.batch_size);
            if steps == 0 {
                tracing::warn!(
                    "Shard {}: {} samples < batch size {}, skipping",
                    index, n_train, cfg.batch_size
                );
                return Ok(ShardStatus::Skipped(format!(
                    "{n_train} training samples is less than one batch of {}",
                    cfg.batch_size
                )));
            }

            let mut augmenter = ImageAugmenter::new(cfg.augmentation, cfg.output_shape())?;
            if let Some(dir) = &cfg.augment_save_dir {
                augmenter = augmenter.save_to_dir(dir, format!("shard{index}"));
            }
            let generator = MultiOutputGenerator::new(&augmenter);
            let mut flow = generator
                .flow(&x_train, &y_train, cfg.batch_size, true, cfg.augment_seed(index))?
                .drop_last();
            debug_assert_eq!(flow.batches_per_epoch(), steps);

            tracing::info!("Training shard {} on augmented stream: {} steps/epoch", index, steps);
            let history = model.fit_batches(&mut flow, steps, validation, &options, &mut logger)?;
            (history, Some(steps))
        } else {
            tracing::info!("Training shard {} on {} in-memory samples", index, n_train);
            (model.fit(&x_train, &y_train, validation, &options, &mut logger)?, None)
        };

        Ok(ShardStatus::Completed(ShardReport {
            n_train,
            n_val,
            steps_per_epoch: steps,
            history,
        }))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::tests::{sample_pixels, write_archive, SHAPE};
    use crate::domain::bundle::TargetBundle;
    use crate::domain::error::PipelineError;
    use crate::domain::labels::{LabelHead, LabelTriple};
    use crate::domain::traits::{Batch, EpochMetrics, Predictor};
    use ndarray::Array2;

    // ── Fakes ─────────────────────────────────────────────────────────────────
    #[derive(Default)]
    struct FakeModel {
        /// (train rows, validation rows) per fit call
        fits: Vec<(usize, usize)>,
        /// batch row counts per fit_batches call
        streams: Vec<Vec<usize>>,
        first_batches: Vec<Array2<f32>>,
        /// Fail every fit call once this many of its epochs have finished
        fail_after: Option<usize>,
    }

    impl FakeModel {
        fn close_epoch(
            &self,
            epoch: usize,
            history: &mut FitHistory,
            observer: &mut dyn EpochObserver,
        ) -> Result<()> {
            if self.fail_after == Some(epoch) {
                anyhow::bail!("device lost in epoch {}", epoch + 1);
            }
            let mut m = EpochMetrics::new();
            m.insert("val_output_root_accuracy".to_string(), 0.1 * (epoch + 1) as f64);
            observer.epoch_finished(&m)?;
            history.epochs.push(m);
            Ok(())
        }
    }

    impl Predictor for FakeModel {
        fn predict(&self, _images: &Array2<f32>) -> Result<Vec<Array2<f32>>> {
            Ok(Vec::new())
        }
    }

    impl MultiHeadModel for FakeModel {
        fn fit(
            &mut self,
            images: &Array2<f32>,
            targets: &TargetBundle,
            validation: Validation<'_>,
            options: &FitOptions,
            observer: &mut dyn EpochObserver,
        ) -> Result<FitHistory> {
            assert_eq!(targets.sample_count()?, images.nrows());
            self.fits.push((images.nrows(), validation.images.nrows()));
            let mut history = FitHistory::default();
            for epoch in 0..options.epochs {
                self.close_epoch(epoch, &mut history, observer)?;
            }
            Ok(history)
        }

        fn fit_batches(
            &mut self,
            batches: &mut dyn Iterator<Item = std::result::Result<Batch, PipelineError>>,
            steps_per_epoch: usize,
            _validation: Validation<'_>,
            options: &FitOptions,
            observer: &mut dyn EpochObserver,
        ) -> Result<FitHistory> {
            let mut sizes = Vec::new();
            let mut history = FitHistory::default();
            for epoch in 0..options.epochs {
                for step in 0..steps_per_epoch {
                    let batch = batches.next().expect("stream is endless")?;
                    assert_eq!(
                        batch.targets.names(),
                        LabelHead::ALL.map(|h| h.output_name()).to_vec()
                    );
                    if epoch == 0 && step == 0 {
                        self.first_batches.push(batch.images.clone());
                    }
                    sizes.push(batch.images.nrows());
                }
                self.close_epoch(epoch, &mut history, observer)?;
            }
            self.streams.push(sizes);
            Ok(history)
        }
    }

    #[derive(Default)]
    struct MemorySink {
        params: Vec<(String, String)>,
        metrics: Vec<(String, f64, usize)>,
    }

    impl MetricsSink for MemorySink {
        fn log_param(&mut self, key: &str, value: &str) -> Result<()> {
            self.params.push((key.to_string(), value.to_string()));
            Ok(())
        }

        fn log_metric(&mut self, key: &str, value: f64, step: usize) -> Result<()> {
            self.metrics.push((key.to_string(), value, step));
            Ok(())
        }
    }

    // ── Fixtures ──────────────────────────────────────────────────────────────
    /// Writes `shards` archives of `rows` images each and a label table covering them.
    fn corpus(shards: usize, rows: usize) -> (tempfile::TempDir, LabelTable) {
        let dir = tempfile::tempdir().unwrap();
        let mut pairs = Vec::new();
        for s in 0..shards {
            let ids: Vec<String> = (0..rows).map(|k| format!("Train_{s}_{k}")).collect();
            let images: Vec<Vec<u8>> = (0..rows).map(|k| sample_pixels(k + 1)).collect();
            write_archive(&shard_path(dir.path(), "train", s), &ids, &images);
            pairs.extend(ids.into_iter().map(|id| (id, LabelTriple::new(1, 2, 3))));
        }
        (dir, LabelTable::from_pairs(pairs).unwrap())
    }

    fn config(dir: &Path, n_shards: usize) -> ExperimentConfig {
        ExperimentConfig {
            data_dir: dir.to_string_lossy().into_owned(),
            n_shards,
            batch_size: 4,
            epochs: 2,
            source_height: SHAPE.height,
            source_width: SHAPE.width,
            resize: false,
            read_batch_rows: 7,
            model: GraphemeCnnConfig::new().with_conv_blocks(1),
            ..ExperimentConfig::default()
        }
        .sync_model_input()
    }

    // ── Tests ─────────────────────────────────────────────────────────────────
    #[test]
    fn test_steps_per_epoch_truncates() {
        assert_eq!(steps_per_epoch(402, 100), 4);
        assert_eq!(steps_per_epoch(100, 100), 1);
        assert_eq!(steps_per_epoch(100, 101), 0);
        assert_eq!(steps_per_epoch(10, 0), 0);
    }

    #[test]
    fn test_direct_fit_on_every_shard() {
        let (dir, labels) = corpus(2, 20);
        let cfg = config(dir.path(), 2);
        let runner = ExperimentRunner::new(&cfg, &labels).unwrap();
        let (mut model, mut sink) = (FakeModel::default(), MemorySink::default());

        let outcomes = runner.run(&mut model, &mut sink).unwrap();
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| matches!(o.status, ShardStatus::Completed(_))));
        assert_eq!(model.fits, vec![(18, 2), (18, 2)]);
        assert!(model.streams.is_empty());

        // 2 shards x 2 epochs, steps keep counting across shards
        let steps: Vec<usize> = sink.metrics.iter().map(|m| m.2).collect();
        assert_eq!(steps, vec![1, 2, 3, 4]);
        assert!(sink.params.iter().any(|(k, v)| k == "batch_size" && v == "4"));
    }

    #[test]
    fn test_augmented_stream_uses_floor_steps() {
        let (dir, labels) = corpus(1, 20);
        let mut cfg = config(dir.path(), 1);
        cfg.augment = true;
        let runner = ExperimentRunner::new(&cfg, &labels).unwrap();
        let (mut model, mut sink) = (FakeModel::default(), MemorySink::default());

        let outcomes = runner.run(&mut model, &mut sink).unwrap();
        match &outcomes[0].status {
            // 18 train samples / batch 4 → 4 steps, 2 samples left out
            ShardStatus::Completed(report) => assert_eq!(report.steps_per_epoch, Some(4)),
            other => panic!("unexpected status {other:?}"),
        }
        // 8 pulls over 2 epochs, every one a full batch
        assert_eq!(model.streams[0], vec![4; 8]);
        assert!(model.fits.is_empty());
    }

    #[test]
    fn test_epochs_before_a_failure_stay_logged() {
        let (dir, labels) = corpus(2, 20);
        let cfg = config(dir.path(), 2);
        let runner = ExperimentRunner::new(&cfg, &labels).unwrap();
        let mut model = FakeModel { fail_after: Some(1), ..FakeModel::default() };
        let mut sink = MemorySink::default();

        let outcomes = runner.run(&mut model, &mut sink).unwrap();
        assert!(outcomes.iter().all(|o| o.is_failed()));
        match &outcomes[0].status {
            ShardStatus::Failed(msg) => assert!(msg.contains("epoch 2"), "{msg}"),
            other => panic!("expected failure, got {other:?}"),
        }

        // epoch 1 of each shard survived, and the second shard kept counting
        let logged: Vec<(f64, usize)> = sink.metrics.iter().map(|m| (m.1, m.2)).collect();
        assert_eq!(logged, vec![(0.1, 1), (0.1, 2)]);
    }

    #[test]
    fn test_failed_shard_does_not_stop_the_run() {
        // shard 1 is never written
        let (dir, labels) = corpus(1, 20);
        let cfg = ExperimentConfig { n_shards: 3, ..config(dir.path(), 1) };
        let ids: Vec<String> = (0..10).map(|k| format!("Train_0_{k}")).collect();
        let images: Vec<Vec<u8>> = (0..10).map(|k| sample_pixels(k + 1)).collect();
        write_archive(&shard_path(dir.path(), "train", 2), &ids, &images);
        let runner = ExperimentRunner::new(&cfg, &labels).unwrap();
        let (mut model, mut sink) = (FakeModel::default(), MemorySink::default());

        let outcomes = runner.run(&mut model, &mut sink).unwrap();
        assert!(matches!(outcomes[0].status, ShardStatus::Completed(_)));
        assert!(outcomes[1].is_failed());
        assert!(matches!(outcomes[2].status, ShardStatus::Completed(_)));
    }

    #[test]
    fn test_missing_label_fails_only_that_shard() {
        let (dir, labels) = corpus(1, 20);
        let cfg = config(dir.path(), 2);
        write_archive(
            &shard_path(dir.path(), "train", 1),
            &["abc123".to_string()],
            &[sample_pixels(3)],
        );
        let runner = ExperimentRunner::new(&cfg, &labels).unwrap();
        let (mut model, mut sink) = (FakeModel::default(), MemorySink::default());

        let outcomes = runner.run(&mut model, &mut sink).unwrap();
        match &outcomes[1].status {
            ShardStatus::Failed(msg) => assert!(msg.contains("abc123"), "{msg}"),
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(model.fits.len(), 1);
    }

    #[test]
    fn test_batch_larger_than_shard_is_skipped() {
        let (dir, labels) = corpus(1, 5);
        let mut cfg = config(dir.path(), 1);
        cfg.augment = true;
        cfg.batch_size = 50;
        let runner = ExperimentRunner::new(&cfg, &labels).unwrap();
        let (mut model, mut sink) = (FakeModel::default(), MemorySink::default());

        let outcomes = runner.run(&mut model, &mut sink).unwrap();
        assert!(matches!(outcomes[0].status, ShardStatus::Skipped(_)));
        assert!(sink.metrics.is_empty());
    }

    #[test]
    fn test_same_seed_same_first_batch() {
        let (dir, labels) = corpus(1, 20);
        let mut cfg = config(dir.path(), 1);
        cfg.augment = true;

        let first = |cfg: &ExperimentConfig| {
            let runner = ExperimentRunner::new(cfg, &labels).unwrap();
            let mut model = FakeModel::default();
            runner.run(&mut model, &mut MemorySink::default()).unwrap();
            model.first_batches.remove(0)
        };
        let a = first(&cfg);
        assert_eq!(a, first(&cfg));
        cfg.seed += 1;
        assert_ne!(a, first(&cfg));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let (dir, labels) = corpus(1, 2);
        let mut cfg = config(dir.path(), 1);
        cfg.model.input_height += 1;
        assert!(ExperimentRunner::new(&cfg, &labels).is_err());

        let mut cfg = config(dir.path(), 1);
        cfg.validation_fraction = 1.0;
        assert!(ExperimentRunner::new(&cfg, &labels).is_err());
    }
}
