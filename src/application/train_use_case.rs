// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Validate the config
//   Step 2: Load the label table          (Layer 4 - data)
//   Step 3: Save config for `submit`      (Layer 6 - infra)
//   Step 4: Open a tracked run            (Layer 6 - infra)
//   Step 5: Build CNN + Adam trainer      (Layer 5 - ml)
//   Step 6: Run every shard               (Layer 2 - runner)
//   Step 7: Close the run with a status
//
// The backend is a type parameter so tests can run the whole
// pipeline on the CPU; the CLI picks Autodiff<Wgpu>.

use anyhow::{Context, Result};
use burn::tensor::backend::AutodiffBackend;
use std::path::Path;

use crate::application::experiment_runner::{ExperimentConfig, ExperimentRunner, ShardOutcome};
use crate::data::labels::LabelTable;
use crate::infra::{
    checkpoint::CheckpointManager,
    tracking::{RunStatus, RunTracker},
};
use crate::ml::trainer::adam_trainer;

/// What a finished training run reports back to the CLI.
#[derive(Debug)]
pub struct TrainSummary {
    pub experiment_id: u64,
    pub run_id: String,
    pub outcomes: Vec<ShardOutcome>,
}

impl TrainSummary {
    pub fn failed_shards(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failed()).count()
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: ExperimentConfig,
}

impl TrainUseCase {
    pub fn new(config: ExperimentConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end on `device`.
    pub fn execute<B: AutodiffBackend>(&self, device: B::Device) -> Result<TrainSummary> {
        let cfg = &self.config;

        // ── Step 1: config ────────────────────────────────────────────────────
        cfg.validate().context("Invalid experiment config")?;

        // ── Step 2: labels ────────────────────────────────────────────────────
        tracing::info!("Loading labels from '{}'", cfg.labels_csv);
        let labels = LabelTable::from_csv(Path::new(&cfg.labels_csv))?;
        anyhow::ensure!(!labels.is_empty(), "label table '{}' has no rows", cfg.labels_csv);
        let runner = ExperimentRunner::new(cfg, &labels)?;

        // ── Step 3: checkpoint dir + config ───────────────────────────────────
        let ckpt_manager = CheckpointManager::new(&cfg.checkpoint_dir)?;
        ckpt_manager.save_config(cfg)?;

        // ── Step 4: tracked run ───────────────────────────────────────────────
        let mut tracker = RunTracker::start(Path::new(&cfg.tracking_dir), &cfg.experiment_name)?;

        // ── Step 5: model ─────────────────────────────────────────────────────
        let mut trainer = adam_trainer::<B>(&cfg.model, cfg.lr, device)?
            .with_checkpoints(ckpt_manager);

        // ── Step 6: shards ────────────────────────────────────────────────────
        let result = runner.run(&mut trainer, &mut tracker);

        // ── Step 7: close the run ─────────────────────────────────────────────
        let experiment_id = tracker.experiment_id();
        let run_id = tracker.run_id().to_string();
        let outcomes = match result {
            Ok(outcomes) => {
                let all_failed = !outcomes.is_empty() && outcomes.iter().all(|o| o.is_failed());
                let status = if all_failed { RunStatus::Failed } else { RunStatus::Finished };
                tracker.finish(status)?;
                outcomes
            }
            Err(e) => {
                tracker.finish(RunStatus::Failed)?;
                return Err(e);
            }
        };

        tracing::info!("Training complete!");
        Ok(TrainSummary { experiment_id, run_id, outcomes })
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::application::experiment_runner::ShardStatus;
    use crate::data::loader::shard_path;
    use crate::data::loader::tests::{sample_pixels, write_archive, SHAPE};
    use crate::infra::run_scraper::scrape_runs;
    use crate::ml::model::GraphemeCnnConfig;
    use burn::backend::{Autodiff, NdArray};
    use std::fs;

    type TestBackend = Autodiff<NdArray>;

    pub(crate) fn tiny_experiment(root: &Path) -> ExperimentConfig {
        let data = root.join("data");
        fs::create_dir_all(&data).unwrap();

        let ids: Vec<String> = (0..12).map(|k| format!("Train_{k}")).collect();
        let images: Vec<Vec<u8>> = (0..12).map(|k| sample_pixels(k + 1)).collect();
        write_archive(&shard_path(&data, "train", 0), &ids, &images);

        let mut csv = String::from("image_id,grapheme_root,vowel_diacritic,consonant_diacritic,grapheme\n");
        for (k, id) in ids.iter().enumerate() {
            csv.push_str(&format!("{id},{},{},{},x\n", k % 168, k % 11, k % 7));
        }
        fs::write(data.join("train.csv"), csv).unwrap();

        ExperimentConfig {
            experiment_name: "tiny".to_string(),
            data_dir: data.to_string_lossy().into_owned(),
            labels_csv: data.join("train.csv").to_string_lossy().into_owned(),
            n_shards: 1,
            batch_size: 4,
            epochs: 2,
            source_height: SHAPE.height,
            source_width: SHAPE.width,
            resize: false,
            tracking_dir: root.join("runs").to_string_lossy().into_owned(),
            checkpoint_dir: root.join("ckpt").to_string_lossy().into_owned(),
            model: GraphemeCnnConfig::new()
                .with_conv_blocks(1)
                .with_conv_filters(2)
                .with_dense1(8)
                .with_dense2(8),
            ..ExperimentConfig::default()
        }
        .sync_model_input()
    }

    #[test]
    fn test_training_end_to_end_on_cpu() {
        let root = tempfile::tempdir().unwrap();
        let cfg = tiny_experiment(root.path());
        let summary = TrainUseCase::new(cfg.clone())
            .execute::<TestBackend>(Default::default())
            .unwrap();

        assert_eq!(summary.failed_shards(), 0);
        assert!(matches!(summary.outcomes[0].status, ShardStatus::Completed(_)));

        // checkpoints after each of the 2 epochs
        let ckpt = CheckpointManager::open(&cfg.checkpoint_dir).unwrap();
        assert_eq!(ckpt.latest_epoch().unwrap(), 2);

        // the scraper sees the tracked accuracies
        let scraped = scrape_runs(Path::new(&cfg.tracking_dir)).unwrap();
        let metrics = &scraped.experiments[&summary.experiment_id];
        assert!(metrics.contains_key("val_output_root_accuracy"));
        assert!(metrics.contains_key("output_consonant_accuracy"));
    }

    #[test]
    fn test_missing_label_csv_fails_before_training() {
        let root = tempfile::tempdir().unwrap();
        let mut cfg = tiny_experiment(root.path());
        cfg.labels_csv = root.path().join("nope.csv").to_string_lossy().into_owned();
        let result = TrainUseCase::new(cfg.clone()).execute::<TestBackend>(Default::default());
        assert!(result.is_err());
        assert!(!Path::new(&cfg.tracking_dir).exists());
    }
}
