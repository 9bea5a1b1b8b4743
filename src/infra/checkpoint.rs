// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores model weights using Burn's CompactRecorder.
//
// What gets saved:
//   1. Model weights (.mpk.gz file) — all learned parameters
//   2. latest_epoch.json            — which epoch was last saved
//   3. experiment_config.json       — the full experiment config
//
// The config carries both the CNN geometry and the preprocessing
// settings, so `submit` can rebuild the same network and feed it
// images prepared exactly as during training.
//
// File naming convention:
//   checkpoints/
//     model_epoch_1.mpk.gz     ← weights after epoch 1
//     model_epoch_2.mpk.gz     ← weights after epoch 2
//     ...
//     latest_epoch.json        ← number of the latest epoch
//     experiment_config.json   ← config of the run
//
// Epochs are counted across shards: 4 shards x 5 epochs gives
// model_epoch_1 .. model_epoch_20.

use anyhow::{Context, Result};
use std::{fs, path::PathBuf};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};

use crate::application::experiment_runner::ExperimentConfig;
use crate::ml::model::GraphemeCnn;

const LATEST_FILE: &str = "latest_epoch.json";
const CONFIG_FILE: &str = "experiment_config.json";

/// Manages saving and loading of model checkpoints.
/// All files are stored in the configured directory.
#[derive(Debug, Clone)]
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Create a new CheckpointManager, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint dir '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    /// Open an existing checkpoint directory without creating it.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        anyhow::ensure!(
            dir.is_dir(),
            "Checkpoint dir '{}' does not exist. Have you run 'train' first?",
            dir.display()
        );
        Ok(Self { dir })
    }

    /// Save model weights for a given epoch and move the latest pointer.
    pub fn save_model<B: Backend>(&self, model: &GraphemeCnn<B>, epoch: usize) -> Result<()> {
        // The recorder adds the extension
        let path = self.dir.join(format!("model_epoch_{epoch}"));

        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        fs::write(self.dir.join(LATEST_FILE), serde_json::to_string(&epoch)?)
            .with_context(|| format!("Failed to write {LATEST_FILE}"))?;

        tracing::debug!("Saved checkpoint: epoch {}", epoch);
        Ok(())
    }

    /// Load the latest weights into `model`.
    ///
    /// `model` must have the architecture the checkpoint was saved with.
    pub fn load_model<B: Backend>(
        &self,
        model:  GraphemeCnn<B>,
        device: &B::Device,
    ) -> Result<GraphemeCnn<B>> {
        let epoch = self.latest_epoch()?;
        let path  = self.dir.join(format!("model_epoch_{epoch}"));

        tracing::info!("Loading checkpoint from epoch {}", epoch);

        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!("Cannot load checkpoint '{}'. Have you trained the model first?",
                    path.display())
            })?;

        Ok(model.load_record(record))
    }

    /// Save the experiment configuration to JSON.
    pub fn save_config(&self, cfg: &ExperimentConfig) -> Result<()> {
        let path = self.dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;

        tracing::debug!("Saved experiment config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<ExperimentConfig> {
        let path = self.dir.join(CONFIG_FILE);
        let json = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot read config from '{}'. \
                 Make sure you have run 'train' before 'submit'.",
                path.display()
            )
        })?;
        serde_json::from_str(&json)
            .with_context(|| format!("Malformed config '{}'", path.display()))
    }

    /// Number stored in latest_epoch.json.
    pub fn latest_epoch(&self) -> Result<usize> {
        let path = self.dir.join(LATEST_FILE);
        let s = fs::read_to_string(&path)
            .with_context(|| format!("Cannot find '{LATEST_FILE}'. Have you run 'train' first?"))?;
        Ok(serde_json::from_str::<usize>(&s)?)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::model::GraphemeCnnConfig;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn tiny() -> GraphemeCnnConfig {
        GraphemeCnnConfig::new()
            .with_input_height(4)
            .with_input_width(4)
            .with_conv_blocks(1)
            .with_conv_filters(2)
            .with_dense1(4)
            .with_dense2(4)
    }

    #[test]
    fn test_weights_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path().join("ckpt")).unwrap();
        let device = Default::default();

        let trained: GraphemeCnn<TestBackend> = tiny().init(&device).unwrap();
        ckpt.save_model(&trained, 1).unwrap();
        ckpt.save_model(&trained, 2).unwrap();
        assert_eq!(ckpt.latest_epoch().unwrap(), 2);

        let fresh: GraphemeCnn<TestBackend> = tiny().init(&device).unwrap();
        let restored = ckpt.load_model(fresh, &device).unwrap();

        let a: Vec<f32> = trained.dense1.weight.val().into_data().to_vec().unwrap();
        let b: Vec<f32> = restored.dense1.weight.val().into_data().to_vec().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_config_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        let mut cfg = ExperimentConfig::default();
        cfg.experiment_name = "aug_run".to_string();
        ckpt.save_config(&cfg).unwrap();

        let loaded = ckpt.load_config().unwrap();
        assert_eq!(loaded.experiment_name, "aug_run");
        assert_eq!(loaded.model.dense1, cfg.model.dense1);
    }

    #[test]
    fn test_missing_checkpoint_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        assert!(ckpt.latest_epoch().is_err());
        assert!(CheckpointManager::open(dir.path().join("nope")).is_err());
    }
}
