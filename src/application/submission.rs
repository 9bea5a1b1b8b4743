// ============================================================
// Layer 2 — SubmitUseCase
// ============================================================
// Predicts every test shard and writes one submission file:
//
//   Step 1: Load the training config from the checkpoint dir
//   Step 2: Restore the model                   (Layer 5 - ml)
//   Step 3: for each test_image_data_{i}.parquet:
//             preprocess exactly as in training (Layer 4 - data)
//             predict, argmax per head
//             append rows                       (Layer 6 - infra)
//
// Shards are read one at a time; the feature array of a shard
// is dropped before the next one is opened.

use anyhow::{Context, Result};
use burn::prelude::Backend;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::application::experiment_runner::ExperimentConfig;
use crate::data::{
    encoder::OneHotEncoder,
    loader::{shard_path, ImageArchive},
};
use crate::domain::labels::{LabelHead, LabelTriple};
use crate::domain::traits::Predictor;
use crate::infra::{checkpoint::CheckpointManager, submission::SubmissionWriter};
use crate::ml::inferencer::Inferencer;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitConfig {
    pub data_dir:       String,
    pub checkpoint_dir: String,
    pub n_shards:       usize,
    pub output:         String,
}

impl Default for SubmitConfig {
    fn default() -> Self {
        Self {
            data_dir:       "data".to_string(),
            checkpoint_dir: "checkpoints".to_string(),
            n_shards:       4,
            output:         "submission.csv".to_string(),
        }
    }
}

pub struct SubmitUseCase {
    config: SubmitConfig,
}

impl SubmitUseCase {
    pub fn new(config: SubmitConfig) -> Self {
        Self { config }
    }

    /// Restore the latest checkpoint on `device` and write the submission.
    /// Returns the number of rows written.
    pub fn execute<B: Backend>(&self, device: B::Device) -> Result<usize> {
        let ckpt = CheckpointManager::open(&self.config.checkpoint_dir)?;
        let training = ckpt.load_config()?;
        let inferencer = Inferencer::<B>::from_checkpoint(&ckpt, device)?;
        self.write_predictions(&training, &inferencer)
    }

    /// Predict every test shard with `model`, preprocessing as `training` did.
    pub fn write_predictions<P: Predictor>(&self, training: &ExperimentConfig, model: &P) -> Result<usize> {
        let preprocessor = training.preprocessor()?;
        let output = PathBuf::from(&self.config.output);
        let mut writer = SubmissionWriter::create(&output)?;

        for index in 0..self.config.n_shards {
            let path = shard_path(Path::new(&self.config.data_dir), "test", index);
            tracing::info!("Predicting shard {}/{}: '{}'", index + 1, self.config.n_shards, path.display());

            let archive = ImageArchive::open(&path, preprocessor.input_shape())
                .with_context(|| format!("Cannot open test shard '{}'", path.display()))?;
            let (ids, features) =
                archive.read_features(&preprocessor, training.normalize, training.read_batch_rows)?;

            let probs = model.predict(&features)?;
            anyhow::ensure!(
                probs.len() == LabelHead::ALL.len(),
                "model returned {} heads, expected {}",
                probs.len(),
                LabelHead::ALL.len()
            );
            let [root, vowel, consonant] = LabelHead::ALL.map(|head| {
                OneHotEncoder::for_head(head).decode(probs[head as usize].view())
            });
            let (root, vowel, consonant) = (root?, vowel?, consonant?);
            anyhow::ensure!(
                root.len() == ids.len() && vowel.len() == ids.len() && consonant.len() == ids.len(),
                "predictions do not cover all {} images of '{}'",
                ids.len(),
                path.display()
            );

            for (i, id) in ids.iter().enumerate() {
                writer.write_image(id, LabelTriple::new(root[i], vowel[i], consonant[i]))?;
            }
        }

        let rows = writer.rows();
        writer.finish()?;
        tracing::info!("Wrote {} rows to '{}'", rows, output.display());
        Ok(rows)
    }
}
