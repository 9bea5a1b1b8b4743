// ============================================================
// Layer 5 — Inferencer
// ============================================================
use anyhow::{Context, Result};
use burn::{prelude::*, tensor::activation::softmax};
use ndarray::{Array2, Axis};

use crate::domain::labels::ImageShape;
use crate::domain::traits::Predictor;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::batcher::GraphemeBatcher;
use crate::ml::model::GraphemeCnn;

/// Rows per forward pass when predicting
pub const PREDICT_CHUNK: usize = 256;

/// Softmax probabilities per head, in `LabelHead::ALL` order.
///
/// Images are pushed through the model in chunks so a full test shard
/// never has to sit on the device at once.
pub fn predict_probabilities<B: Backend>(
    model:   &GraphemeCnn<B>,
    batcher: &GraphemeBatcher,
    images:  &Array2<f32>,
    chunk:   usize,
    device:  &B::Device,
) -> Result<Vec<Array2<f32>>> {
    let n = images.nrows();
    let mut heads: Vec<Vec<f32>> = vec![Vec::new(); 3];
    let mut widths = [0usize; 3];

    for rows in images.axis_chunks_iter(Axis(0), chunk.max(1)) {
        let input  = batcher.images::<B>(rows, device)?;
        let logits = model.forward(input).into_vec();
        for (i, head_logits) in logits.into_iter().enumerate() {
            widths[i] = head_logits.dims()[1];
            let probs: Vec<f32> = softmax(head_logits, 1)
                .into_data()
                .convert::<f32>()
                .to_vec()
                .map_err(|e| anyhow::anyhow!("Cannot read probabilities: {e:?}"))?;
            heads[i].extend(probs);
        }
    }

    heads
        .into_iter()
        .zip(widths)
        .map(|(flat, width)| {
            Array2::from_shape_vec((n, width), flat).context("Probability array has wrong shape")
        })
        .collect()
}

/// A trained model restored from disk, evaluation mode only.
pub struct Inferencer<B: Backend> {
    model:   GraphemeCnn<B>,
    batcher: GraphemeBatcher,
    device:  B::Device,
}

impl<B: Backend> Inferencer<B> {
    pub fn from_checkpoint(ckpt_manager: &CheckpointManager, device: B::Device) -> Result<Self> {
        let cfg   = ckpt_manager.load_config()?;
        let model = cfg.model.init::<B>(&device)?;
        let model = ckpt_manager.load_model(model, &device)?;
        tracing::info!("Model loaded from checkpoint");
        Ok(Self::new(model, device))
    }

    pub fn new(model: GraphemeCnn<B>, device: B::Device) -> Self {
        let batcher = GraphemeBatcher::new(ImageShape::new(model.input_height, model.input_width));
        Self { model, batcher, device }
    }
}

impl<B: Backend> Predictor for Inferencer<B> {
    fn predict(&self, images: &Array2<f32>) -> Result<Vec<Array2<f32>>> {
        predict_probabilities(&self.model, &self.batcher, images, PREDICT_CHUNK, &self.device)
    }
}
