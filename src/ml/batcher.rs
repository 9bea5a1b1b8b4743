// ============================================================
// Layer 5 — Grapheme Batcher
// ============================================================
// Converts ndarray batches from the data layer into tensors.
//
// How batching works here:
//   Input:  images [N, H*W] (row-major pixels), one-hot labels
//           per head [N, classes]
//   Output: GraphemeBatch with
//             images  [N, 1, H, W]  float
//             root    [N]           int class index
//             vowel   [N]           int class index
//             consonant [N]         int class index
//
// One-hot rows are collapsed with argmax because Burn's
// cross-entropy takes class indices, not dense targets.
//
// The data layer already yields fixed-size flattened images,
// so no padding is needed. The batcher only checks that the
// row width matches the declared height * width.

use burn::{prelude::*, tensor::TensorData};
use ndarray::ArrayView2;

use crate::data::encoder::argmax_rows;
use crate::domain::bundle::TargetBundle;
use crate::domain::error::{PipelineError, Result};
use crate::domain::labels::{ImageShape, LabelHead};

// ─── GraphemeBatch ────────────────────────────────────────────────────────────
/// A batch ready for the forward pass and loss computation.
#[derive(Debug, Clone)]
pub struct GraphemeBatch<B: Backend> {
    /// [batch_size, 1, height, width]
    pub images: Tensor<B, 4>,
    /// Class index per head, in `LabelHead::ALL` order. Each: [batch_size]
    pub targets: [Tensor<B, 1, Int>; 3],
}

// ─── GraphemeBatcher ──────────────────────────────────────────────────────────
/// Knows the image geometry; tensors are created on the device passed in,
/// so the same batcher serves the autodiff and the inner backend.
#[derive(Debug, Clone, Copy)]
pub struct GraphemeBatcher {
    shape: ImageShape,
}

impl GraphemeBatcher {
    pub fn new(shape: ImageShape) -> Self {
        Self { shape }
    }

    /// [N, H*W] → [N, 1, H, W]
    pub fn images<B: Backend>(
        &self,
        images: ArrayView2<'_, f32>,
        device: &B::Device,
    ) -> Result<Tensor<B, 4>> {
        if images.ncols() != self.shape.pixels() {
            return Err(PipelineError::Validation(format!(
                "image rows have {} pixels, model expects {} ({})",
                images.ncols(),
                self.shape.pixels(),
                self.shape
            )));
        }
        // iter() walks in logical row-major order whatever the memory layout
        let flat: Vec<f32> = images.iter().copied().collect();
        let data = TensorData::new(flat, [images.nrows(), 1, self.shape.height, self.shape.width]);
        Ok(Tensor::<B, 4>::from_data(data, device))
    }

    /// Argmax class index per head, in `LabelHead::ALL` order.
    pub fn class_indices(&self, targets: &TargetBundle) -> Result<[Vec<i32>; 3]> {
        let mut out: [Vec<i32>; 3] = Default::default();
        for (slot, head) in out.iter_mut().zip(LabelHead::ALL) {
            let labels = targets.get(head.output_name()).ok_or_else(|| {
                PipelineError::Validation(format!("targets have no '{}' output", head.output_name()))
            })?;
            if labels.ncols() != head.num_classes() {
                return Err(PipelineError::Validation(format!(
                    "'{}' has {} columns, expected {}",
                    head.output_name(),
                    labels.ncols(),
                    head.num_classes()
                )));
            }
            *slot = argmax_rows(labels.view()).into_iter().map(|c| c as i32).collect();
        }
        Ok(out)
    }

    pub fn labels<B: Backend>(&self, classes: &[i32], device: &B::Device) -> Tensor<B, 1, Int> {
        Tensor::<B, 1, Int>::from_ints(classes, device)
    }

    /// Convert one data-layer batch.
    pub fn batch<B: Backend>(
        &self,
        images: ArrayView2<'_, f32>,
        targets: &TargetBundle,
        device: &B::Device,
    ) -> Result<GraphemeBatch<B>> {
        let n = targets.sample_count()?;
        if n != images.nrows() {
            return Err(PipelineError::ShapeMismatch {
                name: "images".to_string(),
                expected: n,
                found: images.nrows(),
            });
        }

        let [root, vowel, consonant] = self.class_indices(targets)?;
        Ok(GraphemeBatch {
            images: self.images(images, device)?,
            targets: [
                self.labels(&root, device),
                self.labels(&vowel, device),
                self.labels(&consonant, device),
            ],
        })
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::encoder::OneHotEncoder;
    use burn::backend::NdArray;
    use ndarray::Array2;

    type TestBackend = NdArray;

    fn targets(root: &[usize], vowel: &[usize], consonant: &[usize]) -> TargetBundle {
        let mut bundle = TargetBundle::new();
        for (head, values) in LabelHead::ALL.into_iter().zip([root, vowel, consonant]) {
            let encoded = OneHotEncoder::for_head(head).transform(values).unwrap();
            bundle.insert(head.output_name(), encoded);
        }
        bundle
    }

    #[test]
    fn test_batch_shapes_and_classes() {
        let device = Default::default();
        let batcher = GraphemeBatcher::new(ImageShape::new(2, 3));
        let images = Array2::<f32>::ones((2, 6));
        let batch: GraphemeBatch<TestBackend> = batcher
            .batch(images.view(), &targets(&[5, 167], &[0, 10], &[6, 1]), &device)
            .unwrap();

        assert_eq!(batch.images.dims(), [2, 1, 2, 3]);
        let root: Vec<i64> = batch.targets[0].clone().into_data().convert::<i64>().to_vec().unwrap();
        let consonant: Vec<i64> = batch.targets[2].clone().into_data().convert::<i64>().to_vec().unwrap();
        assert_eq!(root, vec![5, 167]);
        assert_eq!(consonant, vec![6, 1]);
    }

    #[test]
    fn test_pixel_layout_is_row_major() {
        let device = Default::default();
        let batcher = GraphemeBatcher::new(ImageShape::new(2, 2));
        let images = Array2::from_shape_vec((1, 4), vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let tensor: Tensor<TestBackend, 4> = batcher.images(images.view(), &device).unwrap();
        let second_row: Vec<f32> = tensor.slice([0..1, 0..1, 1..2, 0..2]).into_data().to_vec().unwrap();
        assert_eq!(second_row, vec![3.0, 4.0]);
    }

    #[test]
    fn test_wrong_width_rejected() {
        let device = Default::default();
        let batcher = GraphemeBatcher::new(ImageShape::new(2, 3));
        let images = Array2::<f32>::zeros((1, 5));
        assert!(batcher.images::<TestBackend>(images.view(), &device).is_err());
    }

    #[test]
    fn test_missing_head_rejected() {
        let batcher = GraphemeBatcher::new(ImageShape::new(1, 1));
        let bundle = TargetBundle::new().with("output_root", Array2::zeros((1, 168)));
        assert!(matches!(batcher.class_indices(&bundle), Err(PipelineError::Validation(_))));
    }
}
