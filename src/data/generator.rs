// ============================================================
// Layer 4 — Multi-Output Batch Generator
// ============================================================
// The augmenter streams images with ONE aligned label array.
// The network has THREE heads, each wanting its own one-hot
// array per batch. This adapter reconciles the two:
//
//   setup:
//     { output_root: [n,168], output_vowel: [n,11], output_consonant: [n,7] }
//        │  check every output has n rows (ShapeMismatch otherwise)
//        ▼
//     concatenate along the category axis, in insertion order
//        │  record each output's span (start, width)
//        ▼
//     combined labels [n,186]
//
//   streaming:
//     augmenter.flow(images, combined)  → (images[b], combined[b,186])
//        │
//        ▼
//     split combined[b,186] by the recorded spans
//        │
//        ▼
//     Batch { images[b], { output_root: [b,168], ... } }
//
// Because the augmenter selects label rows with the same indices
// as image rows and never touches label values, every split
// slice lines up with its image exactly.
//
// The generator holds a reference to the augmenter plus the
// span table; it keeps no array beyond the flow it returns.

use ndarray::{s, Array2, ArrayView2};

use crate::data::augmenter::{Flow, ImageAugmenter};
use crate::domain::bundle::TargetBundle;
use crate::domain::error::{PipelineError, Result};
use crate::domain::traits::Batch;

// ─── SpanTable ────────────────────────────────────────────────────────────────
/// Column range of one output inside the concatenated label array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSpan {
    pub name: String,
    pub start: usize,
    pub width: usize,
}

impl OutputSpan {
    /// One past the last column
    pub fn end(&self) -> usize {
        self.start + self.width
    }
}

/// Spans of all outputs, in concatenation order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpanTable {
    spans: Vec<OutputSpan>,
}

impl SpanTable {
    /// Concatenate every output of `targets` along the category axis.
    ///
    /// Sample counts are checked before anything is copied.
    pub fn concatenate(targets: &TargetBundle) -> Result<(Array2<f32>, SpanTable)> {
        let n = targets.sample_count()?;

        let mut spans = Vec::with_capacity(targets.len());
        let mut start = 0usize;
        for (name, labels) in targets.iter() {
            spans.push(OutputSpan {
                name: name.to_string(),
                start,
                width: labels.ncols(),
            });
            start += labels.ncols();
        }

        let mut combined = Array2::<f32>::zeros((n, start));
        for (span, (_, labels)) in spans.iter().zip(targets.iter()) {
            combined
                .slice_mut(s![.., span.start..span.end()])
                .assign(labels);
        }

        Ok((combined, SpanTable { spans }))
    }

    pub fn spans(&self) -> &[OutputSpan] {
        &self.spans
    }

    pub fn total_width(&self) -> usize {
        self.spans.last().map_or(0, OutputSpan::end)
    }

    /// Cut a combined label batch back into per-output arrays.
    pub fn split(&self, combined: ArrayView2<'_, f32>) -> Result<TargetBundle> {
        if combined.ncols() != self.total_width() {
            return Err(PipelineError::Validation(format!(
                "combined labels have {} columns, spans cover {}",
                combined.ncols(),
                self.total_width()
            )));
        }

        let mut bundle = TargetBundle::new();
        for span in &self.spans {
            bundle.insert(
                span.name.clone(),
                combined.slice(s![.., span.start..span.end()]).to_owned(),
            );
        }
        Ok(bundle)
    }
}

// ─── MultiOutputGenerator ─────────────────────────────────────────────────────
/// Wraps a single-target augmenter so it streams per-head label bundles.
#[derive(Debug, Clone, Copy)]
pub struct MultiOutputGenerator<'g> {
    augmenter: &'g ImageAugmenter,
}

impl<'g> MultiOutputGenerator<'g> {
    pub fn new(augmenter: &'g ImageAugmenter) -> Self {
        Self { augmenter }
    }

    /// Endless, restartable stream of synchronized multi-output batches.
    pub fn flow<'a>(
        &self,
        images: &'a Array2<f32>,
        targets: &TargetBundle,
        batch_size: usize,
        shuffle: bool,
        seed: u64,
    ) -> Result<MultiOutputFlow<'a>>
    where
        'g: 'a,
    {
        let (combined, spans) = SpanTable::concatenate(targets)?;
        if combined.nrows() != images.nrows() {
            return Err(PipelineError::ShapeMismatch {
                name: "images".to_string(),
                expected: combined.nrows(),
                found: images.nrows(),
            });
        }

        tracing::debug!(
            "Multi-output flow: {} samples, {} outputs, {} label columns",
            images.nrows(),
            spans.spans().len(),
            spans.total_width()
        );

        let inner = self
            .augmenter
            .flow(images, combined, batch_size, shuffle, seed)?;
        Ok(MultiOutputFlow { inner, spans })
    }
}

/// Lazy stream produced by [`MultiOutputGenerator::flow`].
pub struct MultiOutputFlow<'a> {
    inner: Flow<'a>,
    spans: SpanTable,
}

impl<'a> MultiOutputFlow<'a> {
    /// Only full batches; see [`Flow::drop_last`].
    pub fn drop_last(self) -> Self {
        Self { inner: self.inner.drop_last(), spans: self.spans }
    }

    pub fn batches_per_epoch(&self) -> usize {
        self.inner.batches_per_epoch()
    }

    /// Rewind to the first batch of the first epoch.
    #[cfg(test)]
    pub fn reset(&mut self) {
        self.inner.reset();
    }
}

impl<'a> Iterator for MultiOutputFlow<'a> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        let (images, combined) = self.inner.next()?;
        Some(
            self.spans
                .split(combined.view())
                .map(|targets| Batch { images, targets }),
        )
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::augmenter::AugmentConfig;
    use crate::domain::labels::ImageShape;

    fn patterned(rows: usize, cols: usize, seed: f32) -> Array2<f32> {
        Array2::from_shape_fn((rows, cols), |(r, c)| seed + (r * cols + c) as f32)
    }

    fn head_bundle(order: &[usize]) -> TargetBundle {
        let heads = [("root", 168usize), ("vowel", 11), ("consonant", 7)];
        let mut bundle = TargetBundle::new();
        for &i in order {
            let (name, width) = heads[i];
            bundle.insert(name, patterned(10, width, i as f32 * 1000.0));
        }
        bundle
    }

    #[test]
    fn test_concatenate_root_vowel_consonant() {
        let (combined, spans) = SpanTable::concatenate(&head_bundle(&[0, 1, 2])).unwrap();
        assert_eq!(combined.dim(), (10, 186));

        let got: Vec<(&str, usize, usize)> = spans
            .spans()
            .iter()
            .map(|s| (s.name.as_str(), s.start, s.end()))
            .collect();
        assert_eq!(
            got,
            vec![("root", 0, 168), ("vowel", 168, 179), ("consonant", 179, 186)]
        );
    }

    #[test]
    fn test_split_is_lossless_for_every_order() {
        let orders = [
            [0, 1, 2],
            [0, 2, 1],
            [1, 0, 2],
            [1, 2, 0],
            [2, 0, 1],
            [2, 1, 0],
        ];
        for order in orders {
            let bundle = head_bundle(&order);
            let (combined, spans) = SpanTable::concatenate(&bundle).unwrap();
            let restored = spans.split(combined.view()).unwrap();
            assert_eq!(restored, bundle, "order {order:?}");
        }
    }

    #[test]
    fn test_mismatched_leading_dimension_fails_before_concat() {
        let bundle = TargetBundle::new()
            .with("root", Array2::zeros((10, 168)))
            .with("vowel", Array2::zeros((10, 11)))
            .with("consonant", Array2::zeros((8, 7)));
        let err = SpanTable::concatenate(&bundle).unwrap_err();
        assert!(matches!(err, PipelineError::ShapeMismatch { found: 8, .. }));
    }

    #[test]
    fn test_split_rejects_wrong_width() {
        let (_, spans) = SpanTable::concatenate(&head_bundle(&[0, 1])).unwrap();
        assert!(spans.split(Array2::zeros((2, 100)).view()).is_err());
    }

    #[test]
    fn test_flow_yields_aligned_bundles() {
        let shape = ImageShape::new(2, 3);
        let images = Array2::from_shape_fn((10, shape.pixels()), |(r, _)| r as f32);
        let bundle = head_bundle(&[0, 1, 2]);
        let augmenter = ImageAugmenter::new(AugmentConfig::identity(), shape).unwrap();
        let generator = MultiOutputGenerator::new(&augmenter);

        let mut flow = generator.flow(&images, &bundle, 4, true, 17).unwrap();
        assert_eq!(flow.batches_per_epoch(), 3);

        for _ in 0..6 {
            let batch = flow.next().unwrap().unwrap();
            assert_eq!(batch.targets.names(), vec!["root", "vowel", "consonant"]);
            for (slot, img) in batch.images.outer_iter().enumerate() {
                let sample = img[0] as usize;
                for (name, labels) in batch.targets.iter() {
                    let original = bundle.get(name).unwrap();
                    assert_eq!(labels.row(slot), original.row(sample));
                }
            }
        }
    }

    #[test]
    fn test_drop_last_trains_only_full_batches() {
        let shape = ImageShape::new(2, 3);
        let images = Array2::from_shape_fn((10, shape.pixels()), |(r, _)| r as f32);
        let bundle = head_bundle(&[0, 1, 2]);
        let augmenter = ImageAugmenter::new(AugmentConfig::identity(), shape).unwrap();

        let mut flow = MultiOutputGenerator::new(&augmenter)
            .flow(&images, &bundle, 4, true, 5)
            .unwrap()
            .drop_last();
        assert_eq!(flow.batches_per_epoch(), 2);

        let first: Vec<Batch> = (0..6).map(|_| flow.next().unwrap().unwrap()).collect();
        assert!(first.iter().all(|b| b.images.nrows() == 4));
        for pass in first.chunks(2) {
            let mut seen: Vec<usize> = pass
                .iter()
                .flat_map(|b| b.images.column(0).to_vec())
                .map(|v| v as usize)
                .collect();
            seen.sort_unstable();
            seen.dedup();
            assert_eq!(seen.len(), 8);
        }

        flow.reset();
        assert_eq!(flow.next().unwrap().unwrap().images, first[0].images);
    }

    #[test]
    fn test_flow_rejects_image_label_mismatch() {
        let shape = ImageShape::new(2, 3);
        let images = Array2::<f32>::zeros((9, shape.pixels()));
        let augmenter = ImageAugmenter::new(AugmentConfig::identity(), shape).unwrap();
        let result = MultiOutputGenerator::new(&augmenter).flow(&images, &head_bundle(&[0]), 4, true, 0);
        assert!(matches!(result, Err(PipelineError::ShapeMismatch { .. })));
    }
}
