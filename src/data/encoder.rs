//! One-hot encoding of a single label column.
//!
//! Each head gets its own encoder. The encoder holds the sorted list of
//! categories it knows; `transform` emits dense rows with exactly one
//! active position and `decode` recovers the category by arg-max.

use ndarray::{Array2, ArrayView2};

use crate::domain::error::{PipelineError, Result};
use crate::domain::labels::LabelHead;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneHotEncoder {
    categories: Vec<usize>,
}

impl OneHotEncoder {
    /// Learn the categories present in `values`.
    pub fn fit(values: &[usize]) -> Self {
        let mut categories = values.to_vec();
        categories.sort_unstable();
        categories.dedup();
        Self { categories }
    }

    /// Categories `0..n`, independent of which values a shard happens to contain.
    pub fn with_cardinality(n: usize) -> Self {
        Self {
            categories: (0..n).collect(),
        }
    }

    /// Encoder covering every class of a head
    pub fn for_head(head: LabelHead) -> Self {
        Self::with_cardinality(head.num_classes())
    }

    /// Width of each encoded row
    pub fn width(&self) -> usize {
        self.categories.len()
    }

    pub fn categories(&self) -> &[usize] {
        &self.categories
    }

    /// Dense one-hot rows, one per value.
    pub fn transform(&self, values: &[usize]) -> Result<Array2<f32>> {
        let mut out = Array2::<f32>::zeros((values.len(), self.width()));
        for (row, &value) in values.iter().enumerate() {
            let col = self.categories.binary_search(&value).map_err(|_| {
                PipelineError::Validation(format!("unknown category {value} at row {row}"))
            })?;
            out[[row, col]] = 1.0;
        }
        Ok(out)
    }

    /// Arg-max of each row mapped back to its category.
    pub fn decode(&self, encoded: ArrayView2<'_, f32>) -> Result<Vec<usize>> {
        if encoded.ncols() != self.width() {
            return Err(PipelineError::Validation(format!(
                "encoded width {} does not match {} categories",
                encoded.ncols(),
                self.width()
            )));
        }
        Ok(argmax_rows(encoded)
            .into_iter()
            .map(|col| self.categories[col])
            .collect())
    }
}

/// Column index of the largest value in each row. Ties keep the first.
pub fn argmax_rows(values: ArrayView2<'_, f32>) -> Vec<usize> {
    values
        .rows()
        .into_iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .fold((0usize, f32::NEG_INFINITY), |best, (i, &v)| {
                    if v > best.1 {
                        (i, v)
                    } else {
                        best
                    }
                })
                .0
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_recovers_indices() {
        let values = vec![3, 0, 167, 42, 3, 99];
        let enc = OneHotEncoder::for_head(LabelHead::Root);
        let encoded = enc.transform(&values).unwrap();
        assert_eq!(encoded.dim(), (6, 168));
        assert_eq!(enc.decode(encoded.view()).unwrap(), values);
    }

    #[test]
    fn test_exactly_one_active_bit_per_row() {
        let enc = OneHotEncoder::for_head(LabelHead::Consonant);
        let encoded = enc.transform(&[0, 6, 2]).unwrap();
        for row in encoded.rows() {
            assert_eq!(row.iter().filter(|&&v| v == 1.0).count(), 1);
            assert_eq!(row.sum(), 1.0);
        }
    }

    #[test]
    fn test_fit_learns_present_categories() {
        let enc = OneHotEncoder::fit(&[5, 2, 5, 9]);
        assert_eq!(enc.categories(), &[2, 5, 9]);
        let encoded = enc.transform(&[9, 2]).unwrap();
        assert_eq!(encoded.dim(), (2, 3));
        assert_eq!(enc.decode(encoded.view()).unwrap(), vec![9, 2]);
    }

    #[test]
    fn test_unknown_category_rejected() {
        let enc = OneHotEncoder::for_head(LabelHead::Vowel);
        assert!(enc.transform(&[11]).is_err());
    }
}
