use ndarray::Array2;

use crate::domain::error::{PipelineError, Result};

/// Ordered mapping from output-head name to its one-hot label array.
///
/// Insertion order is preserved; it is the order the multi-output
/// generator concatenates in and splits back apart in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetBundle {
    entries: Vec<(String, Array2<f32>)>,
}

impl TargetBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an output. Replacing keeps the original position.
    pub fn insert(&mut self, name: impl Into<String>, labels: Array2<f32>) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = labels,
            None => self.entries.push((name, labels)),
        }
    }

    #[cfg(test)]
    pub fn with(mut self, name: impl Into<String>, labels: Array2<f32>) -> Self {
        self.insert(name, labels);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Array2<f32>> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, a)| a)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Array2<f32>)> {
        self.entries.iter().map(|(n, a)| (n.as_str(), a))
    }

    #[cfg(test)]
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Shared sample count of every output.
    /// Fails with ShapeMismatch on the first output that disagrees with the first one.
    pub fn sample_count(&self) -> Result<usize> {
        if self.is_empty() {
            return Err(PipelineError::Validation("target bundle is empty".to_string()));
        }
        let expected = self.entries[0].1.nrows();
        for (name, labels) in &self.entries[1..] {
            if labels.nrows() != expected {
                return Err(PipelineError::ShapeMismatch {
                    name: name.clone(),
                    expected,
                    found: labels.nrows(),
                });
            }
        }
        Ok(expected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order_preserved() {
        let bundle = TargetBundle::new()
            .with("b", Array2::zeros((2, 1)))
            .with("a", Array2::zeros((2, 3)))
            .with("b", Array2::ones((2, 1)));
        assert_eq!(bundle.names(), vec!["b", "a"]);
        assert_eq!(bundle.get("b"), Some(&Array2::ones((2, 1))));
    }

    #[test]
    fn test_sample_count_mismatch() {
        let bundle = TargetBundle::new()
            .with("root", Array2::zeros((10, 168)))
            .with("vowel", Array2::zeros((9, 11)));
        match bundle.sample_count() {
            Err(PipelineError::ShapeMismatch { name, expected, found }) => {
                assert_eq!(name, "vowel");
                assert_eq!(expected, 10);
                assert_eq!(found, 9);
            }
            other => panic!("expected ShapeMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_bundle_has_no_sample_count() {
        assert!(TargetBundle::new().sample_count().is_err());
    }
}
