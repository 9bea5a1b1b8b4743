// ============================================================
// Layer 4 — Train/Validation Splitter
// ============================================================
// Randomly assigns every row of a shard to either:
//   - Training set:   used to update model weights
//   - Validation set: used to measure performance on unseen data
//
// The split is computed as a plan over row indices before any
// pixel is read, so the loader can stream each archive row
// straight into its destination array. That keeps peak memory
// at one copy of the shard instead of "load all, then split".
//
// Validation size is ceil(total * fraction), the remainder trains.
// Row order inside each partition follows the shuffled order.
//
// Reproducibility: the shuffle is driven by StdRng seeded from
// an explicit u64, so the same seed always yields the same plan.
// Callers derive one seed per shard.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::domain::error::{PipelineError, Result};

/// Which partition a row lands in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partition {
    Train,
    Validation,
}

/// Row-index assignment of one shard.
#[derive(Debug, Clone)]
pub struct SplitPlan {
    /// Indexed by source row: (partition, row within that partition)
    assignment: Vec<(Partition, usize)>,
    n_train: usize,
    n_val: usize,
}

impl SplitPlan {
    /// Shuffle `total` row indices with `seed` and hold out
    /// `ceil(total * validation_fraction)` of them.
    pub fn new(total: usize, validation_fraction: f64, seed: u64) -> Result<Self> {
        if !(0.0..1.0).contains(&validation_fraction) {
            return Err(PipelineError::Validation(format!(
                "validation fraction {validation_fraction} must be in [0, 1)"
            )));
        }

        let mut order: Vec<usize> = (0..total).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        // Fisher-Yates shuffle
        order.shuffle(&mut rng);

        let n_val = ((total as f64) * validation_fraction).ceil() as usize;
        let n_val = n_val.min(total);
        let n_train = total - n_val;

        let mut assignment = vec![(Partition::Train, 0usize); total];
        for (position, &row) in order.iter().enumerate() {
            assignment[row] = if position < n_train {
                (Partition::Train, position)
            } else {
                (Partition::Validation, position - n_train)
            };
        }

        tracing::debug!(
            "Split plan: {} training, {} validation (seed {})",
            n_train,
            n_val,
            seed
        );

        Ok(Self { assignment, n_train, n_val })
    }

    /// Destination of source row `row`
    pub fn destination(&self, row: usize) -> Option<(Partition, usize)> {
        self.assignment.get(row).copied()
    }

    pub fn n_train(&self) -> usize {
        self.n_train
    }

    pub fn n_val(&self) -> usize {
        self.n_val
    }

    pub fn total(&self) -> usize {
        self.assignment.len()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correct_split_sizes() {
        let plan = SplitPlan::new(100, 0.1, 7).unwrap();
        assert_eq!(plan.n_train(), 90);
        assert_eq!(plan.n_val(), 10);
    }

    #[test]
    fn test_validation_rounds_up() {
        // 447 * 0.1 = 44.7 → 45 held out
        let plan = SplitPlan::new(447, 0.1, 7).unwrap();
        assert_eq!(plan.n_val(), 45);
        assert_eq!(plan.n_train(), 402);
    }

    #[test]
    fn test_every_destination_used_once() {
        let plan = SplitPlan::new(50, 0.3, 1).unwrap();
        let mut train_seen = vec![false; plan.n_train()];
        let mut val_seen = vec![false; plan.n_val()];
        for row in 0..plan.total() {
            match plan.destination(row).unwrap() {
                (Partition::Train, i) => {
                    assert!(!train_seen[i]);
                    train_seen[i] = true;
                }
                (Partition::Validation, i) => {
                    assert!(!val_seen[i]);
                    val_seen[i] = true;
                }
            }
        }
        assert!(train_seen.iter().all(|&s| s));
        assert!(val_seen.iter().all(|&s| s));
    }

    #[test]
    fn test_same_seed_same_plan() {
        let a = SplitPlan::new(200, 0.1, 42).unwrap();
        let b = SplitPlan::new(200, 0.1, 42).unwrap();
        let c = SplitPlan::new(200, 0.1, 43).unwrap();
        let dests = |p: &SplitPlan| (0..200).map(|r| p.destination(r)).collect::<Vec<_>>();
        assert_eq!(dests(&a), dests(&b));
        assert_ne!(dests(&a), dests(&c));
    }

    #[test]
    fn test_empty_dataset() {
        let plan = SplitPlan::new(0, 0.1, 0).unwrap();
        assert_eq!(plan.n_train(), 0);
        assert_eq!(plan.n_val(), 0);
        assert!(plan.destination(0).is_none());
    }

    #[test]
    fn test_fraction_out_of_range() {
        assert!(SplitPlan::new(10, 1.0, 0).is_err());
        assert!(SplitPlan::new(10, -0.1, 0).is_err());
    }
}
