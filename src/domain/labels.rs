// ============================================================
// Layer 3 — Labels and Image Geometry
// ============================================================
// Every grapheme sample carries three category indices, one per
// classification head:
//
//   grapheme_root        168 classes  → output_root
//   vowel_diacritic       11 classes  → output_vowel
//   consonant_diacritic    7 classes  → output_consonant
//
// The head order root, vowel, consonant is used everywhere a
// fixed order is needed (loader return order, model outputs).
// Submissions use a different fixed order, see SUBMISSION_ORDER.

use serde::{Deserialize, Serialize};

use crate::domain::error::{PipelineError, Result};

// ─── LabelHead ────────────────────────────────────────────────────────────────
/// One of the three independent classification outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LabelHead {
    Root,
    Vowel,
    Consonant,
}

impl LabelHead {
    /// Model head order
    pub const ALL: [LabelHead; 3] = [LabelHead::Root, LabelHead::Vowel, LabelHead::Consonant];

    /// Number of categories this head predicts
    pub fn num_classes(self) -> usize {
        match self {
            LabelHead::Root => 168,
            LabelHead::Vowel => 11,
            LabelHead::Consonant => 7,
        }
    }

    /// Column name in the label table and component name in submissions
    pub fn column(self) -> &'static str {
        match self {
            LabelHead::Root => "grapheme_root",
            LabelHead::Vowel => "vowel_diacritic",
            LabelHead::Consonant => "consonant_diacritic",
        }
    }

    /// Name of the network output this head feeds
    pub fn output_name(self) -> &'static str {
        match self {
            LabelHead::Root => "output_root",
            LabelHead::Vowel => "output_vowel",
            LabelHead::Consonant => "output_consonant",
        }
    }
}

/// Component order of the rows written for each sample in a submission.
pub const SUBMISSION_ORDER: [LabelHead; 3] =
    [LabelHead::Consonant, LabelHead::Root, LabelHead::Vowel];

// ─── LabelTriple ──────────────────────────────────────────────────────────────
/// The three category indices of one sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelTriple {
    pub root: usize,
    pub vowel: usize,
    pub consonant: usize,
}

impl LabelTriple {
    pub fn new(root: usize, vowel: usize, consonant: usize) -> Self {
        Self { root, vowel, consonant }
    }

    /// Category index for one head
    pub fn get(&self, head: LabelHead) -> usize {
        match head {
            LabelHead::Root => self.root,
            LabelHead::Vowel => self.vowel,
            LabelHead::Consonant => self.consonant,
        }
    }

    /// Fails if any index falls outside its head's category range.
    pub fn validate(&self) -> Result<()> {
        for head in LabelHead::ALL {
            let value = self.get(head);
            if value >= head.num_classes() {
                return Err(PipelineError::Validation(format!(
                    "{} = {} is outside 0..{}",
                    head.column(),
                    value,
                    head.num_classes()
                )));
            }
        }
        Ok(())
    }
}

// ─── ImageShape ───────────────────────────────────────────────────────────────
/// Height × width of a single-channel image.
/// Images travel through the pipeline flattened in row-major order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageShape {
    pub height: usize,
    pub width: usize,
}

impl ImageShape {
    /// Size of the scanned graphemes in the source archives
    pub const RAW: ImageShape = ImageShape { height: 137, width: 236 };

    pub fn new(height: usize, width: usize) -> Self {
        Self { height, width }
    }

    /// Number of pixels in one flattened image
    pub fn pixels(&self) -> usize {
        self.height * self.width
    }
}

impl std::fmt::Display for ImageShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.height, self.width)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_head_cardinalities() {
        let total: usize = LabelHead::ALL.iter().map(|h| h.num_classes()).sum();
        assert_eq!(total, 186);
    }

    #[test]
    fn test_submission_order_is_consonant_root_vowel() {
        let names: Vec<_> = SUBMISSION_ORDER.iter().map(|h| h.column()).collect();
        assert_eq!(
            names,
            vec!["consonant_diacritic", "grapheme_root", "vowel_diacritic"]
        );
    }

    #[test]
    fn test_triple_validation() {
        assert!(LabelTriple::new(167, 10, 6).validate().is_ok());
        assert!(LabelTriple::new(168, 0, 0).validate().is_err());
        assert!(LabelTriple::new(0, 0, 7).validate().is_err());
    }

    #[test]
    fn test_raw_shape_pixels() {
        assert_eq!(ImageShape::RAW.pixels(), 32332);
    }
}
