// ============================================================
// Layer 4 — Label Table
// ============================================================
// Loads the per-sample label CSV and indexes it by image_id.
//
// Expected header (extra columns such as `grapheme` are ignored):
//   image_id,grapheme_root,vowel_diacritic,consonant_diacritic,grapheme
//
// Every row is range-checked against the head cardinalities so a
// corrupt label file fails here rather than as an out-of-bounds
// one-hot write later.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::domain::error::PipelineError;
use crate::domain::labels::LabelTriple;

#[derive(Debug, Deserialize)]
struct LabelRow {
    image_id: String,
    grapheme_root: usize,
    vowel_diacritic: usize,
    consonant_diacritic: usize,
}

/// Label triples keyed by sample identifier.
#[derive(Debug, Clone, Default)]
pub struct LabelTable {
    rows: HashMap<String, LabelTriple>,
}

impl LabelTable {
    /// Read and validate a label CSV.
    pub fn from_csv(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("Cannot open label table '{}'", path.display()))?;

        let mut rows = HashMap::new();
        for (line, record) in reader.deserialize::<LabelRow>().enumerate() {
            let row = record
                .with_context(|| format!("Bad row {} in '{}'", line + 1, path.display()))?;
            let triple = LabelTriple::new(
                row.grapheme_root,
                row.vowel_diacritic,
                row.consonant_diacritic,
            );
            triple
                .validate()
                .with_context(|| format!("Label for '{}' is out of range", row.image_id))?;
            rows.insert(row.image_id, triple);
        }

        let table = Self { rows };
        tracing::info!("Loaded {} labels from '{}'", table.len(), path.display());
        Ok(table)
    }

    /// Build a table from in-memory pairs, validating every triple.
    #[cfg(test)]
    pub fn from_pairs<I, S>(pairs: I) -> std::result::Result<Self, PipelineError>
    where
        I: IntoIterator<Item = (S, LabelTriple)>,
        S: Into<String>,
    {
        let mut rows = HashMap::new();
        for (id, triple) in pairs {
            triple.validate()?;
            rows.insert(id.into(), triple);
        }
        Ok(Self { rows })
    }

    pub fn get(&self, image_id: &str) -> Option<LabelTriple> {
        self.rows.get(image_id).copied()
    }

    /// Like `get`, but a missing id is a MissingLabel error.
    pub fn require(&self, image_id: &str) -> std::result::Result<LabelTriple, PipelineError> {
        self.get(image_id).ok_or_else(|| PipelineError::MissingLabel {
            image_id: image_id.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(content: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn test_reads_rows_and_ignores_grapheme_column() {
        let f = write_csv(
            "image_id,grapheme_root,vowel_diacritic,consonant_diacritic,grapheme\n\
             Train_0,15,9,5,x\n\
             Train_1,159,0,0,y\n",
        );
        let table = LabelTable::from_csv(f.path()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("Train_0"), Some(LabelTriple::new(15, 9, 5)));
        assert_eq!(table.get("Train_1"), Some(LabelTriple::new(159, 0, 0)));
    }

    #[test]
    fn test_out_of_range_label_rejected() {
        let f = write_csv(
            "image_id,grapheme_root,vowel_diacritic,consonant_diacritic,grapheme\n\
             Train_0,15,11,5,x\n",
        );
        assert!(LabelTable::from_csv(f.path()).is_err());
    }

    #[test]
    fn test_require_missing_id() {
        let table = LabelTable::from_pairs(vec![("a", LabelTriple::new(1, 1, 1))]).unwrap();
        match table.require("abc123") {
            Err(PipelineError::MissingLabel { image_id }) => assert_eq!(image_id, "abc123"),
            other => panic!("expected MissingLabel, got {other:?}"),
        }
    }
}
