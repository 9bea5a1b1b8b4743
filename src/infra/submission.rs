// ============================================================
// Layer 6 — Submission Writer
// ============================================================
// Writes predictions in the two-column format:
//
//   row_id,target
//   Test_0_consonant_diacritic,0
//   Test_0_grapheme_root,3
//   Test_0_vowel_diacritic,0
//   Test_1_consonant_diacritic,0
//   ...
//
// One row per (image, component); components always appear in
// the order consonant, root, vowel for every image.

use anyhow::{Context, Result};
use serde::Serialize;
use std::{fs::File, path::Path};

use crate::domain::labels::{LabelTriple, SUBMISSION_ORDER};

#[derive(Debug, Serialize)]
struct SubmissionRow<'a> {
    row_id: &'a str,
    target: usize,
}

/// Streams submission rows to any writer; the header is written on first use.
pub struct SubmissionWriter<W: std::io::Write> {
    csv: csv::Writer<W>,
    rows: usize,
}

impl SubmissionWriter<File> {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("Cannot create submission '{}'", path.display()))?;
        Ok(Self::new(file))
    }
}

impl<W: std::io::Write> SubmissionWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { csv: csv::Writer::from_writer(writer), rows: 0 }
    }

    /// Append the three component rows of one image.
    pub fn write_image(&mut self, image_id: &str, labels: LabelTriple) -> Result<()> {
        for head in SUBMISSION_ORDER {
            let row_id = format!("{image_id}_{}", head.column());
            self.csv.serialize(SubmissionRow { row_id: &row_id, target: labels.get(head) })?;
            self.rows += 1;
        }
        Ok(())
    }

    /// Rows written so far, header excluded
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn finish(mut self) -> Result<W> {
        self.csv.flush()?;
        self.csv
            .into_inner()
            .map_err(|e| anyhow::anyhow!("Cannot flush submission: {}", e.error()))
    }
}
