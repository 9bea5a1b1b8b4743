// ============================================================
// Layer 4 — Parquet Shard Loader
// ============================================================
// Reads one column-per-pixel image archive, joins every row with
// the label table, and produces train/validation arrays.
//
// Archive layout (one row per sample):
//   image_id | "0" | "1" | ... | "32331"
//   ---------+-----+-----+-----+--------
//   Train_0  | 254 | 253 | ... |   251
//
// How a shard is loaded:
//
//   open archive      → row count + column layout from metadata
//       │
//       ▼
//   SplitPlan         → every row index gets a destination
//       │               (train row i / validation row j)
//       ▼
//   stream batches    → parquet record batches of N rows
//       │
//       ▼
//   per row:  label lookup (MissingLabel if absent)
//             → binarize/resize → normalize → write into
//               its destination row
//       │
//       ▼
//   one-hot encode    → root, vowel, consonant (train, val) pairs
//
// Only one copy of the pixel data is ever resident: rows go from
// the record batch directly into the preallocated split arrays.

use std::fs::File;
use std::path::{Path, PathBuf};

use arrow::array::{Array, ArrayRef, StringArray, UInt8Array};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use ndarray::{Array2, ArrayViewMut1};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use crate::data::encoder::OneHotEncoder;
use crate::data::labels::LabelTable;
use crate::data::preprocessor::ImagePreprocessor;
use crate::data::splitter::{Partition, SplitPlan};
use crate::domain::bundle::TargetBundle;
use crate::domain::error::{PipelineError, Result};
use crate::domain::labels::{ImageShape, LabelHead, LabelTriple};

/// Name of the sample identifier column
pub const ID_COLUMN: &str = "image_id";

/// Parquet path of shard `index` for a split prefix (`train` / `test`).
pub fn shard_path(data_dir: &Path, prefix: &str, index: usize) -> PathBuf {
    data_dir.join(format!("{prefix}_image_data_{index}.parquet"))
}

fn archive_err(path: &Path, e: impl std::fmt::Display) -> PipelineError {
    PipelineError::Archive(format!("'{}': {}", path.display(), e))
}

// ─── ImageArchive ─────────────────────────────────────────────────────────────
/// A column-per-pixel parquet archive of fixed-shape images.
#[derive(Debug, Clone)]
pub struct ImageArchive {
    path: PathBuf,
    shape: ImageShape,
    rows: usize,
    id_column: usize,
    /// Pixel columns in schema order, which is row-major pixel order
    pixel_columns: Vec<usize>,
}

impl ImageArchive {
    /// Read the archive metadata and check the column layout against `shape`.
    pub fn open(path: &Path, shape: ImageShape) -> Result<Self> {
        let file = File::open(path)?;
        let builder =
            ParquetRecordBatchReaderBuilder::try_new(file).map_err(|e| archive_err(path, e))?;

        let rows = usize::try_from(builder.metadata().file_metadata().num_rows())
            .map_err(|e| archive_err(path, e))?;

        let schema = builder.schema();
        let id_column = schema
            .index_of(ID_COLUMN)
            .map_err(|_| archive_err(path, format!("no '{ID_COLUMN}' column")))?;
        let pixel_columns: Vec<usize> =
            (0..schema.fields().len()).filter(|&i| i != id_column).collect();

        if pixel_columns.len() != shape.pixels() {
            return Err(PipelineError::Validation(format!(
                "'{}' has {} pixel columns, expected {} for {} images",
                path.display(),
                pixel_columns.len(),
                shape.pixels(),
                shape
            )));
        }

        tracing::debug!("Opened '{}': {} rows of {}", path.display(), rows, shape);
        Ok(Self {
            path: path.to_path_buf(),
            shape,
            rows,
            id_column,
            pixel_columns,
        })
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Stream every row in file order as (row index, image id, raw pixels).
    ///
    /// Record batches of `batch_rows` rows are decoded one at a time and
    /// dropped before the next is read.
    pub fn for_each_image<F>(&self, batch_rows: usize, mut visit: F) -> Result<()>
    where
        F: FnMut(usize, &str, &[u8]) -> Result<()>,
    {
        let file = File::open(&self.path)?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .map_err(|e| archive_err(&self.path, e))?
            .with_batch_size(batch_rows.max(1))
            .build()
            .map_err(|e| archive_err(&self.path, e))?;

        let mut row = 0usize;
        let mut pixels = vec![0u8; self.shape.pixels()];

        for batch in reader {
            let batch = batch.map_err(|e| archive_err(&self.path, e))?;

            let ids = cast(batch.column(self.id_column), &DataType::Utf8)
                .map_err(|e| archive_err(&self.path, e))?;
            let ids = ids
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(|| archive_err(&self.path, "image_id is not a string column"))?;

            let columns: Vec<ArrayRef> = self
                .pixel_columns
                .iter()
                .map(|&c| cast(batch.column(c), &DataType::UInt8))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| archive_err(&self.path, e))?;
            let columns: Vec<&UInt8Array> = columns
                .iter()
                .map(|c| c.as_any().downcast_ref::<UInt8Array>())
                .collect::<Option<_>>()
                .ok_or_else(|| archive_err(&self.path, "pixel column is not numeric"))?;

            for r in 0..batch.num_rows() {
                if ids.is_null(r) {
                    return Err(PipelineError::Validation(format!(
                        "row {row} has no image_id"
                    )));
                }
                for (dst, column) in pixels.iter_mut().zip(&columns) {
                    if column.is_null(r) {
                        return Err(PipelineError::Validation(format!(
                            "row {row} ('{}') has a missing or out-of-range pixel",
                            ids.value(r)
                        )));
                    }
                    *dst = column.value(r);
                }
                visit(row, ids.value(r), &pixels)?;
                row += 1;
            }
        }

        Ok(())
    }

    /// Preprocess every image into one table, keeping ids in file order.
    /// Used for unlabeled (test) archives.
    ///
    /// Raw images are preprocessed `batch_rows` at a time.
    pub fn read_features(
        &self,
        preprocessor: &ImagePreprocessor,
        normalize: bool,
        batch_rows: usize,
    ) -> Result<(Vec<String>, Array2<f32>)> {
        let width = preprocessor.output_shape().pixels();
        let chunk = batch_rows.max(1);
        let mut ids = Vec::with_capacity(self.rows);
        let mut features = Array2::<f32>::zeros((self.rows, width));
        let mut pending: Vec<Vec<u8>> = Vec::with_capacity(chunk);
        let mut filled = 0usize;

        let mut flush = |pending: &mut Vec<Vec<u8>>, features: &mut Array2<f32>| -> Result<()> {
            let table = preprocessor.process_batch(pending.drain(..))?;
            for (offset, processed) in table.outer_iter().enumerate() {
                fill_row(features.row_mut(filled + offset), processed.iter().copied(), normalize);
            }
            filled += table.nrows();
            Ok(())
        };

        self.for_each_image(batch_rows, |row, id, pixels| {
            if row >= features.nrows() {
                return Err(PipelineError::Validation(format!(
                    "row {row} beyond metadata count"
                )));
            }
            ids.push(id.to_string());
            pending.push(pixels.to_vec());
            if pending.len() == chunk {
                flush(&mut pending, &mut features)?;
            }
            Ok(())
        })?;
        if !pending.is_empty() {
            flush(&mut pending, &mut features)?;
        }

        Ok((ids, features))
    }
}

/// Copy one processed image into a feature row, scaling to [0, 1] if asked.
fn fill_row(
    mut dest: ArrayViewMut1<'_, f32>,
    processed: impl IntoIterator<Item = u8>,
    normalize: bool,
) {
    let scale = if normalize { 1.0 / 255.0 } else { 1.0 };
    for (d, p) in dest.iter_mut().zip(processed) {
        *d = p as f32 * scale;
    }
}

// ─── ShardSplit ───────────────────────────────────────────────────────────────
/// Train/validation arrays of one shard.
#[derive(Debug, Clone)]
pub struct ShardSplit {
    pub x_train: Array2<f32>,
    pub x_val: Array2<f32>,
    /// (train, validation) one-hot labels
    pub root: (Array2<f32>, Array2<f32>),
    pub vowel: (Array2<f32>, Array2<f32>),
    pub consonant: (Array2<f32>, Array2<f32>),
}

impl ShardSplit {
    pub fn n_train(&self) -> usize {
        self.x_train.nrows()
    }

    pub fn n_val(&self) -> usize {
        self.x_val.nrows()
    }

    /// Split into (train images, validation images, train targets, validation targets).
    /// Targets are keyed by output name in head order.
    pub fn into_parts(self) -> (Array2<f32>, Array2<f32>, TargetBundle, TargetBundle) {
        let mut train = TargetBundle::new();
        let mut val = TargetBundle::new();
        for (head, (t, v)) in LabelHead::ALL
            .into_iter()
            .zip([self.root, self.vowel, self.consonant])
        {
            train.insert(head.output_name(), t);
            val.insert(head.output_name(), v);
        }
        (self.x_train, self.x_val, train, val)
    }
}

// ─── ShardLoader ──────────────────────────────────────────────────────────────
/// Settings that turn an archive into a split.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    pub preprocessor: ImagePreprocessor,
    /// Divide pixels by 255
    pub normalize: bool,
    pub validation_fraction: f64,
    /// Rows per decoded parquet record batch
    pub read_batch_rows: usize,
}

/// Joins archives with a label table and splits them.
pub struct ShardLoader<'a> {
    labels: &'a LabelTable,
    config: &'a LoaderConfig,
}

impl<'a> ShardLoader<'a> {
    pub fn new(labels: &'a LabelTable, config: &'a LoaderConfig) -> Self {
        Self { labels, config }
    }

    /// Load one shard. The split is driven by `seed`.
    ///
    /// Any archive row without a label aborts the load with MissingLabel.
    pub fn load(&self, path: &Path, seed: u64) -> Result<ShardSplit> {
        let cfg = self.config;
        let archive = ImageArchive::open(path, cfg.preprocessor.input_shape())?;
        let plan = SplitPlan::new(archive.len(), cfg.validation_fraction, seed)?;
        let width = cfg.preprocessor.output_shape().pixels();

        tracing::info!(
            "Loading '{}': {} rows → {} train / {} validation",
            path.display(),
            plan.total(),
            plan.n_train(),
            plan.n_val()
        );

        let mut x_train = Array2::<f32>::zeros((plan.n_train(), width));
        let mut x_val = Array2::<f32>::zeros((plan.n_val(), width));
        let mut y_train = vec![LabelTriple::default(); plan.n_train()];
        let mut y_val = vec![LabelTriple::default(); plan.n_val()];

        archive.for_each_image(cfg.read_batch_rows, |row, id, pixels| {
            let triple = self.labels.require(id)?;
            let (partition, dest) = plan.destination(row).ok_or_else(|| {
                PipelineError::Validation(format!("row {row} beyond metadata count"))
            })?;

            let processed = cfg.preprocessor.process_image(pixels)?;
            match partition {
                Partition::Train => {
                    fill_row(x_train.row_mut(dest), processed.iter().copied(), cfg.normalize);
                    y_train[dest] = triple;
                }
                Partition::Validation => {
                    fill_row(x_val.row_mut(dest), processed.iter().copied(), cfg.normalize);
                    y_val[dest] = triple;
                }
            }
            Ok(())
        })?;

        let [root, vowel, consonant] = LabelHead::ALL.map(|head| {
            let encoder = OneHotEncoder::for_head(head);
            let column = |rows: &[LabelTriple]| rows.iter().map(|t| t.get(head)).collect::<Vec<_>>();
            let train_column = column(&y_train);
            tracing::debug!(
                "{}: {} of {} classes present in the training split",
                head.column(),
                OneHotEncoder::fit(&train_column).categories().len(),
                encoder.width()
            );
            Ok::<_, PipelineError>((
                encoder.transform(&train_column)?,
                encoder.transform(&column(&y_val))?,
            ))
        });

        Ok(ShardSplit {
            x_train,
            x_val,
            root: root?,
            vowel: vowel?,
            consonant: consonant?,
        })
    }
}
