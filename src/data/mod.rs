// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// This layer handles everything from raw parquet shards
// all the way to per-head one-hot label batches.
//
// The pipeline flows in this order:
//
//   train.csv + train_image_data_{i}.parquet
//       │
//       ▼
//   LabelTable         → image_id → (root, vowel, consonant)
//       │
//       ▼
//   ImageArchive       → streams raw 137x236 grayscale rows
//       │
//       ▼
//   ImagePreprocessor  → Otsu binarization + area resize
//       │
//       ▼
//   SplitPlan          → seeded train/validation row assignment
//       │
//       ▼
//   OneHotEncoder      → one one-hot array per label head
//       │
//       ▼
//   ImageAugmenter     → random rotation / shift, endless batches
//       │
//       ▼
//   MultiOutputGenerator → splits batch labels back per head
//
// Nothing here touches Burn. Arrays stay in ndarray until the
// ml layer converts a batch into tensors.

/// Reads parquet image shards and joins them with labels
pub mod loader;

/// Otsu binarization and area resizing
pub mod preprocessor;

/// Label CSV lookup table
pub mod labels;

/// Fixed-cardinality one-hot encoding per head
pub mod encoder;

/// Seeded train/validation split plans
pub mod splitter;

/// Random affine augmentation and batch streaming
pub mod augmenter;

/// Multi-output adapter over the single-target augmenter
pub mod generator;
