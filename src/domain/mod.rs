// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types and traits that define what the pipeline
// talks about: label heads, image geometry, the per-head
// target bundle, the error vocabulary, and the collaborator
// traits (model and metrics sink) the runner is written against.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - ndarray is allowed, it is the shared array currency
//     between the data layer and the ml layer

/// Label heads, label triples and image geometry
pub mod labels;

/// Ordered head-name → one-hot array mapping
pub mod bundle;

/// Pipeline error enum (missing label, shape mismatch, validation)
pub mod error;

/// Model and metrics-sink collaborator traits
pub mod traits;
