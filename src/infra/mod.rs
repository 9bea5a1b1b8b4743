// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Handles all cross-cutting concerns that don't belong in
// any specific business layer:
//
//   checkpoint.rs   — Saving and loading model weights
//                     Uses Burn's CompactRecorder to
//                     serialise model parameters to disk.
//                     Also saves/loads ExperimentConfig as JSON
//                     so `submit` can rebuild the model.
//
//   tracking.rs     — Append-only run tracker
//                     Experiments, runs, params and per-epoch
//                     metric lines as plain files.
//
//   run_scraper.rs  — Reads the tracker layout back and
//                     collects final accuracies per experiment.
//
//   submission.rs   — row_id,target CSV writer.
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// File-based experiment / run / metric store
pub mod tracking;

/// Final-accuracy scraper over the tracking store
pub mod run_scraper;

/// Submission CSV writer
pub mod submission;
