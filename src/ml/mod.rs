// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// This layer contains ALL Burn framework specific code.
// The data and domain layers hand over ndarray arrays; only
// this layer turns them into tensors.
//
// What's in this layer:
//
//   model.rs      — The convolutional network
//                   • conv + ReLU + max-pool blocks (same padding)
//                   • dropout, then two dense ReLU layers
//                   • three linear heads: root (168),
//                     vowel (11), consonant (7)
//
//   batcher.rs    — ndarray → tensor conversion
//                   Flattened images become [N, 1, H, W],
//                   one-hot labels become class indices
//
//   trainer.rs    — The training loop
//                   Summed cross-entropy over the heads, Adam,
//                   per-epoch validation and checkpointing.
//                   Implements the MultiHeadModel trait.
//
//   inferencer.rs — The inference engine
//                   Loads a checkpoint and returns softmax
//                   probabilities per head
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)

/// Convolutional network with three classification heads
pub mod model;

/// Converts ndarray batches into Burn tensors
pub mod batcher;

/// Training loop with validation and checkpointing
pub mod trainer;

/// Inference engine — loads checkpoint and predicts probabilities
pub mod inferencer;
