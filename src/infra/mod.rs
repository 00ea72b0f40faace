// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns used by the training and prediction
// workflows but owned by neither:
//
//   checkpoint.rs — Saving, loading and pruning model weights
//                   with Burn's CompactRecorder; persists the
//                   TrainConfig so a run can be reloaded.
//
//   metrics.rs    — Per-epoch CSV log and the final loss
//                   history JSON.
//
//   tracker.rs    — Optional remote experiment tracking over
//                   HTTP.
//
//   visualize.rs  — Side-by-side input / target / prediction
//                   PNGs for visual QA.
//
// Reference: Burn Book §5 (Checkpointing)

/// Model checkpoint saving, loading and best-only retention
pub mod checkpoint;

/// Training metrics CSV logger and loss history
pub mod metrics;

/// Remote experiment tracking service client
pub mod tracker;

/// Prediction image rendering
pub mod visualize;
