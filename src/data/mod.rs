// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from raw microscopy frames to GPU-ready batches.
//
// Preparation (once per raw dataset):
//
//   images/*.tif ──► frames    → (frames, rows, cols) stack
//                      │
//                      ▼
//                    summary   → corr / mean / median / max images
//
//   regions/*.json ─► targets  → soma / border / centroid masks
//                      │
//                      ▼
//                    loader    → TrainingSample written as bincode
//
// Training (every epoch):
//
//   loader     → TrainingSamples held in memory
//   splitter   → train / test datasets
//   generator  → random augmented windows (Burn Dataset)
//   batcher    → NCHW tensors (Burn Batcher)
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Per-frame TIFF stack loading
pub mod frames;

/// Temporal summary images (correlation, mean, median, max)
pub mod summary;

/// Min/max scaling and percentile contrast enhancement
pub mod contrast;

/// Soma, border and centroid masks from labelled regions
pub mod targets;

/// Prepared sample files on disk
pub mod loader;

/// Random rotation / scaling of subframes
pub mod augment;

/// Burn Dataset producing augmented training windows
pub mod generator;

/// Burn Batcher stacking windows into tensors
pub mod batcher;

/// Shuffles and splits datasets into train/test sets
pub mod splitter;
