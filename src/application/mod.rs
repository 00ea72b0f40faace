// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates all the other layers to accomplish
// a specific goal (preparing data, training or predicting).
//
// Rules for this layer:
//   - No ML math or model code here
//   - No printing here (that's Layer 1)
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// Raw recordings → prepared samples
pub mod prepare_use_case;

// The training workflow
pub mod train_use_case;

// Rendering predictions of a finished run
pub mod predict_use_case;
