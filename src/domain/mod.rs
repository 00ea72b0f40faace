// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Pure Rust structs and traits that define the core concepts
// of the system: labelled datasets, prepared training samples
// and the per-epoch metrics produced by training.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O or network calls
//   - Only plain Rust structs, enums, and traits
//
// Think of this layer as the "dictionary" of the system —
// it defines what things ARE, not how they work.

// Raw dataset metadata and labelled cell regions
pub mod labels;

// Prepared multi-channel training samples
pub mod sample;

// Core abstractions (traits) that other layers implement
pub mod traits;
