// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// This layer contains the Burn model and training code.
//
//   blocks.rs         — conv blocks, residual bottleneck, up-sampling
//   unet.rs           — U-Net with optional high-pass input filter
//   leap.rs           — LEAP encoder-decoder
//   hourglass.rs      — single and stacked hourglass networks
//   model.rs          — Architecture enum, ModelSpec, common trait + loss
//   early_stopping.rs — patience on validation loss
//   trainer.rs        — train / validate / checkpoint loop
//   inferencer.rs     — reload a run and render predictions
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Ronneberger et al. (2015) U-Net
//            Newell et al. (2016) Stacked Hourglass Networks
//            Pereira et al. (2019) LEAP

pub mod blocks;
pub mod unet;
pub mod leap;
pub mod hourglass;
pub mod model;
pub mod early_stopping;
pub mod trainer;
pub mod inferencer;
