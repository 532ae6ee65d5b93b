//! Umbrella crate for the `levelset` workspace.
//!
//! Re-exports the raster primitives, the labeling utilities and the
//! non-PDE segmentation engine.

pub use ls_core::*;
pub use ls_label::*;
pub use ls_nonpde::*;
