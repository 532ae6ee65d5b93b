//! Label-raster utilities used to initialize and inspect segmentations.
//!
//! - [`binarize`] thresholds an intensity raster into a 0/1 mask.
//! - [`label_components`] splits a mask into connected components.
//! - [`boundary_mask`] marks voxels whose in-slice 8-neighborhood holds a
//!   different label, for contour overlays.
//!
//! Connectivity options:
//! - [`Connectivity::C4`]: axis-aligned neighbors only (6 neighbors in 3D).
//! - [`Connectivity::C8`]: includes diagonals (26 neighbors in 3D).

mod boundary;
mod components;

pub use boundary::boundary_mask;
pub use components::{ComponentConfig, Connectivity, Labeling, binarize, label_components};
