//! Foundational primitives for discrete level-set segmentation.
//!
//! ## Rasters
//! [`Raster`] is a dense `width × height × depth` grid stored x-fastest,
//! then y, then z. 2D images are rasters with `depth == 1`; image decoding
//! and conversion to `f32` happen at the edges (see the gallery binary).
//!
//! ## Neighborhood access
//! Stencil code addresses neighbors with signed coordinates through
//! [`Raster::get_signed`], which yields `None` off-grid. Callers decide
//! what an off-grid neighbor means (the segmentation engine treats it as
//! background).
//!
//! ## Errors
//! All crates in the workspace share [`Error`].

mod error;
mod raster;
mod voxel;

pub use error::{Error, Result};
pub use raster::Raster;
pub use voxel::{Region, Voxel};
