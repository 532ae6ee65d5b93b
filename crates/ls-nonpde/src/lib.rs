//! Discrete (non-PDE) level-set segmentation with optional topology
//! preservation.
//!
//! A [`Membership`] assigns every voxel a phase: [`BG_PHASE`] for
//! background, `2..=num_phases` for objects and [`INVALID_PHASE`] for
//! excluded voxels. The [`Solver`] sweeps the grid and greedily moves
//! voxels to the phase that lowers an [`Energy`] the most.
//!
//! ## Energies
//! - [`RegionFitting`]: piecewise-constant (Chan-Vese) data term.
//! - [`GaussianFitting`]: per-phase mean and variance data term.
//! - [`ForwardLength2d`] / [`ForwardLength3d`]: forward-difference boundary
//!   length; [`KbLength`]: Cauchy-Crofton metric length for two-phase 2D
//!   fields. [`length_energy`] picks one for a field.
//! - [`SizeEnergy`]: object volume penalty.
//! - [`CompositeEnergy`]: ordered sum of the above.
//!
//! ## Topology
//! With `preserve_topology`, only contour voxels are visited and a flip is
//! admitted only if the topological number test in [`topology`] shows it
//! keeps every object phase one 4-connected component without holes.
//! Single-slice fields only.
//!
//! ## Front-end
//! [`segment`] picks an initialization, assembles the configured energy,
//! solves and keeps the starting labels for [`overlay`] rendering.

mod membership;
mod phase;
mod segmentation;
mod solver;

pub mod energy;
pub mod topology;

pub use energy::{
    CompositeEnergy, Energy, ForwardLength2d, ForwardLength3d, GaussianFitting, KbLength,
    KbNeighborhood, LengthStencil, RegionFitting, SizeEnergy, length_energy,
};
pub use membership::Membership;
pub use phase::{BG_PHASE, INVALID_PHASE, MAX_PHASES, Phase, is_object};
pub use segmentation::{
    FittingKind, InitSource, Initialization, Segmentation, SegmentationConfig, initialize,
    overlay, segment,
};
pub use solver::{SolveReport, Solver, SolverConfig, Termination, contour_indices};
