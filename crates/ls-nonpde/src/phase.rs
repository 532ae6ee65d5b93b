/// Phase label of a voxel.
pub type Phase = u16;

/// Voxels excluded from every phase for the whole solve.
pub const INVALID_PHASE: Phase = 0;

/// The background phase; object phases are `BG_PHASE + 1 ..= num_phases`.
pub const BG_PHASE: Phase = 1;

/// Largest number of phases (background included) a field may hold.
pub const MAX_PHASES: usize = i16::MAX as usize;

#[inline]
pub fn is_object(phase: Phase) -> bool {
    phase > BG_PHASE
}
