//! Topology guard for single-slice fields.
//!
//! The 8-neighborhood of a pixel is stored counter-clockwise starting at
//! the right neighbor (see [`NEIGHBOR_OFFSETS`]), so even indices are the
//! 4-neighbors. Off-grid neighbors read as background.

use crate::membership::Membership;
use crate::phase::{BG_PHASE, INVALID_PHASE, Phase};

/// `(dx, dy)` of the eight neighbors in ring order.
pub const NEIGHBOR_OFFSETS: [(isize, isize); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];

/// Phases of the eight neighbors of `(x, y)` in slice `z`.
pub fn neighbors8(phi: &Membership, x: usize, y: usize, z: usize) -> [Phase; 8] {
    let (x, y, z) = (x as isize, y as isize, z as isize);
    NEIGHBOR_OFFSETS.map(|(dx, dy)| phi.phase_or_bg(x + dx, y + dy, z))
}

/// True when some valid 4-neighbor carries a phase other than `phase`.
pub fn has_foreign_4_neighbor(phase: Phase, nb: &[Phase; 8]) -> bool {
    nb.iter()
        .step_by(2)
        .any(|&p| p != phase && p != INVALID_PHASE)
}

/// Topological number T4 of `phase` in the neighborhood: the number of
/// 4-connected runs of `phase` that are 4-adjacent to the center.
///
/// A run ends wherever the ring moves to any other label, invalid
/// included. Diagonal members only count when they continue a run started
/// at a 4-neighbor.
pub fn topological_number(nb: &[Phase; 8], phase: Phase) -> usize {
    (0..8)
        .filter(|&i| {
            let next = nb[(i + 1) % 8];
            let prev = nb[(i + 7) % 8];
            nb[i] == phase && next != phase && (i % 2 == 0 || prev == phase)
        })
        .count()
}

/// Phases a voxel may move to, yielded in the order they should be tried.
#[derive(Debug, Clone)]
pub enum AdmissiblePhases {
    /// Topology-checked candidates taken from the 4-neighborhood.
    Listed { phases: [Phase; 4], len: usize, pos: usize },
    /// Every phase of the field except the current one.
    AllExcept { next: Phase, last: Phase, old: Phase },
}

impl AdmissiblePhases {
    /// Every phase in `BG_PHASE..=num_phases` other than `old`.
    pub fn all_except(old: Phase, num_phases: Phase) -> Self {
        Self::AllExcept {
            next: BG_PHASE,
            last: num_phases,
            old,
        }
    }

    fn listed() -> Self {
        Self::Listed {
            phases: [INVALID_PHASE; 4],
            len: 0,
            pos: 0,
        }
    }

    fn push(&mut self, p: Phase) {
        if let Self::Listed { phases, len, .. } = self
            && !phases[..*len].contains(&p)
        {
            phases[*len] = p;
            *len += 1;
        }
    }
}

impl Iterator for AdmissiblePhases {
    type Item = Phase;

    fn next(&mut self) -> Option<Phase> {
        match self {
            Self::Listed { phases, len, pos } => {
                if *pos == *len {
                    return None;
                }
                *pos += 1;
                Some(phases[*pos - 1])
            }
            Self::AllExcept { next, last, old } => {
                if *next == *old {
                    *next += 1;
                }
                if *next > *last {
                    return None;
                }
                *next += 1;
                Some(*next - 1)
            }
        }
    }
}

/// Phases voxel with phase `old` and neighborhood `nb` may switch to.
///
/// Without topology preservation every other phase up to `num_phases` is
/// admissible. With it, only valid 4-neighbor phases `p` with
/// `T4(p) == 1` qualify. An object phase may additionally be left only
/// when `T4(old) == 1`; background is never checked as the phase left.
pub fn admissible_phases(
    old: Phase,
    nb: &[Phase; 8],
    preserve_topology: bool,
    num_phases: Phase,
) -> AdmissiblePhases {
    if !preserve_topology {
        return AdmissiblePhases::all_except(old, num_phases);
    }

    let mut out = AdmissiblePhases::listed();
    let vacating_ok = old == BG_PHASE || topological_number(nb, old) == 1;
    if !vacating_ok {
        return out;
    }

    for &p in nb.iter().step_by(2) {
        if p == INVALID_PHASE || p == old {
            continue;
        }
        if topological_number(nb, p) == 1 {
            out.push(p);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use ls_core::Raster;

    use super::{admissible_phases, has_foreign_4_neighbor, neighbors8, topological_number};
    use crate::membership::Membership;
    use crate::phase::INVALID_PHASE;

    // Ring order: right, lower-right, below, lower-left, left, upper-left,
    // above, upper-right.

    #[test]
    fn single_run_and_split_runs() {
        // object on the right half of the ring
        let nb = [2, 2, 2, 1, 1, 1, 2, 2];
        assert_eq!(topological_number(&nb, 2), 1);
        assert_eq!(topological_number(&nb, 1), 1);

        // object left and right, background above and below: removing the
        // center would split the object
        let nb = [2, 1, 1, 1, 2, 1, 1, 1];
        assert_eq!(topological_number(&nb, 2), 2);
    }

    #[test]
    fn diagonal_only_neighbor_does_not_touch() {
        let nb = [1, 2, 1, 1, 1, 1, 1, 1];
        assert_eq!(topological_number(&nb, 2), 0);
    }

    #[test]
    fn invalid_neighbor_ends_a_run() {
        let nb = [2, INVALID_PHASE, 1, 1, 1, 1, 1, 1];
        assert_eq!(topological_number(&nb, 2), 1);
        assert_eq!(topological_number(&nb, 1), 1);

        // object right and below, linked only through an invalid diagonal
        let nb = [2, INVALID_PHASE, 2, 1, 1, 1, 1, 1];
        assert_eq!(topological_number(&nb, 2), 2);
        assert_eq!(admissible_phases(2, &nb, true, 2).count(), 0);
    }

    #[test]
    fn fully_surrounded_center_has_no_run() {
        let nb = [2; 8];
        assert_eq!(topological_number(&nb, 2), 0);
        assert!(!has_foreign_4_neighbor(2, &nb));
    }

    #[test]
    fn background_may_join_touching_object() {
        let nb = [2, 2, 2, 1, 1, 1, 1, 1];
        let got: Vec<_> = admissible_phases(1, &nb, true, 2).collect();
        assert_eq!(got, vec![2]);
    }

    #[test]
    fn background_may_not_close_a_ring() {
        // object on both sides: joining would merge two runs (or close a hole)
        let nb = [2, 1, 1, 1, 2, 1, 1, 1];
        assert_eq!(admissible_phases(1, &nb, true, 2).count(), 0);
    }

    #[test]
    fn object_may_not_split() {
        let nb = [2, 1, 1, 1, 2, 1, 1, 1];
        assert_eq!(admissible_phases(2, &nb, true, 2).count(), 0);

        let nb = [2, 2, 2, 1, 1, 1, 1, 1];
        let got: Vec<_> = admissible_phases(2, &nb, true, 2).collect();
        assert_eq!(got, vec![1]);
    }

    #[test]
    fn object_to_object_checks_both_phases() {
        // phase 2 below and right, phase 3 left and above
        let nb = [2, 2, 2, 1, 3, 3, 3, 1];
        let got: Vec<_> = admissible_phases(2, &nb, true, 3).collect();
        assert_eq!(got, vec![3]);

        // phase 3 split into two runs
        let nb = [2, 2, 3, 1, 1, 1, 3, 2];
        let got: Vec<_> = admissible_phases(2, &nb, true, 3).collect();
        assert_eq!(got, vec![1]);
    }

    #[test]
    fn object_may_not_leave_for_split_background() {
        // background right and left, phase 3 below, phase 2 above
        let nb = [1, 3, 3, 3, 1, 2, 2, 2];
        assert_eq!(topological_number(&nb, 1), 2);
        let got: Vec<_> = admissible_phases(2, &nb, true, 3).collect();
        assert_eq!(got, vec![3]);
    }

    #[test]
    fn unrestricted_lists_all_other_phases() {
        let nb = [1; 8];
        let got: Vec<_> = admissible_phases(3, &nb, false, 4).collect();
        assert_eq!(got, vec![1, 2, 4]);
        let got: Vec<_> = admissible_phases(4, &nb, false, 4).collect();
        assert_eq!(got, vec![1, 2, 3]);
    }

    #[test]
    fn neighbors_read_background_off_grid() {
        let labels = Raster::from_vec_2d(2, 2, vec![1u8, 1, 1, 1]).expect("labels");
        let phi = Membership::from_labels(&labels, true, None).expect("field");
        let nb = neighbors8(&phi, 0, 0, 0);
        assert_eq!(nb, [2, 2, 2, 1, 1, 1, 1, 1]);
    }
}
