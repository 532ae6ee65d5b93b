use ls_core::{Error, Raster, Result, Voxel};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::energy::Energy;
use crate::membership::Membership;
use crate::phase::{INVALID_PHASE, Phase};
use crate::topology::{AdmissiblePhases, admissible_phases, has_foreign_4_neighbor, neighbors8};

/// Relative gap between tracked and recomputed energy that is reported
/// as a warning when verification is on.
const ENERGY_DRIFT_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Upper bound on the number of sweeps.
    pub max_iterations: usize,
    /// Keep every object phase a single 4-connected component without
    /// holes. Single-slice fields only.
    pub preserve_topology: bool,
    /// Record the label raster every this many sweeps; 0 disables.
    pub snapshot_interval: usize,
    /// Recompute the full energy after every sweep and log the drift
    /// against the incrementally tracked value.
    pub verify_energy: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            preserve_topology: false,
            snapshot_interval: 0,
            verify_energy: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// The last sweep flipped nothing.
    Converged,
    /// The sweep budget ran out first.
    MaxIterReached,
}

#[derive(Debug, Clone)]
pub struct SolveReport {
    pub iterations: usize,
    pub termination: Termination,
    pub flips_per_sweep: Vec<usize>,
    pub initial_energy: f64,
    /// Initial energy plus the sum of all applied deltas.
    pub final_energy: f64,
    /// Label rasters (see [`Membership::to_labels`]): the initial state,
    /// every `snapshot_interval`-th sweep and the final state.
    pub snapshots: Vec<Raster<u16>>,
}

impl SolveReport {
    pub fn converged(&self) -> bool {
        self.termination == Termination::Converged
    }

    pub fn total_flips(&self) -> usize {
        self.flips_per_sweep.iter().sum()
    }
}

/// Greedy sweep optimizer.
///
/// Each sweep visits voxels in scan order (only contour voxels when
/// preserving topology) and moves each to the admissible phase with the
/// strictly smallest negative energy delta. Flips are applied in place,
/// so later voxels of a sweep see earlier flips.
#[derive(Debug, Clone, Default)]
pub struct Solver {
    cfg: SolverConfig,
}

impl Solver {
    pub fn new(cfg: SolverConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.cfg
    }

    /// Runs sweeps until one flips nothing or `max_iterations` is reached.
    ///
    /// `energy` must already be initialized for `phi`.
    pub fn solve<'a>(&self, energy: &mut dyn Energy<'a>, phi: &mut Membership) -> Result<SolveReport> {
        let cfg = &self.cfg;
        if cfg.preserve_topology && !phi.is_2d() {
            return Err(Error::UnsupportedConfiguration(format!(
                "topology preservation needs a single-slice field, got depth {}",
                phi.depth()
            )));
        }

        let initial_energy = energy.energy(phi);
        let (width, height, depth) = phi.dims();
        info!(
            width,
            height,
            depth,
            phases = phi.num_phases(),
            preserve_topology = cfg.preserve_topology,
            energy = initial_energy,
            "starting level-set solve"
        );

        let mut snapshots = Vec::new();
        if cfg.snapshot_interval > 0 {
            snapshots.push(phi.to_labels());
        }

        // Validity never changes, so the scan order is fixed.
        let scan: Vec<usize> = if cfg.preserve_topology {
            Vec::new()
        } else {
            valid_indices(phi)
        };

        let mut tracked = initial_energy;
        let mut flips_per_sweep = Vec::new();
        let mut termination = Termination::MaxIterReached;

        while flips_per_sweep.len() < cfg.max_iterations {
            let contour;
            let order = if cfg.preserve_topology {
                contour = contour_indices(phi);
                &contour
            } else {
                &scan
            };

            let mut flips = 0usize;
            for &idx in order {
                let v = phi.phases().coords_of(idx);
                if let Some(delta) = self.visit(energy, phi, v) {
                    tracked += delta;
                    flips += 1;
                }
            }
            flips_per_sweep.push(flips);

            let sweep = flips_per_sweep.len();
            debug!(sweep, visited = order.len(), flips, energy = tracked, "sweep done");
            if cfg.verify_energy {
                report_drift(sweep, tracked, energy.energy(phi));
            }

            if cfg.snapshot_interval > 0 && sweep % cfg.snapshot_interval == 0 {
                snapshots.push(phi.to_labels());
            }

            if flips == 0 {
                termination = Termination::Converged;
                break;
            }
        }

        let iterations = flips_per_sweep.len();
        if cfg.snapshot_interval > 0 && iterations % cfg.snapshot_interval != 0 {
            snapshots.push(phi.to_labels());
        }

        info!(
            iterations,
            ?termination,
            energy = tracked,
            "level-set solve finished"
        );

        Ok(SolveReport {
            iterations,
            termination,
            flips_per_sweep,
            initial_energy,
            final_energy: tracked,
            snapshots,
        })
    }

    /// Applies the best improving flip at `v`, if any, and returns its delta.
    fn visit<'a>(&self, energy: &mut dyn Energy<'a>, phi: &mut Membership, v: Voxel) -> Option<f64> {
        let old = phi.phase(v.x, v.y, v.z);
        let candidates = if self.cfg.preserve_topology {
            let nb = neighbors8(phi, v.x, v.y, v.z);
            admissible_phases(old, &nb, true, phi.num_phases())
        } else {
            AdmissiblePhases::all_except(old, phi.num_phases())
        };

        let mut best: Option<(Phase, f64)> = None;
        for p in candidates {
            let delta = energy.delta_e(v, p, phi);
            if best.is_none_or(|(_, b)| delta < b) {
                best = Some((p, delta));
            }
        }

        let (new_phase, delta) = best?;
        if delta >= 0.0 {
            return None;
        }

        trace!(x = v.x, y = v.y, z = v.z, old, new = new_phase, delta, "flip");
        energy.update_params(v, new_phase, phi);
        phi.set_phase(v.x, v.y, v.z, new_phase);
        Some(delta)
    }
}

fn valid_indices(phi: &Membership) -> Vec<usize> {
    phi.phases()
        .data()
        .iter()
        .enumerate()
        .filter(|&(_, &p)| p != INVALID_PHASE)
        .map(|(i, _)| i)
        .collect()
}

/// Valid voxels with a valid 4-neighbor of another phase, in scan order.
pub fn contour_indices(phi: &Membership) -> Vec<usize> {
    let mut out = Vec::new();
    for (idx, &p) in phi.phases().data().iter().enumerate() {
        if p == INVALID_PHASE {
            continue;
        }
        let v = phi.phases().coords_of(idx);
        if has_foreign_4_neighbor(p, &neighbors8(phi, v.x, v.y, v.z)) {
            out.push(idx);
        }
    }
    out
}

fn report_drift(sweep: usize, tracked: f64, computed: f64) {
    let drift = tracked - computed;
    if drift.abs() > ENERGY_DRIFT_TOLERANCE * computed.abs().max(1.0) {
        warn!(sweep, tracked, computed, drift, "tracked energy drifted from recomputation");
    } else {
        debug!(sweep, tracked, computed, drift, "energy verified");
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use ls_core::{Error, Raster};

    use super::{Solver, SolverConfig, Termination, contour_indices};
    use crate::energy::{CompositeEnergy, Energy, RegionFitting};
    use crate::membership::Membership;
    use crate::phase::{BG_PHASE, INVALID_PHASE};

    fn two_level_image(width: usize, height: usize) -> Raster<f32> {
        let data = (0..width * height)
            .map(|i| if i % width < width / 3 { 50.0 } else { 10.0 })
            .collect();
        Raster::from_vec_2d(width, height, data).expect("image")
    }

    #[test]
    fn volume_with_topology_fails_before_sweeping() {
        let mut phi = Membership::seeded(4, 4, 2, None).expect("seeded");
        let before = phi.clone();
        let img = Raster::new_fill(4, 4, 2, 1.0f32);
        let mut e = RegionFitting::new(1.0, 1.0);
        e.init(&img, &phi).expect("init");

        let solver = Solver::new(SolverConfig {
            preserve_topology: true,
            ..SolverConfig::default()
        });
        let err = solver.solve(&mut e, &mut phi).unwrap_err();
        assert!(matches!(err, Error::UnsupportedConfiguration(_)));
        assert_eq!(phi, before);
    }

    #[test]
    fn zero_budget_runs_no_sweep() {
        let img = two_level_image(9, 6);
        let mut phi = Membership::seeded(9, 6, 1, None).expect("seeded");
        let mut e = RegionFitting::new(1.0, 1.0);
        e.init(&img, &phi).expect("init");

        let report = Solver::new(SolverConfig {
            max_iterations: 0,
            snapshot_interval: 1,
            ..SolverConfig::default()
        })
        .solve(&mut e, &mut phi)
        .expect("solve");

        assert_eq!(report.iterations, 0);
        assert_eq!(report.termination, Termination::MaxIterReached);
        assert_eq!(report.snapshots.len(), 1);
    }

    #[test]
    fn tracked_energy_matches_recomputation() {
        let img = two_level_image(12, 9);
        let mut phi = Membership::seeded(12, 9, 1, None).expect("seeded");
        let mut e = CompositeEnergy::chan_vese(1.0, 1.0, 5.0, 0.5, &phi).expect("energy");
        e.init(&img, &phi).expect("init");

        let report = Solver::new(SolverConfig {
            verify_energy: true,
            ..SolverConfig::default()
        })
        .solve(&mut e, &mut phi)
        .expect("solve");

        assert!(report.converged());
        assert_eq!(report.flips_per_sweep.last(), Some(&0));
        assert!(report.final_energy < report.initial_energy);
        assert_relative_eq!(report.final_energy, e.energy(&phi), max_relative = 1e-9);
        assert!(phi.is_consistent());
    }

    #[test]
    fn snapshots_bracket_every_kth_sweep() {
        let img = two_level_image(15, 10);
        for k in 1..=3 {
            let mut phi = Membership::seeded(15, 10, 1, None).expect("seeded");
            let mut e = RegionFitting::new(1.0, 1.0);
            e.init(&img, &phi).expect("init");

            let report = Solver::new(SolverConfig {
                snapshot_interval: k,
                ..SolverConfig::default()
            })
            .solve(&mut e, &mut phi)
            .expect("solve");

            let n = report.iterations;
            let expected = 1 + n / k + usize::from(n % k != 0);
            assert_eq!(report.snapshots.len(), expected, "interval {k}");
            assert_eq!(report.snapshots.last(), Some(&phi.to_labels()));
        }
    }

    #[test]
    fn hitting_the_cap_reports_max_iter() {
        let img = two_level_image(15, 10);
        let mut phi = Membership::seeded(15, 10, 1, None).expect("seeded");
        let mut e = CompositeEnergy::chan_vese(1.0, 1.0, 0.0, 0.0, &phi).expect("energy");
        e.init(&img, &phi).expect("init");

        let report = Solver::new(SolverConfig {
            max_iterations: 1,
            ..SolverConfig::default()
        })
        .solve(&mut e, &mut phi)
        .expect("solve");

        assert_eq!(report.iterations, 1);
        assert!(report.flips_per_sweep[0] > 0);
        assert_eq!(report.termination, Termination::MaxIterReached);
    }

    #[test]
    fn contour_voxels_touch_another_phase() {
        let labels = Raster::from_vec_2d(
            4,
            4,
            vec![
                0u8, 0, 0, 0, //
                0, 1, 1, 0, //
                0, 1, 1, 0, //
                0, 0, 0, 0,
            ],
        )
        .expect("labels");
        let phi = Membership::from_labels(&labels, false, None).expect("field");
        let contour = contour_indices(&phi);

        // the 2x2 block and its 4-adjacent ring, corners excluded
        assert_eq!(contour, vec![1, 2, 4, 5, 6, 7, 8, 9, 10, 11, 13, 14]);
    }

    /// Object at (1,1), (2,1), (1,2) and an invalid voxel at (2,2); the
    /// centre is dark, so fitting alone wants it in the background.
    fn l_shape_around_invalid() -> (Raster<f32>, Membership) {
        let labels = Raster::from_vec_2d(3, 3, vec![0u8, 0, 0, 0, 1, 1, 0, 1, 0]).expect("labels");
        let mut mask = Raster::new_fill(3, 3, 1, 0u8);
        mask.set(2, 2, 0, 1).expect("in bounds");
        let phi = Membership::from_labels(&labels, false, Some(&mask)).expect("field");
        let img = Raster::from_vec_2d(3, 3, vec![0.0f32, 0.0, 0.0, 0.0, 0.0, 10.0, 0.0, 10.0, 0.0])
            .expect("image");
        (img, phi)
    }

    #[test]
    fn invalid_diagonal_does_not_hold_an_object_together() {
        let (img, mut phi) = l_shape_around_invalid();
        let before = phi.clone();
        let mut e = RegionFitting::new(1.0, 1.0);
        e.init(&img, &phi).expect("init");

        let report = Solver::new(SolverConfig {
            preserve_topology: true,
            ..SolverConfig::default()
        })
        .solve(&mut e, &mut phi)
        .expect("solve");

        assert_eq!(report.flips_per_sweep, vec![0]);
        assert_eq!(phi, before);
    }

    #[test]
    fn masked_scan_never_touches_invalid_voxels() {
        let (img, mut phi) = l_shape_around_invalid();
        let mut e = RegionFitting::new(1.0, 1.0);
        e.init(&img, &phi).expect("init");

        let report = Solver::new(SolverConfig::default())
            .solve(&mut e, &mut phi)
            .expect("solve");

        assert!(report.converged());
        assert_eq!(phi.phase(1, 1, 0), BG_PHASE);
        assert_eq!(phi.phase(2, 2, 0), INVALID_PHASE);
        assert_eq!(phi.invalid_count(), 1);
        assert!(phi.is_consistent());
    }

    #[test]
    fn invalid_voxels_are_not_contour() {
        let labels = Raster::new_fill(3, 3, 1, 0u8);
        let mut mask = Raster::new_fill(3, 3, 1, 0u8);
        mask.set(1, 1, 0, 1).expect("in bounds");
        let phi = Membership::from_labels(&labels, false, Some(&mask)).expect("field");
        assert!(contour_indices(&phi).is_empty());
    }
}
