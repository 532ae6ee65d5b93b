use ls_core::{Raster, Result, Voxel};

use super::{Energy, check_image, check_weight};
use crate::membership::Membership;
use crate::phase::{BG_PHASE, INVALID_PHASE, Phase};

/// Piecewise-constant (Chan-Vese) region fitting:
/// `E = sum_v lambda[phase(v)] * (I(v) - c[phase(v)])^2`, with `c[p]` the
/// mean intensity of phase `p`.
#[derive(Debug, Clone)]
pub struct RegionFitting<'a> {
    lambda_bg: f64,
    lambda_fg: f64,
    phase_lambdas: Vec<f64>,
    lambda: Vec<f64>,
    means: Vec<f64>,
    image: &'a [f32],
}

impl RegionFitting<'_> {
    /// Weight `lambda_bg` for background and `lambda_fg` for every object
    /// phase.
    pub fn new(lambda_bg: f64, lambda_fg: f64) -> Self {
        Self {
            lambda_bg,
            lambda_fg,
            phase_lambdas: Vec::new(),
            lambda: Vec::new(),
            means: Vec::new(),
            image: &[],
        }
    }

    /// Per-phase weights: entry 0 is background, entry `k` the `k`-th
    /// object phase. Phases beyond the list keep the shared weights.
    pub fn with_phase_lambdas(mut self, phase_lambdas: Vec<f64>) -> Self {
        self.phase_lambdas = phase_lambdas;
        self
    }

    pub fn mean(&self, phase: Phase) -> Option<f64> {
        self.means.get(phase as usize).copied()
    }

    pub fn lambda(&self, phase: Phase) -> Option<f64> {
        self.lambda.get(phase as usize).copied()
    }

    fn resolve_lambdas(&mut self, num_phases: Phase) -> Result<()> {
        self.lambda = vec![0.0; num_phases as usize + 1];
        for p in BG_PHASE..=num_phases {
            let fallback = if p == BG_PHASE {
                self.lambda_bg
            } else {
                self.lambda_fg
            };
            let l = self
                .phase_lambdas
                .get((p - BG_PHASE) as usize)
                .copied()
                .unwrap_or(fallback);
            check_weight("lambda", l)?;
            self.lambda[p as usize] = l;
        }
        Ok(())
    }
}

impl<'a> Energy<'a> for RegionFitting<'a> {
    fn name(&self) -> &'static str {
        "region fitting"
    }

    fn init(&mut self, image: &'a Raster<f32>, phi: &Membership) -> Result<()> {
        check_image(image, phi)?;
        self.image = image.data();
        self.resolve_lambdas(phi.num_phases())?;
        self.estimate_params(phi);
        Ok(())
    }

    fn delta_e(&self, v: Voxel, new_phase: Phase, phi: &Membership) -> f64 {
        let old = phi.phase(v.x, v.y, v.z);
        if old == new_phase || old == INVALID_PHASE {
            return 0.0;
        }
        let val = self.image[phi.phases().index_of(v.x, v.y, v.z)] as f64;

        let n_new = phi.count(new_phase) as f64;
        let d_new = val - self.means[new_phase as usize];
        let mut delta = self.lambda[new_phase as usize] * d_new * d_new * n_new / (n_new + 1.0);

        let n_old = phi.count(old);
        if n_old > 1 {
            let n_old = n_old as f64;
            let d_old = val - self.means[old as usize];
            delta -= self.lambda[old as usize] * d_old * d_old * n_old / (n_old - 1.0);
        }
        delta
    }

    fn energy(&self, phi: &Membership) -> f64 {
        phi.phases()
            .data()
            .iter()
            .zip(self.image)
            .filter(|&(&p, _)| p != INVALID_PHASE)
            .map(|(&p, &val)| {
                let d = val as f64 - self.means[p as usize];
                self.lambda[p as usize] * d * d
            })
            .sum()
    }

    fn update_params(&mut self, v: Voxel, new_phase: Phase, phi: &Membership) {
        let old = phi.phase(v.x, v.y, v.z);
        if old == new_phase || old == INVALID_PHASE {
            return;
        }
        let val = self.image[phi.phases().index_of(v.x, v.y, v.z)] as f64;

        let n_old = phi.count(old);
        if n_old > 1 {
            let c = &mut self.means[old as usize];
            *c += (*c - val) / (n_old as f64 - 1.0);
        }

        let n_new = phi.count(new_phase) as f64;
        let c = &mut self.means[new_phase as usize];
        *c -= (*c - val) / (n_new + 1.0);
    }

    fn estimate_params(&mut self, phi: &Membership) {
        self.means = phase_means(self.image, phi);
    }
}

/// Mean intensity per phase (index = phase); empty phases get 0.
pub(crate) fn phase_means(image: &[f32], phi: &Membership) -> Vec<f64> {
    let n = phi.num_phases() as usize + 1;
    let mut sums = vec![0.0f64; n];
    for (&p, &val) in phi.phases().data().iter().zip(image) {
        if p != INVALID_PHASE {
            sums[p as usize] += val as f64;
        }
    }
    for (p, s) in sums.iter_mut().enumerate().skip(BG_PHASE as usize) {
        let count = phi.count(p as Phase);
        *s = if count == 0 { 0.0 } else { *s / count as f64 };
    }
    sums
}
