use ls_core::{Error, Raster, Result, Voxel};

use super::fitting::phase_means;
use super::{Energy, check_image, check_weight};
use crate::membership::Membership;
use crate::phase::{INVALID_PHASE, Phase};

pub const DEFAULT_MIN_VARIANCE: f64 = 1e-6;

/// Gaussian region fitting: each phase is modelled by its own mean and
/// variance, `E = sum_v ln s[p] + (I(v) - m[p])^2 / s[p]` where
/// `s[p] = max(var[p], min_variance)`.
///
/// Summed per phase this is `n_p * (ln s_p + var_p / s_p)`, which
/// [`Energy::delta_e`] evaluates before and after the flip using online
/// mean/variance updates.
#[derive(Debug, Clone)]
pub struct GaussianFitting<'a> {
    min_variance: f64,
    means: Vec<f64>,
    vars: Vec<f64>,
    image: &'a [f32],
}

impl Default for GaussianFitting<'_> {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_VARIANCE)
    }
}

impl GaussianFitting<'_> {
    pub fn new(min_variance: f64) -> Self {
        Self {
            min_variance,
            means: Vec::new(),
            vars: Vec::new(),
            image: &[],
        }
    }

    pub fn mean(&self, phase: Phase) -> Option<f64> {
        self.means.get(phase as usize).copied()
    }

    pub fn variance(&self, phase: Phase) -> Option<f64> {
        self.vars.get(phase as usize).copied()
    }

    fn phase_term(&self, n: usize, var: f64) -> f64 {
        if n == 0 {
            return 0.0;
        }
        let s = var.max(self.min_variance);
        n as f64 * (s.ln() + var / s)
    }
}

#[derive(Debug, Clone, Copy)]
struct Moments {
    mean: f64,
    var: f64,
}

/// Moments of a phase with `n` members after removing `val`.
fn remove_sample(mean: f64, var: f64, n: usize, val: f64) -> Moments {
    if n <= 1 {
        return Moments { mean: 0.0, var: 0.0 };
    }
    let n = n as f64;
    let d = mean - val;
    Moments {
        mean: mean + d / (n - 1.0),
        var: ((var - d * d / (n - 1.0)) * (n / (n - 1.0))).max(0.0),
    }
}

/// Moments of a phase with `n` members after adding `val`.
fn add_sample(mean: f64, var: f64, n: usize, val: f64) -> Moments {
    if n == 0 {
        return Moments { mean: val, var: 0.0 };
    }
    let n = n as f64;
    let d = mean - val;
    Moments {
        mean: mean - d / (n + 1.0),
        var: (var + d * d / (n + 1.0)) * (n / (n + 1.0)),
    }
}

impl<'a> Energy<'a> for GaussianFitting<'a> {
    fn name(&self) -> &'static str {
        "gaussian fitting"
    }

    fn init(&mut self, image: &'a Raster<f32>, phi: &Membership) -> Result<()> {
        check_image(image, phi)?;
        check_weight("min_variance", self.min_variance)?;
        if self.min_variance == 0.0 {
            return Err(Error::InvalidParameter(
                "min_variance must be positive".to_string(),
            ));
        }
        self.image = image.data();
        self.estimate_params(phi);
        Ok(())
    }

    fn delta_e(&self, v: Voxel, new_phase: Phase, phi: &Membership) -> f64 {
        let old = phi.phase(v.x, v.y, v.z);
        if old == new_phase || old == INVALID_PHASE {
            return 0.0;
        }
        let val = self.image[phi.phases().index_of(v.x, v.y, v.z)] as f64;
        let (o, p) = (old as usize, new_phase as usize);
        let (n_old, n_new) = (phi.count(old), phi.count(new_phase));

        let after_old = remove_sample(self.means[o], self.vars[o], n_old, val);
        let after_new = add_sample(self.means[p], self.vars[p], n_new, val);

        self.phase_term(n_old - 1, after_old.var) + self.phase_term(n_new + 1, after_new.var)
            - self.phase_term(n_old, self.vars[o])
            - self.phase_term(n_new, self.vars[p])
    }

    fn energy(&self, phi: &Membership) -> f64 {
        phi.phases()
            .data()
            .iter()
            .zip(self.image)
            .filter(|&(&p, _)| p != INVALID_PHASE)
            .map(|(&p, &val)| {
                let s = self.vars[p as usize].max(self.min_variance);
                let d = val as f64 - self.means[p as usize];
                s.ln() + d * d / s
            })
            .sum()
    }

    fn update_params(&mut self, v: Voxel, new_phase: Phase, phi: &Membership) {
        let old = phi.phase(v.x, v.y, v.z);
        if old == new_phase || old == INVALID_PHASE {
            return;
        }
        let val = self.image[phi.phases().index_of(v.x, v.y, v.z)] as f64;
        let (o, p) = (old as usize, new_phase as usize);

        let m = remove_sample(self.means[o], self.vars[o], phi.count(old), val);
        (self.means[o], self.vars[o]) = (m.mean, m.var);

        let m = add_sample(self.means[p], self.vars[p], phi.count(new_phase), val);
        (self.means[p], self.vars[p]) = (m.mean, m.var);
    }

    fn estimate_params(&mut self, phi: &Membership) {
        self.means = phase_means(self.image, phi);

        let mut vars = vec![0.0f64; self.means.len()];
        for (&p, &val) in phi.phases().data().iter().zip(self.image) {
            if p != INVALID_PHASE {
                let d = val as f64 - self.means[p as usize];
                vars[p as usize] += d * d;
            }
        }
        for (p, var) in vars.iter_mut().enumerate() {
            let n = phi.count(p as Phase);
            if n > 0 {
                *var /= n as f64;
            }
        }
        self.vars = vars;
    }
}
