use ls_core::{Raster, Result, Voxel};

use super::{Energy, check_weight};
use crate::membership::Membership;
use crate::phase::{INVALID_PHASE, Phase, is_object};

/// Volume penalty `E = nu * total_object_count`.
#[derive(Debug, Clone)]
pub struct SizeEnergy {
    nu: f64,
}

impl SizeEnergy {
    pub fn new(nu: f64) -> Self {
        Self { nu }
    }
}

impl<'a> Energy<'a> for SizeEnergy {
    fn name(&self) -> &'static str {
        "size"
    }

    fn init(&mut self, _image: &'a Raster<f32>, _phi: &Membership) -> Result<()> {
        check_weight("nu", self.nu)
    }

    fn delta_e(&self, v: Voxel, new_phase: Phase, phi: &Membership) -> f64 {
        let old = phi.phase(v.x, v.y, v.z);
        if old == INVALID_PHASE {
            return 0.0;
        }
        match (is_object(old), is_object(new_phase)) {
            (false, true) => self.nu,
            (true, false) => -self.nu,
            _ => 0.0,
        }
    }

    fn energy(&self, phi: &Membership) -> f64 {
        self.nu * phi.total_object_count() as f64
    }
}
