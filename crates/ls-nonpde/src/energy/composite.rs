use std::fmt;

use ls_core::{Raster, Result, Voxel};

use super::{Energy, LengthStencil, RegionFitting, SizeEnergy, length_energy};
use crate::membership::Membership;
use crate::phase::Phase;

/// Ordered sum of energies. Every call is delegated to each term in
/// insertion order.
#[derive(Default)]
pub struct CompositeEnergy<'a> {
    terms: Vec<Box<dyn Energy<'a> + 'a>>,
}

impl<'a> CompositeEnergy<'a> {
    pub fn new() -> Self {
        Self { terms: Vec::new() }
    }

    /// Region fitting, forward length and size terms, in that order.
    pub fn chan_vese(
        lambda_bg: f64,
        lambda_fg: f64,
        mu: f64,
        nu: f64,
        phi: &Membership,
    ) -> Result<Self> {
        let mut e = Self::new().with(RegionFitting::new(lambda_bg, lambda_fg));
        e.push_boxed(length_energy(mu, LengthStencil::Forward, phi)?);
        Ok(e.with(SizeEnergy::new(nu)))
    }

    pub fn with(mut self, term: impl Energy<'a> + 'a) -> Self {
        self.push_boxed(Box::new(term));
        self
    }

    pub fn push_boxed(&mut self, term: Box<dyn Energy<'a> + 'a>) {
        self.terms.push(term);
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Energy of each term, in order.
    pub fn breakdown(&self, phi: &Membership) -> Vec<(&'static str, f64)> {
        self.terms.iter().map(|t| (t.name(), t.energy(phi))).collect()
    }
}

impl fmt::Debug for CompositeEnergy<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.terms.iter().map(|t| t.name()))
            .finish()
    }
}

impl<'a> Energy<'a> for CompositeEnergy<'a> {
    fn name(&self) -> &'static str {
        "composite"
    }

    fn init(&mut self, image: &'a Raster<f32>, phi: &Membership) -> Result<()> {
        for t in &mut self.terms {
            t.init(image, phi)?;
        }
        Ok(())
    }

    fn delta_e(&self, v: Voxel, new_phase: Phase, phi: &Membership) -> f64 {
        self.terms.iter().map(|t| t.delta_e(v, new_phase, phi)).sum()
    }

    fn energy(&self, phi: &Membership) -> f64 {
        self.terms.iter().map(|t| t.energy(phi)).sum()
    }

    fn update_params(&mut self, v: Voxel, new_phase: Phase, phi: &Membership) {
        for t in &mut self.terms {
            t.update_params(v, new_phase, phi);
        }
    }

    fn estimate_params(&mut self, phi: &Membership) {
        for t in &mut self.terms {
            t.estimate_params(phi);
        }
    }
}
