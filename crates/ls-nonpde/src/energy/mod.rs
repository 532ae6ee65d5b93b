//! Pluggable energies for the greedy solver.
//!
//! Every energy caches whatever statistics it needs and answers
//! [`Energy::delta_e`] in constant time. The protocol for a flip at voxel
//! `v` is fixed: the solver calls [`Energy::update_params`] while the
//! membership is still in its pre-flip state and commits the flip with
//! [`Membership::set_phase`] right after, before touching any other voxel.

use ls_core::{Error, Raster, Result, Voxel};
use serde::{Deserialize, Serialize};

use crate::membership::Membership;
use crate::phase::Phase;

mod composite;
mod fitting;
mod gaussian;
mod kb;
mod length;
mod size;

pub use composite::CompositeEnergy;
pub use fitting::RegionFitting;
pub use gaussian::{DEFAULT_MIN_VARIANCE, GaussianFitting};
pub use kb::{KbLength, KbNeighborhood};
pub use length::{ForwardLength2d, ForwardLength3d};
pub use size::SizeEnergy;

pub trait Energy<'a> {
    fn name(&self) -> &'static str;

    /// Binds the input image and computes all cached statistics from
    /// scratch. Called once before the solve.
    fn init(&mut self, image: &'a Raster<f32>, phi: &Membership) -> Result<()>;

    /// Change of total energy if `v` moved to `new_phase`, from cached
    /// statistics only.
    fn delta_e(&self, v: Voxel, new_phase: Phase, phi: &Membership) -> f64;

    /// Full recomputation of the energy of `phi`.
    fn energy(&self, phi: &Membership) -> f64;

    /// Updates cached statistics for the flip of `v` to `new_phase`;
    /// `phi` is still pre-flip.
    fn update_params(&mut self, _v: Voxel, _new_phase: Phase, _phi: &Membership) {}

    /// Recomputes cached statistics from `phi`.
    fn estimate_params(&mut self, _phi: &Membership) {}
}

/// Discretization of the boundary length term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LengthStencil {
    /// Forward differences on the right/below (/ahead) neighbors.
    #[default]
    Forward,
    /// Cauchy-Crofton weighted neighborhood; two-phase 2D fields only.
    KolmogorovBoykov { neighborhood: KbNeighborhood },
}

/// Picks the length energy matching the field's dimensionality.
pub fn length_energy<'a>(
    mu: f64,
    stencil: LengthStencil,
    phi: &Membership,
) -> Result<Box<dyn Energy<'a> + 'a>> {
    match stencil {
        LengthStencil::Forward if phi.is_2d() => Ok(Box::new(ForwardLength2d::new(mu))),
        LengthStencil::Forward => Ok(Box::new(ForwardLength3d::new(mu))),
        LengthStencil::KolmogorovBoykov { neighborhood } => {
            check_kb_support(phi)?;
            Ok(Box::new(KbLength::new(mu, neighborhood)))
        }
    }
}

pub(crate) fn check_kb_support(phi: &Membership) -> Result<()> {
    if !phi.is_2d() || phi.num_phases() != 2 {
        return Err(Error::UnsupportedConfiguration(format!(
            "Kolmogorov-Boykov length needs a two-phase 2D field, got {} phases on depth {}",
            phi.num_phases(),
            phi.depth()
        )));
    }
    Ok(())
}

pub(crate) fn check_image(image: &Raster<f32>, phi: &Membership) -> Result<()> {
    if image.dims() != phi.dims() {
        let (w, h, d) = phi.dims();
        return Err(Error::SizeMismatch {
            expected: w * h * d,
            actual: image.len(),
        });
    }
    Ok(())
}

pub(crate) fn check_weight(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(Error::InvalidParameter(format!(
            "{name} must be finite and non-negative, got {value}"
        )));
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use ls_core::{Error, Raster};

    use super::{Energy, KbNeighborhood, LengthStencil, length_energy};
    use crate::membership::Membership;

    #[test]
    fn factory_follows_dimensionality() {
        let flat = Membership::seeded(6, 6, 1, None).expect("seeded");
        let vol = Membership::seeded(6, 6, 3, None).expect("seeded");

        let e = length_energy(1.0, LengthStencil::Forward, &flat).expect("2d");
        assert_eq!(e.name(), "forward length 2d");
        let e = length_energy(1.0, LengthStencil::Forward, &vol).expect("3d");
        assert_eq!(e.name(), "forward length 3d");

        let kb = LengthStencil::KolmogorovBoykov {
            neighborhood: KbNeighborhood::N8,
        };
        assert!(length_energy(1.0, kb, &flat).is_ok());
        assert!(matches!(
            length_energy(1.0, kb, &vol),
            Err(Error::UnsupportedConfiguration(_))
        ));
    }

    #[test]
    fn kb_rejects_multiphase_fields() {
        let labels = Raster::from_vec_2d(3, 1, vec![0u8, 1, 2]).expect("labels");
        let phi = Membership::from_labels(&labels, true, None).expect("field");
        let kb = LengthStencil::KolmogorovBoykov {
            neighborhood: KbNeighborhood::N4,
        };
        assert!(matches!(
            length_energy(1.0, kb, &phi),
            Err(Error::UnsupportedConfiguration(_))
        ));
    }

    #[test]
    fn stencil_config_round_trips_through_json() {
        let kb = LengthStencil::KolmogorovBoykov {
            neighborhood: KbNeighborhood::N16,
        };
        let json = serde_json::to_string(&kb).expect("serialize");
        assert_eq!(json, r#"{"kolmogorov_boykov":{"neighborhood":16}}"#);
        let back: LengthStencil = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, kb);

        let fw: LengthStencil = serde_json::from_str(r#""forward""#).expect("deserialize");
        assert_eq!(fw, LengthStencil::Forward);
        assert!(serde_json::from_str::<LengthStencil>(r#"{"kolmogorov_boykov":{"neighborhood":6}}"#).is_err());
    }
}
