//! End-to-end segmentation: initialization, energy assembly, solve and
//! overlay rendering.

use ls_core::{Error, Raster, Region, Result};
use ls_label::{ComponentConfig, Connectivity, binarize, boundary_mask, label_components};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::energy::{
    CompositeEnergy, Energy, GaussianFitting, LengthStencil, RegionFitting, SizeEnergy,
    check_weight, length_energy,
};
use crate::membership::Membership;
use crate::solver::{SolveReport, Solver, SolverConfig};

/// Region statistic used by the fitting term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FittingKind {
    /// Piecewise-constant means.
    #[default]
    ChanVese,
    /// Per-phase mean and variance.
    Gaussian,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    pub lambda_bg: f64,
    pub lambda_fg: f64,
    /// Per-phase fitting weights, background first. Phases without an
    /// entry use `lambda_fg`.
    pub lambdas: Option<Vec<f64>>,
    pub mu: f64,
    pub nu: f64,
    pub length: LengthStencil,
    pub fitting: FittingKind,
    /// Variance floor of the Gaussian fitting term.
    pub min_variance: f64,
    pub max_iterations: usize,
    pub preserve_topology: bool,
    pub multiphase: bool,
    pub snapshot_interval: usize,
    pub verify_energy: bool,
    /// Initialize by thresholding the input when no other source is given.
    pub threshold: Option<f32>,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        let solver = SolverConfig::default();
        Self {
            lambda_bg: 1.0,
            lambda_fg: 1.0,
            lambdas: None,
            mu: 1.0,
            nu: 0.0,
            length: LengthStencil::Forward,
            fitting: FittingKind::ChanVese,
            min_variance: crate::energy::DEFAULT_MIN_VARIANCE,
            max_iterations: solver.max_iterations,
            preserve_topology: solver.preserve_topology,
            multiphase: false,
            snapshot_interval: solver.snapshot_interval,
            verify_energy: solver.verify_energy,
            threshold: None,
        }
    }
}

impl SegmentationConfig {
    pub fn validate(&self) -> Result<()> {
        check_weight("lambda_bg", self.lambda_bg)?;
        check_weight("lambda_fg", self.lambda_fg)?;
        for (i, &l) in self.lambdas.iter().flatten().enumerate() {
            check_weight(&format!("lambdas[{i}]"), l)?;
        }
        check_weight("mu", self.mu)?;
        check_weight("nu", self.nu)?;
        check_weight("min_variance", self.min_variance)?;
        if self.fitting == FittingKind::Gaussian && self.min_variance == 0.0 {
            return Err(Error::InvalidParameter(
                "min_variance must be positive for gaussian fitting".to_string(),
            ));
        }
        if let Some(t) = self.threshold
            && !t.is_finite()
        {
            return Err(Error::InvalidParameter(format!(
                "threshold must be finite, got {t}"
            )));
        }
        Ok(())
    }

    pub fn solver_config(&self) -> SolverConfig {
        SolverConfig {
            max_iterations: self.max_iterations,
            preserve_topology: self.preserve_topology,
            snapshot_interval: self.snapshot_interval,
            verify_energy: self.verify_energy,
        }
    }

    /// Fitting, length and size terms for `phi`, not yet initialized.
    pub fn build_energy<'a>(&self, phi: &Membership) -> Result<CompositeEnergy<'a>> {
        let mut energy = match self.fitting {
            FittingKind::ChanVese => {
                let mut fit = RegionFitting::new(self.lambda_bg, self.lambda_fg);
                if let Some(lambdas) = &self.lambdas {
                    fit = fit.with_phase_lambdas(lambdas.clone());
                }
                CompositeEnergy::new().with(fit)
            }
            FittingKind::Gaussian => {
                CompositeEnergy::new().with(GaussianFitting::new(self.min_variance))
            }
        };
        energy.push_boxed(length_energy(self.mu, self.length, phi)?);
        Ok(energy.with(SizeEnergy::new(self.nu)))
    }
}

/// Optional starting points, used in the order labels, binary mask,
/// regions, threshold (from the config), default seed.
#[derive(Debug, Clone, Copy, Default)]
pub struct Initialization<'s> {
    /// Nonzero voxels are excluded from every phase.
    pub invalid: Option<&'s Raster<u8>>,
    pub labels: Option<&'s Raster<u32>>,
    /// Nonzero voxels are object.
    pub binary: Option<&'s Raster<u8>>,
    pub regions: Option<&'s [Region]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitSource {
    Labels,
    Binary,
    Regions,
    Threshold,
    Seed,
}

/// Builds the starting membership from the highest-priority source.
///
/// With `multiphase`, binary masks and thresholded images are split into
/// 4-connected components, one phase each.
pub fn initialize(
    image: &Raster<f32>,
    init: &Initialization<'_>,
    cfg: &SegmentationConfig,
) -> Result<(Membership, InitSource)> {
    let (w, h, d) = image.dims();
    let invalid = init.invalid;
    let multiphase = cfg.multiphase;

    let (phi, source) = if let Some(labels) = init.labels {
        check_dims(labels, image)?;
        (Membership::from_labels(labels, multiphase, invalid)?, InitSource::Labels)
    } else if let Some(binary) = init.binary {
        check_dims(binary, image)?;
        let phi = if multiphase {
            let mask = binary.map(|&v| u8::from(v != 0));
            Membership::from_labels(&component_labels(&mask), true, invalid)?
        } else {
            Membership::from_labels(binary, false, invalid)?
        };
        (phi, InitSource::Binary)
    } else if let Some(regions) = init.regions {
        (
            Membership::from_regions(w, h, d, regions, multiphase, invalid)?,
            InitSource::Regions,
        )
    } else if let Some(t) = cfg.threshold {
        let phi = if multiphase {
            let mask = binarize(image, t);
            Membership::from_labels(&component_labels(&mask), true, invalid)?
        } else {
            Membership::from_threshold(image, t, invalid)?
        };
        (phi, InitSource::Threshold)
    } else {
        (Membership::seeded(w, h, d, invalid)?, InitSource::Seed)
    };

    debug!(
        ?source,
        phases = phi.num_phases(),
        objects = phi.total_object_count(),
        "initialized membership"
    );
    Ok((phi, source))
}

fn component_labels(mask: &Raster<u8>) -> Raster<u32> {
    let cfg = ComponentConfig {
        connectivity: Connectivity::C4,
        min_component_size: 1,
    };
    label_components(mask, &cfg).labels
}

fn check_dims<T>(raster: &Raster<T>, image: &Raster<f32>) -> Result<()> {
    if !raster.same_dims(image) {
        return Err(Error::SizeMismatch {
            expected: image.len(),
            actual: raster.len(),
        });
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct Segmentation {
    pub membership: Membership,
    pub source: InitSource,
    /// Label raster of the starting membership.
    pub initial_labels: Raster<u16>,
    pub report: SolveReport,
    /// Final energy of each term, recomputed.
    pub energy_terms: Vec<(&'static str, f64)>,
}

impl Segmentation {
    pub fn labels(&self) -> Raster<u16> {
        self.membership.to_labels()
    }

    pub fn overlay(&self, image: &Raster<f32>) -> Raster<u8> {
        overlay(image, &self.initial_labels, &self.labels())
    }
}

/// Initializes, builds the configured energy and runs the solver.
pub fn segment(
    image: &Raster<f32>,
    init: &Initialization<'_>,
    cfg: &SegmentationConfig,
) -> Result<Segmentation> {
    cfg.validate()?;
    let (mut phi, source) = initialize(image, init, cfg)?;
    let initial_labels = phi.to_labels();

    let mut energy = cfg.build_energy(&phi)?;
    energy.init(image, &phi)?;
    let report = Solver::new(cfg.solver_config()).solve(&mut energy, &mut phi)?;
    let energy_terms = energy.breakdown(&phi);

    Ok(Segmentation {
        membership: phi,
        source,
        initial_labels,
        report,
        energy_terms,
    })
}

const FINAL_CONTOUR: u8 = 229;
const INITIAL_CONTOUR: u8 = 204;

/// Input scaled into `[0, 229]` with final-phase boundaries drawn at 229
/// and initial-phase boundaries at 204 (on top).
pub fn overlay(image: &Raster<f32>, initial: &Raster<u16>, result: &Raster<u16>) -> Raster<u8> {
    let (lo, hi) = image.min_max().unwrap_or((0.0, 0.0));
    let range = hi - lo;
    let scale = if range > 0.0 { f32::from(FINAL_CONTOUR) / range } else { 0.0 };
    let mut out = image.map(|&v| ((v - lo) * scale).clamp(0.0, f32::from(FINAL_CONTOUR)) as u8);

    for (mask, value) in [(boundary_mask(result), FINAL_CONTOUR), (boundary_mask(initial), INITIAL_CONTOUR)] {
        for (px, &m) in out.data_mut().iter_mut().zip(mask.data()) {
            if m != 0 {
                *px = value;
            }
        }
    }
    out
}
