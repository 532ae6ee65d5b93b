use std::f64::consts::PI;

use ls_core::{Raster, Result, Voxel};
use serde::{Deserialize, Serialize};

use super::{Energy, check_kb_support, check_weight};
use crate::membership::Membership;
use crate::phase::{BG_PHASE, Phase};

/// Neighborhood system of the metric length energy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum KbNeighborhood {
    N4,
    #[default]
    N8,
    N16,
}

impl TryFrom<u8> for KbNeighborhood {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            4 => Ok(Self::N4),
            8 => Ok(Self::N8),
            16 => Ok(Self::N16),
            other => Err(format!("neighborhood must be 4, 8 or 16, got {other}")),
        }
    }
}

impl From<KbNeighborhood> for u8 {
    fn from(n: KbNeighborhood) -> Self {
        match n {
            KbNeighborhood::N4 => 4,
            KbNeighborhood::N8 => 8,
            KbNeighborhood::N16 => 16,
        }
    }
}

impl KbNeighborhood {
    /// Half-plane offsets; the full neighborhood is these and their negations.
    fn half_offsets(self) -> &'static [(isize, isize)] {
        const N4: [(isize, isize); 2] = [(1, 0), (0, 1)];
        const N8: [(isize, isize); 4] = [(1, 0), (1, 1), (0, 1), (-1, 1)];
        const N16: [(isize, isize); 8] = [
            (1, 0),
            (2, 1),
            (1, 1),
            (1, 2),
            (0, 1),
            (-1, 2),
            (-1, 1),
            (-2, 1),
        ];
        match self {
            Self::N4 => &N4,
            Self::N8 => &N8,
            Self::N16 => &N16,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Edge {
    dx: isize,
    dy: isize,
    weight: f64,
}

/// Cauchy-Crofton weights `w_k = dphi_k / (2 |e_k|)` for offsets sorted by
/// angle in `[0, pi)`, where `dphi_k` is half the angle between the two
/// adjacent offsets.
fn crofton_edges(neighborhood: KbNeighborhood) -> Vec<Edge> {
    let offsets = neighborhood.half_offsets();
    let angles: Vec<f64> = offsets
        .iter()
        .map(|&(dx, dy)| (dy as f64).atan2(dx as f64))
        .collect();
    let n = offsets.len();

    offsets
        .iter()
        .enumerate()
        .map(|(k, &(dx, dy))| {
            let next = if k + 1 < n { angles[k + 1] } else { angles[0] + PI };
            let prev = if k > 0 { angles[k - 1] } else { angles[n - 1] - PI };
            let len = ((dx * dx + dy * dy) as f64).sqrt();
            Edge {
                dx,
                dy,
                weight: (next - prev) / 2.0 / (2.0 * len),
            }
        })
        .collect()
}

/// Metric boundary length for two-phase 2D fields: every neighbor pair
/// `(v, v + e_k)` with different phases costs `mu * w_k`. Off-grid
/// neighbors are background.
#[derive(Debug, Clone)]
pub struct KbLength {
    mu: f64,
    neighborhood: KbNeighborhood,
    edges: Vec<Edge>,
}

impl KbLength {
    pub fn new(mu: f64, neighborhood: KbNeighborhood) -> Self {
        Self {
            mu,
            neighborhood,
            edges: crofton_edges(neighborhood),
        }
    }

    pub fn neighborhood(&self) -> KbNeighborhood {
        self.neighborhood
    }

    pub fn weights(&self) -> impl Iterator<Item = ((isize, isize), f64)> + '_ {
        self.edges.iter().map(|e| ((e.dx, e.dy), e.weight))
    }
}

impl<'a> Energy<'a> for KbLength {
    fn name(&self) -> &'static str {
        "kolmogorov-boykov length"
    }

    fn init(&mut self, _image: &'a Raster<f32>, phi: &Membership) -> Result<()> {
        check_weight("mu", self.mu)?;
        check_kb_support(phi)
    }

    fn delta_e(&self, v: Voxel, new_phase: Phase, phi: &Membership) -> f64 {
        let old = phi.phase(v.x, v.y, v.z);
        if old == new_phase {
            return 0.0;
        }
        let (x, y) = (v.x as isize, v.y as isize);
        let cut = |a: Phase, b: Phase| f64::from(u8::from(a != b));

        let mut delta = 0.0;
        for e in &self.edges {
            let fwd = phi.phase_or_bg(x + e.dx, y + e.dy, 0);
            let bwd = phi.phase_or_bg(x - e.dx, y - e.dy, 0);
            delta += e.weight
                * (cut(new_phase, fwd) - cut(old, fwd) + cut(new_phase, bwd) - cut(old, bwd));
        }
        self.mu * delta
    }

    fn energy(&self, phi: &Membership) -> f64 {
        let mut sum = 0.0;
        for y in 0..phi.height() as isize {
            for x in 0..phi.width() as isize {
                let a = phi.phase_or_bg(x, y, 0);
                for e in &self.edges {
                    if a != phi.phase_or_bg(x + e.dx, y + e.dy, 0) {
                        sum += e.weight;
                    }
                    // pairs reaching in from outside the grid
                    if a != BG_PHASE && phi.phases().get_signed(x - e.dx, y - e.dy, 0).is_none() {
                        sum += e.weight;
                    }
                }
            }
        }
        self.mu * sum
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;

    use approx::assert_relative_eq;
    use ls_core::Voxel;

    use super::{KbLength, KbNeighborhood};
    use crate::energy::Energy;
    use crate::energy::testutil::{check_deltas, field, image};

    #[test]
    fn weights_follow_cauchy_crofton() {
        let n4: Vec<_> = KbLength::new(1.0, KbNeighborhood::N4).weights().collect();
        assert_eq!(n4.len(), 2);
        for (_, w) in n4 {
            assert_relative_eq!(w, PI / 4.0);
        }

        let n8: Vec<_> = KbLength::new(1.0, KbNeighborhood::N8).weights().collect();
        assert_relative_eq!(n8[0].1, PI / 8.0);
        assert_relative_eq!(n8[1].1, PI / (8.0 * 2.0f64.sqrt()));

        // Angles cover the half circle exactly once.
        let n16 = KbLength::new(1.0, KbNeighborhood::N16);
        let total: f64 = n16
            .weights()
            .map(|((dx, dy), w)| w * 2.0 * ((dx * dx + dy * dy) as f64).sqrt())
            .sum();
        assert_relative_eq!(total, PI, max_relative = 1e-12);
    }

    #[test]
    fn isolated_pixel_n4() {
        let phi = field(5, 5, &{
            let mut l = [0u8; 25];
            l[12] = 1;
            l
        });
        let e = KbLength::new(1.0, KbNeighborhood::N4);
        assert_relative_eq!(e.energy(&phi), PI);
        assert_relative_eq!(e.delta_e(Voxel::xy(2, 2), 1, &phi), -PI);
    }

    #[test]
    fn delta_matches_recomputation() {
        let labels = [
            0, 0, 1, 1, 0, //
            1, 1, 1, 0, 0, //
            0, 1, 0, 0, 1, //
            0, 0, 1, 1, 1,
        ];
        let phi = field(5, 4, &labels);
        let img = image(5, 4, &[0.0; 20]);
        for n in [KbNeighborhood::N4, KbNeighborhood::N8, KbNeighborhood::N16] {
            let mut e = KbLength::new(0.9, n);
            e.init(&img, &phi).expect("init");
            check_deltas(&mut e, &phi, 1e-12);
        }
    }
}
