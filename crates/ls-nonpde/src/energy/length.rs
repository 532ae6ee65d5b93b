use ls_core::{Raster, Result, Voxel};

use super::{Energy, check_weight};
use crate::membership::Membership;
use crate::phase::Phase;

/// Discrete gradient magnitude of the region indicator at a voxel with
/// phase `a`: `norm * sqrt(#forward neighbors whose phase differs)`.
#[inline]
fn grad_mag_heaviside(norm: f64, a: Phase, forward: &[Phase]) -> f64 {
    let differing = forward.iter().filter(|&&b| b != a).count();
    match differing {
        0 => 0.0,
        1 => norm,
        n => norm * (n as f64).sqrt(),
    }
}

/// Reads phases with one voxel overridden, so the same stencil code can
/// evaluate the field before and after a flip.
struct FlipView<'p> {
    phi: &'p Membership,
    at: (isize, isize, isize),
    phase: Phase,
}

impl FlipView<'_> {
    #[inline]
    fn get(&self, x: isize, y: isize, z: isize) -> Phase {
        if (x, y, z) == self.at {
            self.phase
        } else {
            self.phi.phase_or_bg(x, y, z)
        }
    }
}

/// Forward-difference length on single-slice fields, comparing each voxel
/// with its right and lower neighbors. Off-grid neighbors are background.
#[derive(Debug, Clone)]
pub struct ForwardLength2d {
    mu: f64,
    norm: f64,
}

impl ForwardLength2d {
    pub fn new(mu: f64) -> Self {
        Self { mu, norm: 1.0 }
    }

    pub fn with_norm(mut self, norm: f64) -> Self {
        self.norm = norm;
        self
    }

    fn stencil(&self, view: &FlipView<'_>, x: isize, y: isize) -> f64 {
        let a = view.get(x, y, 0);
        grad_mag_heaviside(self.norm, a, &[view.get(x + 1, y, 0), view.get(x, y + 1, 0)])
    }

    /// Sum over every stencil that reads voxel `(x, y)`.
    fn local(&self, view: &FlipView<'_>, x: isize, y: isize) -> f64 {
        let mut sum = self.stencil(view, x, y);
        if x > 0 {
            sum += self.stencil(view, x - 1, y);
        }
        if y > 0 {
            sum += self.stencil(view, x, y - 1);
        }
        sum
    }
}

impl<'a> Energy<'a> for ForwardLength2d {
    fn name(&self) -> &'static str {
        "forward length 2d"
    }

    fn init(&mut self, _image: &'a Raster<f32>, _phi: &Membership) -> Result<()> {
        check_weight("mu", self.mu)?;
        check_weight("norm", self.norm)
    }

    fn delta_e(&self, v: Voxel, new_phase: Phase, phi: &Membership) -> f64 {
        let (x, y) = (v.x as isize, v.y as isize);
        let old = phi.phase(v.x, v.y, v.z);
        if old == new_phase {
            return 0.0;
        }
        let before = FlipView { phi, at: (x, y, 0), phase: old };
        let after = FlipView { phi, at: (x, y, 0), phase: new_phase };
        self.mu * (self.local(&after, x, y) - self.local(&before, x, y))
    }

    fn energy(&self, phi: &Membership) -> f64 {
        let view = FlipView { phi, at: (-1, -1, -1), phase: 0 };
        let mut sum = 0.0;
        for y in 0..phi.height() as isize {
            for x in 0..phi.width() as isize {
                sum += self.stencil(&view, x, y);
            }
        }
        self.mu * sum
    }
}

/// Forward-difference length on volumes: right, lower and next-slice
/// neighbors.
#[derive(Debug, Clone)]
pub struct ForwardLength3d {
    mu: f64,
    norm: f64,
}

impl ForwardLength3d {
    pub fn new(mu: f64) -> Self {
        Self { mu, norm: 1.0 }
    }

    pub fn with_norm(mut self, norm: f64) -> Self {
        self.norm = norm;
        self
    }

    fn stencil(&self, view: &FlipView<'_>, x: isize, y: isize, z: isize) -> f64 {
        let a = view.get(x, y, z);
        let forward = [
            view.get(x + 1, y, z),
            view.get(x, y + 1, z),
            view.get(x, y, z + 1),
        ];
        grad_mag_heaviside(self.norm, a, &forward)
    }

    fn local(&self, view: &FlipView<'_>, x: isize, y: isize, z: isize) -> f64 {
        let mut sum = self.stencil(view, x, y, z);
        if x > 0 {
            sum += self.stencil(view, x - 1, y, z);
        }
        if y > 0 {
            sum += self.stencil(view, x, y - 1, z);
        }
        if z > 0 {
            sum += self.stencil(view, x, y, z - 1);
        }
        sum
    }
}

impl<'a> Energy<'a> for ForwardLength3d {
    fn name(&self) -> &'static str {
        "forward length 3d"
    }

    fn init(&mut self, _image: &'a Raster<f32>, _phi: &Membership) -> Result<()> {
        check_weight("mu", self.mu)?;
        check_weight("norm", self.norm)
    }

    fn delta_e(&self, v: Voxel, new_phase: Phase, phi: &Membership) -> f64 {
        let at = (v.x as isize, v.y as isize, v.z as isize);
        let old = phi.phase(v.x, v.y, v.z);
        if old == new_phase {
            return 0.0;
        }
        let before = FlipView { phi, at, phase: old };
        let after = FlipView { phi, at, phase: new_phase };
        self.mu * (self.local(&after, at.0, at.1, at.2) - self.local(&before, at.0, at.1, at.2))
    }

    fn energy(&self, phi: &Membership) -> f64 {
        let view = FlipView { phi, at: (-1, -1, -1), phase: 0 };
        let (w, h, d) = phi.dims();
        let mut sum = 0.0;
        for z in 0..d as isize {
            for y in 0..h as isize {
                for x in 0..w as isize {
                    sum += self.stencil(&view, x, y, z);
                }
            }
        }
        self.mu * sum
    }
}
