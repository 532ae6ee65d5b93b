use std::collections::HashMap;

use ls_core::{Error, Raster, Region, Result};

use crate::phase::{BG_PHASE, INVALID_PHASE, MAX_PHASES, Phase, is_object};

/// Per-voxel phase labels plus per-phase voxel counts.
///
/// Phases are `BG_PHASE..=num_phases()`; `INVALID_PHASE` voxels are fixed at
/// construction and never change afterwards. [`Membership::set_phase`] is
/// the only mutator and keeps the counts in step with the labels.
#[derive(Debug, Clone, PartialEq)]
pub struct Membership {
    phases: Raster<Phase>,
    counts: Vec<usize>,
    invalid_count: usize,
    total_object_count: usize,
}

impl Membership {
    /// Two-phase field with a centered disc (sphere in 3D) of radius
    /// `(width + height + depth) / 6` as the object.
    ///
    /// Nonzero voxels of `invalid` are excluded from all phases.
    pub fn seeded(
        width: usize,
        height: usize,
        depth: usize,
        invalid: Option<&Raster<u8>>,
    ) -> Result<Self> {
        check_mask(invalid, (width, height, depth))?;

        let (cx, cy, cz) = ((width / 2) as f64, (height / 2) as f64, (depth / 2) as f64);
        let radius = 0.5 * (width + height + depth) as f64 / 3.0;

        let mut data = Vec::with_capacity(width * height * depth);
        for z in 0..depth {
            for y in 0..height {
                for x in 0..width {
                    let (dx, dy, dz) = (cx - x as f64, cy - y as f64, cz - z as f64);
                    let inside = (dx * dx + dy * dy + dz * dz).sqrt() < radius;
                    data.push(if inside { BG_PHASE + 1 } else { BG_PHASE });
                }
            }
        }

        let phases = Raster::from_vec(width, height, depth, data)?;
        Ok(Self::assemble(phases, invalid, 2))
    }

    /// Two-phase field: voxels with `value >= threshold` are object.
    pub fn from_threshold(
        image: &Raster<f32>,
        threshold: f32,
        invalid: Option<&Raster<u8>>,
    ) -> Result<Self> {
        check_mask(invalid, image.dims())?;
        let phases = image.map(|&v| if v >= threshold { BG_PHASE + 1 } else { BG_PHASE });
        Ok(Self::assemble(phases, invalid, 2))
    }

    /// Imports a label raster where `0` is background.
    ///
    /// With `multiphase`, distinct nonzero labels become phases `2, 3, ...`
    /// in order of first appearance in scan order. Otherwise every nonzero
    /// label collapses into the single object phase. Either way the field
    /// has at least two phases.
    pub fn from_labels<T>(
        labels: &Raster<T>,
        multiphase: bool,
        invalid: Option<&Raster<u8>>,
    ) -> Result<Self>
    where
        T: Copy + Into<u32>,
    {
        check_mask(invalid, labels.dims())?;

        if !multiphase {
            let phases = labels.map(|&l| if l.into() == 0 { BG_PHASE } else { BG_PHASE + 1 });
            return Ok(Self::assemble(phases, invalid, 2));
        }

        let mut registry: HashMap<u32, Phase> = HashMap::new();
        registry.insert(0, BG_PHASE);
        let mut next = BG_PHASE + 1;

        let mut data = Vec::with_capacity(labels.len());
        for (i, &l) in labels.data().iter().enumerate() {
            if is_masked(invalid, i) {
                data.push(INVALID_PHASE);
                continue;
            }
            let l = l.into();
            let phase = match registry.get(&l) {
                Some(&p) => p,
                None => {
                    if next as usize > MAX_PHASES {
                        return Err(Error::CapacityExceeded {
                            requested: registry.len() + 1,
                            max: MAX_PHASES,
                        });
                    }
                    registry.insert(l, next);
                    next += 1;
                    next - 1
                }
            };
            data.push(phase);
        }

        let num_phases = (next - 1).max(BG_PHASE + 1);
        let (w, h, d) = labels.dims();
        let phases = Raster::from_vec(w, h, d, data)?;
        Ok(Self::assemble(phases, invalid, num_phases))
    }

    /// Background field with the given regions painted on top.
    ///
    /// With `multiphase`, region `r` becomes phase `r + 2`; otherwise all
    /// regions merge into phase 2. Region voxels on invalid voxels are
    /// skipped; voxels outside the grid fail with [`Error::OutOfBounds`].
    pub fn from_regions(
        width: usize,
        height: usize,
        depth: usize,
        regions: &[Region],
        multiphase: bool,
        invalid: Option<&Raster<u8>>,
    ) -> Result<Self> {
        check_mask(invalid, (width, height, depth))?;

        let num_phases = if multiphase {
            let requested = regions.len() + 1;
            if requested > MAX_PHASES {
                return Err(Error::CapacityExceeded {
                    requested,
                    max: MAX_PHASES,
                });
            }
            requested.max(2) as Phase
        } else {
            2
        };

        let phases = Raster::new_fill(width, height, depth, BG_PHASE);
        let mut field = Self::assemble(phases, invalid, num_phases);

        for (r, region) in regions.iter().enumerate() {
            let phase = if multiphase {
                BG_PHASE + 1 + r as Phase
            } else {
                BG_PHASE + 1
            };
            for v in &region.voxels {
                if field.phases.get(v.x, v.y, v.z).is_none() {
                    return Err(Error::OutOfBounds);
                }
                field.set_phase(v.x, v.y, v.z, phase);
            }
        }

        Ok(field)
    }

    /// Counts phases of a fully built label raster and applies the mask.
    fn assemble(mut phases: Raster<Phase>, invalid: Option<&Raster<u8>>, num_phases: Phase) -> Self {
        let mut counts = vec![0usize; num_phases as usize + 1];
        let mut invalid_count = 0;
        let mut total_object_count = 0;

        for (i, p) in phases.data_mut().iter_mut().enumerate() {
            if is_masked(invalid, i) {
                *p = INVALID_PHASE;
            }
            if *p == INVALID_PHASE {
                invalid_count += 1;
                continue;
            }
            counts[*p as usize] += 1;
            if is_object(*p) {
                total_object_count += 1;
            }
        }

        Self {
            phases,
            counts,
            invalid_count,
            total_object_count,
        }
    }

    pub fn width(&self) -> usize {
        self.phases.width()
    }

    pub fn height(&self) -> usize {
        self.phases.height()
    }

    pub fn depth(&self) -> usize {
        self.phases.depth()
    }

    pub fn dims(&self) -> (usize, usize, usize) {
        self.phases.dims()
    }

    pub fn is_2d(&self) -> bool {
        self.phases.is_2d()
    }

    /// Highest phase label; background plus the number of object phases.
    pub fn num_phases(&self) -> Phase {
        (self.counts.len() - 1) as Phase
    }

    pub fn phases(&self) -> &Raster<Phase> {
        &self.phases
    }

    /// Phase at an in-grid voxel.
    #[inline]
    pub fn phase(&self, x: usize, y: usize, z: usize) -> Phase {
        self.phases.data()[self.phases.index_of(x, y, z)]
    }

    /// Phase at a signed coordinate, with off-grid voxels reading as
    /// background.
    #[inline]
    pub fn phase_or_bg(&self, x: isize, y: isize, z: isize) -> Phase {
        self.phases.get_signed(x, y, z).copied().unwrap_or(BG_PHASE)
    }

    pub fn is_valid(&self, x: usize, y: usize, z: usize) -> bool {
        self.phase(x, y, z) != INVALID_PHASE
    }

    /// Number of voxels in `phase`; zero for phases outside the field.
    pub fn count(&self, phase: Phase) -> usize {
        if phase == INVALID_PHASE {
            return 0;
        }
        self.counts.get(phase as usize).copied().unwrap_or(0)
    }

    pub fn total_object_count(&self) -> usize {
        self.total_object_count
    }

    pub fn invalid_count(&self) -> usize {
        self.invalid_count
    }

    /// Moves a voxel to `new_phase`, updating counts.
    ///
    /// No-op for invalid voxels and when the phase is unchanged.
    ///
    /// # Panics
    /// Panics if `new_phase` is not in `BG_PHASE..=num_phases()`.
    pub fn set_phase(&mut self, x: usize, y: usize, z: usize, new_phase: Phase) {
        let idx = self.phases.index_of(x, y, z);
        let old = self.phases.data()[idx];
        if old == INVALID_PHASE || old == new_phase {
            return;
        }
        assert!(
            (BG_PHASE..=self.num_phases()).contains(&new_phase),
            "phase {new_phase} outside 1..={}",
            self.num_phases()
        );

        self.counts[old as usize] -= 1;
        self.counts[new_phase as usize] += 1;
        match (is_object(old), is_object(new_phase)) {
            (true, false) => self.total_object_count -= 1,
            (false, true) => self.total_object_count += 1,
            _ => {}
        }
        self.phases.data_mut()[idx] = new_phase;

        debug_assert_eq!(
            self.counts.iter().sum::<usize>() + self.invalid_count,
            self.phases.len()
        );
    }

    /// Recounts every phase from the labels and compares with the cached
    /// counts.
    pub fn is_consistent(&self) -> bool {
        let mut counts = vec![0usize; self.counts.len()];
        let mut invalid = 0;
        for &p in self.phases.data() {
            match counts.get_mut(p as usize) {
                _ if p == INVALID_PHASE => invalid += 1,
                Some(c) => *c += 1,
                None => return false,
            }
        }
        let objects: usize = counts.iter().skip(BG_PHASE as usize + 1).sum();

        counts == self.counts
            && invalid == self.invalid_count
            && objects == self.total_object_count
            && counts.iter().sum::<usize>() + invalid == self.phases.len()
    }

    /// Label raster: background and invalid voxels are 0, phase `p > 1`
    /// becomes `p - 1`.
    pub fn to_labels(&self) -> Raster<u16> {
        self.phases.map(|&p| if p <= BG_PHASE { 0 } else { p - BG_PHASE })
    }

    /// Object voxels 255, everything else 0.
    pub fn to_binary(&self) -> Raster<u8> {
        self.phases.map(|&p| if is_object(p) { 255 } else { 0 })
    }
}

fn check_mask(invalid: Option<&Raster<u8>>, dims: (usize, usize, usize)) -> Result<()> {
    if let Some(mask) = invalid
        && mask.dims() != dims
    {
        return Err(Error::SizeMismatch {
            expected: dims.0 * dims.1 * dims.2,
            actual: mask.len(),
        });
    }
    Ok(())
}

#[inline]
fn is_masked(invalid: Option<&Raster<u8>>, idx: usize) -> bool {
    invalid.is_some_and(|m| m.data()[idx] != 0)
}
