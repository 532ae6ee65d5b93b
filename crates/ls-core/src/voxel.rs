use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Voxel {
    pub x: usize,
    pub y: usize,
    #[serde(default)]
    pub z: usize,
}

impl Voxel {
    pub const fn new(x: usize, y: usize, z: usize) -> Self {
        Self { x, y, z }
    }

    pub const fn xy(x: usize, y: usize) -> Self {
        Self { x, y, z: 0 }
    }

    /// Neighbor at a signed offset, or `None` when it would leave the
    /// non-negative quadrant. Upper bounds are the caller's concern.
    pub fn offset(self, dx: isize, dy: isize, dz: isize) -> Option<Voxel> {
        Some(Voxel {
            x: self.x.checked_add_signed(dx)?,
            y: self.y.checked_add_signed(dy)?,
            z: self.z.checked_add_signed(dz)?,
        })
    }
}

/// A set of voxels supplied from outside, e.g. a connected component or
/// a user-drawn initial region.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Region {
    pub voxels: Vec<Voxel>,
}

impl Region {
    pub fn new(voxels: Vec<Voxel>) -> Self {
        Self { voxels }
    }

    pub fn from_xy(points: &[(usize, usize)]) -> Self {
        Self {
            voxels: points.iter().map(|&(x, y)| Voxel::xy(x, y)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.voxels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voxels.is_empty()
    }

    /// Mean coordinate, or `None` for an empty region.
    pub fn centroid(&self) -> Option<[f32; 3]> {
        if self.voxels.is_empty() {
            return None;
        }
        let mut acc = [0.0f64; 3];
        for v in &self.voxels {
            acc[0] += v.x as f64;
            acc[1] += v.y as f64;
            acc[2] += v.z as f64;
        }
        let n = self.voxels.len() as f64;
        Some([(acc[0] / n) as f32, (acc[1] / n) as f32, (acc[2] / n) as f32])
    }
}

#[cfg(test)]
mod tests {
    use super::{Region, Voxel};

    #[test]
    fn offset_stays_non_negative() {
        let v = Voxel::xy(0, 3);
        assert_eq!(v.offset(-1, 0, 0), None);
        assert_eq!(v.offset(1, -1, 0), Some(Voxel::xy(1, 2)));
        assert_eq!(v.offset(0, 0, -1), None);
    }

    #[test]
    fn region_centroid() {
        let r = Region::from_xy(&[(0, 0), (2, 0), (2, 2), (0, 2)]);
        assert_eq!(r.len(), 4);
        assert_eq!(r.centroid(), Some([1.0, 1.0, 0.0]));
        assert_eq!(Region::default().centroid(), None);
    }
}
