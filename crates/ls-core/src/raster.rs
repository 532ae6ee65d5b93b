use crate::Error;
use crate::voxel::Voxel;

/// Dense voxel grid stored x-fastest, then y, then z.
///
/// A 2D image is a raster with `depth == 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster<T> {
    width: usize,
    height: usize,
    depth: usize,
    data: Vec<T>,
}

impl<T> Raster<T> {
    pub fn from_vec(width: usize, height: usize, depth: usize, data: Vec<T>) -> Result<Self, Error> {
        let expected = width
            .checked_mul(height)
            .and_then(|v| v.checked_mul(depth))
            .ok_or(Error::SizeMismatch {
                expected: usize::MAX,
                actual: data.len(),
            })?;

        if data.len() != expected {
            return Err(Error::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }

        Ok(Self {
            width,
            height,
            depth,
            data,
        })
    }

    pub fn from_vec_2d(width: usize, height: usize, data: Vec<T>) -> Result<Self, Error> {
        Self::from_vec(width, height, 1, data)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_2d(&self) -> bool {
        self.depth == 1
    }

    pub fn dims(&self) -> (usize, usize, usize) {
        (self.width, self.height, self.depth)
    }

    pub fn same_dims<U>(&self, other: &Raster<U>) -> bool {
        self.dims() == other.dims()
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// Linear index of `(x, y, z)`. Caller guarantees the coordinate is in the grid.
    #[inline]
    pub fn index_of(&self, x: usize, y: usize, z: usize) -> usize {
        debug_assert!(x < self.width && y < self.height && z < self.depth);
        (z * self.height + y) * self.width + x
    }

    #[inline]
    pub fn coords_of(&self, idx: usize) -> Voxel {
        let plane = self.width * self.height;
        let z = idx / plane;
        let rem = idx % plane;
        Voxel::new(rem % self.width, rem / self.width, z)
    }

    pub fn contains(&self, x: isize, y: isize, z: isize) -> bool {
        x >= 0
            && y >= 0
            && z >= 0
            && (x as usize) < self.width
            && (y as usize) < self.height
            && (z as usize) < self.depth
    }

    pub fn get(&self, x: usize, y: usize, z: usize) -> Option<&T> {
        if x >= self.width || y >= self.height || z >= self.depth {
            return None;
        }
        self.data.get(self.index_of(x, y, z))
    }

    /// Signed lookup used by neighborhood stencils; `None` off-grid.
    #[inline]
    pub fn get_signed(&self, x: isize, y: isize, z: isize) -> Option<&T> {
        if !self.contains(x, y, z) {
            return None;
        }
        self.data
            .get(self.index_of(x as usize, y as usize, z as usize))
    }

    pub fn get_mut(&mut self, x: usize, y: usize, z: usize) -> Option<&mut T> {
        if x >= self.width || y >= self.height || z >= self.depth {
            return None;
        }
        let idx = self.index_of(x, y, z);
        self.data.get_mut(idx)
    }

    pub fn at(&self, v: Voxel) -> Option<&T> {
        self.get(v.x, v.y, v.z)
    }

    pub fn map<U>(&self, f: impl FnMut(&T) -> U) -> Raster<U> {
        Raster {
            width: self.width,
            height: self.height,
            depth: self.depth,
            data: self.data.iter().map(f).collect(),
        }
    }
}

impl<T: Clone> Raster<T> {
    pub fn new_fill(width: usize, height: usize, depth: usize, value: T) -> Self {
        let len = width
            .checked_mul(height)
            .and_then(|v| v.checked_mul(depth))
            .expect("raster size overflow");
        Self {
            width,
            height,
            depth,
            data: vec![value; len],
        }
    }

    pub fn set(&mut self, x: usize, y: usize, z: usize, value: T) -> Result<(), Error> {
        let px = self.get_mut(x, y, z).ok_or(Error::OutOfBounds)?;
        *px = value;
        Ok(())
    }
}

impl<T: Copy + PartialOrd> Raster<T> {
    /// Smallest and largest sample, or `None` for an empty raster.
    pub fn min_max(&self) -> Option<(T, T)> {
        let first = *self.data.first()?;
        let mut lo = first;
        let mut hi = first;
        for &v in &self.data[1..] {
            if v < lo {
                lo = v;
            }
            if v > hi {
                hi = v;
            }
        }
        Some((lo, hi))
    }
}
