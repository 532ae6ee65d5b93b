use ls_core::Raster;

const DX: [isize; 8] = [0, 1, 1, 1, 0, -1, -1, -1];
const DY: [isize; 8] = [-1, -1, 0, 1, 1, 1, 0, -1];

/// Marks voxels (with 1) that have at least one in-grid 8-neighbor within
/// their own slice carrying a different label. Off-grid neighbors never
/// make a voxel a boundary voxel.
pub fn boundary_mask<T: PartialEq>(labels: &Raster<T>) -> Raster<u8> {
    let (width, height, depth) = labels.dims();
    let mut out = Raster::new_fill(width, height, depth, 0u8);

    for z in 0..depth {
        for y in 0..height {
            for x in 0..width {
                let idx = labels.index_of(x, y, z);
                let val = &labels.data()[idx];
                let differs = (0..8).any(|n| {
                    labels
                        .get_signed(x as isize + DX[n], y as isize + DY[n], z as isize)
                        .is_some_and(|nb| nb != val)
                });
                if differs {
                    out.data_mut()[idx] = 1;
                }
            }
        }
    }

    out
}
