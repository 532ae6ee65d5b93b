use ls_core::{Raster, Region};
use serde::{Deserialize, Serialize};

const DX: [isize; 8] = [1, 1, 0, -1, -1, -1, 0, 1];
const DY: [isize; 8] = [0, -1, -1, -1, 0, 1, 1, 1];
const DIRS_C4: [usize; 4] = [0, 2, 4, 6];
const DIRS_C8: [usize; 8] = [0, 1, 2, 3, 4, 5, 6, 7];

/// In-plane adjacency. On multi-slice rasters `C4` extends to the 6 face
/// neighbors and `C8` to the full 26-neighborhood.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    #[default]
    C4,
    C8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentConfig {
    pub connectivity: Connectivity,
    /// Components with fewer voxels are discarded (left at label 0).
    pub min_component_size: usize,
}

impl Default for ComponentConfig {
    fn default() -> Self {
        Self {
            connectivity: Connectivity::C4,
            min_component_size: 1,
        }
    }
}

/// Result of connected-component labeling.
///
/// Labels are `1..=regions.len()` in order of each component's first voxel
/// in raster-scan order; `0` marks unset voxels and discarded components.
#[derive(Debug, Clone)]
pub struct Labeling {
    pub labels: Raster<u32>,
    pub regions: Vec<Region>,
}

impl Labeling {
    pub fn num_components(&self) -> usize {
        self.regions.len()
    }
}

/// Sets voxels with `value >= threshold` to 1 and all others to 0.
pub fn binarize(img: &Raster<f32>, threshold: f32) -> Raster<u8> {
    img.map(|&v| u8::from(v >= threshold))
}

pub fn label_components(mask: &Raster<u8>, cfg: &ComponentConfig) -> Labeling {
    let (width, height, depth) = mask.dims();
    let n = mask.len();
    let mut labels = Raster::new_fill(width, height, depth, 0u32);
    let mut regions = Vec::new();

    if n == 0 {
        return Labeling { labels, regions };
    }

    let offsets = neighbor_offsets(cfg.connectivity, depth > 1);
    let min_size = cfg.min_component_size.max(1);

    let set = mask.data();
    let mut seen = vec![0_u8; n];
    let mut stack = Vec::new();
    let mut component = Vec::new();

    for i in 0..n {
        if set[i] == 0 || seen[i] != 0 {
            continue;
        }

        stack.clear();
        component.clear();
        seen[i] = 1;
        stack.push(i);

        while let Some(p) = stack.pop() {
            component.push(p);
            let v = mask.coords_of(p);
            for &(dx, dy, dz) in &offsets {
                let (nx, ny, nz) = (v.x as isize + dx, v.y as isize + dy, v.z as isize + dz);
                if !mask.contains(nx, ny, nz) {
                    continue;
                }
                let nb = mask.index_of(nx as usize, ny as usize, nz as usize);
                if set[nb] != 0 && seen[nb] == 0 {
                    seen[nb] = 1;
                    stack.push(nb);
                }
            }
        }

        if component.len() < min_size {
            continue;
        }

        // Stack order is arbitrary; keep region voxels in scan order.
        component.sort_unstable();
        let label = regions.len() as u32 + 1;
        let data = labels.data_mut();
        for &p in &component {
            data[p] = label;
        }
        regions.push(Region::new(
            component.iter().map(|&p| mask.coords_of(p)).collect(),
        ));
    }

    Labeling { labels, regions }
}

fn neighbor_offsets(connectivity: Connectivity, volumetric: bool) -> Vec<(isize, isize, isize)> {
    let dirs: &[usize] = match connectivity {
        Connectivity::C4 => &DIRS_C4,
        Connectivity::C8 => &DIRS_C8,
    };

    let mut out: Vec<(isize, isize, isize)> = dirs.iter().map(|&d| (DX[d], DY[d], 0)).collect();
    if !volumetric {
        return out;
    }

    match connectivity {
        Connectivity::C4 => {
            out.push((0, 0, -1));
            out.push((0, 0, 1));
        }
        Connectivity::C8 => {
            for dz in [-1isize, 1] {
                out.push((0, 0, dz));
                for &d in &DIRS_C8 {
                    out.push((DX[d], DY[d], dz));
                }
            }
        }
    }
    out
}
