//! Test data builders: seeded point clouds and periodic references.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::delaunay::Delaunay;
use crate::error::Result;
use crate::points::PointArray;

/// `n` uniform points in `[-0.5, 0.5]^dim`, deterministic per seed.
pub fn random_points(n: usize, dim: usize, seed: u64) -> PointArray {
    let le = [-0.5; 3];
    let re = [0.5; 3];
    random_points_in(n, dim, seed, le, re)
}

/// `n` uniform points in the given box, deterministic per seed.
pub fn random_points_in(n: usize, dim: usize, seed: u64, le: [f64; 3], re: [f64; 3]) -> PointArray {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = Vec::with_capacity(n * dim);
    for _ in 0..n {
        for d in 0..dim {
            data.push(rng.gen_range(le[d]..re[d]));
        }
    }
    PointArray::from_flat(data, dim).expect("builder produced a valid array")
}

/// The input with one row duplicated at the end.
pub fn with_duplicate_row(pts: &PointArray, row: usize) -> PointArray {
    let mut data = pts.as_flat().to_vec();
    data.extend_from_slice(pts.row(row));
    PointArray::from_flat(data, pts.dim()).expect("builder produced a valid array")
}

/// The input augmented with all `3^dim - 1` periodic images of every point
/// for the domain box `[le, re]`. The original rows come first.
pub fn periodic_images(pts: &PointArray, le: [f64; 3], re: [f64; 3]) -> PointArray {
    let dim = pts.dim();
    let mut data = pts.as_flat().to_vec();
    let shifts_per_axis = [-1.0, 0.0, 1.0];
    let combos = 3usize.pow(dim as u32);
    for combo in 0..combos {
        let mut shift = [0.0; 3];
        let mut c = combo;
        for s in shift.iter_mut().take(dim) {
            *s = shifts_per_axis[c % 3];
            c /= 3;
        }
        if shift[..dim].iter().all(|&s| s == 0.0) {
            continue;
        }
        for i in 0..pts.len() {
            for (d, &x) in pts.row(i).iter().enumerate() {
                data.push(x + shift[d] * (re[d] - le[d]));
            }
        }
    }
    PointArray::from_flat(data, dim).expect("builder produced a valid array")
}

/// Reference Voronoi volumes for a fully periodic domain, computed
/// serially by triangulating the point set together with all its periodic
/// images and reading back the volumes of the original copies.
pub fn periodic_reference_volumes(
    pts: &PointArray,
    le: [f64; 3],
    re: [f64; 3],
) -> Result<Vec<f64>> {
    let augmented = periodic_images(pts, le, re);
    let mut kernel = Delaunay::new(pts.dim())?;
    kernel.insert(augmented.as_flat())?;
    let mut vols = kernel.voronoi_volumes()?;
    vols.truncate(pts.len());
    Ok(vols)
}
