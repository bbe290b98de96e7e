//! The consolidated global triangulation.
//!
//! A [`Triangulation`] is the final product of a run: global cell and
//! neighbor tables over the *original* point rows (the consolidator works
//! in permuted index space; [`Triangulation::deserialize_with_info`]
//! applies the permutation as its last step, exactly once). One canonical
//! infinite vertex closes the complex.
//!
//! Equality of triangulations is by canonical cell sets -- every cell as a
//! sorted vertex tuple with the infinite index normalized, the whole table
//! sorted -- together with the canonical neighbor relation (each cell's
//! tuple paired with its neighbors' tuples). Both forms are insensitive to
//! cell order, per-cell vertex order, and index width.

use std::collections::BTreeSet;

use crate::delaunay::{Delaunay, IndexKind, IndexVec};
use crate::error::{Error, Result};
use crate::points::PointArray;

#[derive(Debug, Clone)]
pub struct Triangulation {
    dim: usize,
    cells: Vec<u64>,
    neighbors: Vec<u64>,
    inf_idx: u64,
}

impl Triangulation {
    /// Build the final triangulation from consolidated tables, remapping
    /// every vertex through the decomposition permutation `idx`.
    pub fn deserialize_with_info(
        pts: &PointArray,
        idx: &[u64],
        cells: &IndexVec,
        neighbors: &IndexVec,
        inf_idx: u64,
    ) -> Result<Self> {
        let dim = pts.dim();
        let stride = dim + 1;
        if cells.len() != neighbors.len() || cells.len() % stride != 0 {
            return Err(Error::Protocol(format!(
                "consolidated tables of {} vertices and {} neighbors are not {}-cell shaped",
                cells.len(),
                neighbors.len(),
                stride
            )));
        }
        let mut mapped = Vec::with_capacity(cells.len());
        for v in cells.iter_u64() {
            if v == inf_idx {
                mapped.push(inf_idx);
            } else {
                let row = *idx.get(v as usize).ok_or_else(|| {
                    Error::Protocol(format!("vertex {v} outside the permutation"))
                })?;
                mapped.push(row);
            }
        }
        let ncells = (cells.len() / stride) as u64;
        for n in neighbors.iter_u64() {
            if n >= ncells {
                return Err(Error::Protocol(format!(
                    "neighbor {n} outside the {ncells}-cell table"
                )));
            }
        }
        Ok(Self {
            dim,
            cells: mapped,
            neighbors: neighbors.iter_u64().collect(),
            inf_idx,
        })
    }

    /// Serial reference: triangulate the whole array with one kernel.
    pub fn build_serial(pts: &PointArray) -> Result<Self> {
        let n = pts.len() as u64;
        let mut kernel = Delaunay::new(pts.dim())?;
        kernel.insert(pts.as_flat())?;
        let idx_local = IndexVec::from_range(IndexKind::U64, 0, n)?;
        let sc = kernel.serialize_info2idx(pts.len(), &idx_local)?;
        let identity: Vec<u64> = (0..n).collect();
        Self::deserialize_with_info(pts, &identity, &sc.cells, &sc.neighbors, sc.inf_idx)
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn inf_idx(&self) -> u64 {
        self.inf_idx
    }

    pub fn cells(&self) -> &[u64] {
        &self.cells
    }

    pub fn neighbors(&self) -> &[u64] {
        &self.neighbors
    }

    pub fn num_cells(&self) -> usize {
        self.cells.len() / (self.dim + 1)
    }

    fn cell_tuples(&self) -> impl Iterator<Item = &[u64]> {
        self.cells.chunks_exact(self.dim + 1)
    }

    pub fn num_infinite_cells(&self) -> usize {
        let inf = self.inf_idx;
        self.cell_tuples().filter(|c| c.contains(&inf)).count()
    }

    pub fn num_finite_cells(&self) -> usize {
        self.num_cells() - self.num_infinite_cells()
    }

    pub fn num_finite_verts(&self) -> usize {
        let inf = self.inf_idx;
        self.cells.iter().filter(|&&v| v != inf).collect::<BTreeSet<_>>().len()
    }

    pub fn num_verts(&self) -> usize {
        self.num_finite_verts() + usize::from(self.num_cells() > 0)
    }

    fn edge_set(&self) -> BTreeSet<(u64, u64)> {
        let mut edges = BTreeSet::new();
        for cell in self.cell_tuples() {
            for i in 0..cell.len() {
                for j in (i + 1)..cell.len() {
                    let (a, b) = (cell[i].min(cell[j]), cell[i].max(cell[j]));
                    edges.insert((a, b));
                }
            }
        }
        edges
    }

    pub fn num_edges(&self) -> usize {
        self.edge_set().len()
    }

    pub fn num_finite_edges(&self) -> usize {
        let inf = self.inf_idx;
        self.edge_set().iter().filter(|&&(a, b)| a != inf && b != inf).count()
    }

    pub fn num_infinite_edges(&self) -> usize {
        self.num_edges() - self.num_finite_edges()
    }

    fn canonical_tuple(&self, cell: &[u64]) -> [u64; 4] {
        let mut tup = [u64::MAX; 4];
        for (k, &v) in cell.iter().enumerate() {
            tup[k] = if v == self.inf_idx { u64::MAX } else { v };
        }
        tup[..cell.len()].sort_unstable();
        tup
    }

    /// Every cell as a sorted vertex tuple with the infinite index
    /// normalized to `u64::MAX`, the whole list sorted.
    pub fn canonical_cells(&self) -> Vec<[u64; 4]> {
        let mut out: Vec<[u64; 4]> =
            self.cell_tuples().map(|cell| self.canonical_tuple(cell)).collect();
        out.sort_unstable();
        out
    }

    /// The neighbor relation in canonical form: every cell's tuple paired
    /// with the sorted tuples of its `D + 1` neighbors, the whole list
    /// sorted. Cell indices never appear, so the relations of two
    /// differently-ordered tables compare directly.
    pub fn canonical_neighbors(&self) -> Vec<([u64; 4], Vec<[u64; 4]>)> {
        let stride = self.dim + 1;
        let keys: Vec<[u64; 4]> =
            self.cell_tuples().map(|cell| self.canonical_tuple(cell)).collect();
        let mut out = Vec::with_capacity(keys.len());
        for (i, &key) in keys.iter().enumerate() {
            let mut nbrs: Vec<[u64; 4]> = self.neighbors[i * stride..(i + 1) * stride]
                .iter()
                .map(|&n| keys[n as usize])
                .collect();
            nbrs.sort_unstable();
            out.push((key, nbrs));
        }
        out.sort_unstable();
        out
    }

    /// Structural equivalence after canonicalizing the infinite vertex:
    /// same finite cells, same hull cells (as unordered vertex sets), and
    /// the same neighbor relation between them.
    pub fn is_equivalent(&self, other: &Triangulation) -> bool {
        self.dim == other.dim
            && self.canonical_cells() == other.canonical_cells()
            && self.canonical_neighbors() == other.canonical_neighbors()
    }
}
