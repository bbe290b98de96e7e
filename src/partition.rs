//! Per-leaf partition state and the halo protocol's local half.
//!
//! A [`PartitionWorker`] wraps one leaf's growing local triangulation. The
//! first `norig` insertion slots are the leaf's owned points; everything
//! after them is ghost points received from peers. `idx_local` maps every
//! slot back to its global (permuted) index and is the only thing that
//! crosses leaf boundaries -- coordinates are always re-read from the
//! shared point array by the receiver.
//!
//! The neighbor set is consumed on every send: after
//! [`PartitionWorker::outgoing_points`] the current neighbors move into
//! the cumulative `known` set and the active list is rebuilt exclusively
//! from incoming introductions. A peer introduced once is never
//! re-added, which is what makes a globally silent round a fixed point.

use std::collections::BTreeSet;

use log::debug;

use crate::decomp::Leaf;
use crate::delaunay::{Delaunay, IndexKind, IndexVec, arg_sort_serialized};
use crate::error::Result;
use crate::points::PointArray;
use crate::wire::SerializedLeaf;

/// One entry of the active neighbor list: a peer id and its bounding box,
/// already translated by `±domain_width` where the adjacency crosses a
/// periodic boundary. A peer reachable both directly and through a wrap
/// gets one entry per translation.
#[derive(Debug, Clone, PartialEq)]
pub struct NeighborEntry {
    pub id: usize,
    pub le: [f64; 3],
    pub re: [f64; 3],
}

pub struct PartitionWorker {
    leaf: Leaf,
    dim: usize,
    kernel: Delaunay,
    norig: usize,
    idx_local: IndexVec,
    neighbors: Vec<NeighborEntry>,
    known: BTreeSet<usize>,
}

impl PartitionWorker {
    /// `all_le` / `all_re` are the bounding boxes of every leaf in the
    /// decomposition, indexed by leaf id.
    pub fn new(leaf: Leaf, dim: usize, all_le: &[[f64; 3]], all_re: &[[f64; 3]]) -> Result<Self> {
        let kernel = Delaunay::new(dim)?;
        let kind = IndexKind::for_stop_idx(leaf.stop_idx as u64);
        let idx_local = IndexVec::from_range(kind, leaf.start_idx as u64, leaf.stop_idx as u64)?;

        // One entry per translated image of every neighbor: the cartesian
        // product of the per-axis shifts under which the peer touches this
        // leaf. A corner-wrap peer contributes its combined diagonal image
        // as well as the single-axis ones; the identity image of the leaf
        // itself is excluded.
        let mut neighbors = Vec::new();
        for k in leaf.neighbor_ids() {
            let mut shifts: Vec<[f64; 3]> = vec![[0.0; 3]];
            for d in 0..dim {
                let mut opts = Vec::new();
                if all_le[k][d] <= leaf.right_edge[d] && all_re[k][d] >= leaf.left_edge[d] {
                    opts.push(0.0);
                }
                if leaf.periodic_left[d] && leaf.left_neighbors[d].contains(&k) {
                    opts.push(-leaf.domain_width[d]);
                }
                if leaf.periodic_right[d] && leaf.right_neighbors[d].contains(&k) {
                    opts.push(leaf.domain_width[d]);
                }
                if opts.is_empty() {
                    opts.push(0.0);
                }
                shifts = shifts
                    .iter()
                    .flat_map(|s| {
                        opts.iter().map(move |&o| {
                            let mut s = *s;
                            s[d] = o;
                            s
                        })
                    })
                    .collect();
            }
            for shift in shifts {
                if k == leaf.id && shift[..dim].iter().all(|&s| s == 0.0) {
                    continue;
                }
                let mut le = all_le[k];
                let mut re = all_re[k];
                for d in 0..dim {
                    le[d] += shift[d];
                    re[d] += shift[d];
                }
                let entry = NeighborEntry { id: k, le, re };
                if !neighbors.contains(&entry) {
                    neighbors.push(entry);
                }
            }
        }
        Ok(Self {
            norig: leaf.npts(),
            leaf,
            dim,
            kernel,
            idx_local,
            neighbors,
            known: BTreeSet::new(),
        })
    }

    pub fn id(&self) -> usize {
        self.leaf.id
    }

    pub fn leaf(&self) -> &Leaf {
        &self.leaf
    }

    pub fn norig(&self) -> usize {
        self.norig
    }

    pub fn kernel(&self) -> &Delaunay {
        &self.kernel
    }

    /// Build the initial local triangulation over the owned slice of the
    /// permutation. Called exactly once, before any exchange round.
    pub fn tessellate(&mut self, pts: &PointArray, idx: &[u64]) -> Result<()> {
        let mut coords = Vec::with_capacity(self.norig * self.dim);
        for &g in &idx[self.leaf.start_idx..self.leaf.stop_idx] {
            coords.extend_from_slice(pts.row(g as usize));
        }
        self.kernel.insert(&coords)
    }

    /// Owned points to send this round, as one optional payload per leaf
    /// id, plus the neighbor introductions `(ids, le, re)` that ride along
    /// with every payload. Consumes the active neighbor set.
    #[allow(clippy::type_complexity)]
    pub fn outgoing_points(
        &mut self,
    ) -> (Vec<Option<Vec<u64>>>, Vec<usize>, Vec<[f64; 3]>, Vec<[f64; 3]>) {
        let boxes: Vec<([f64; 3], [f64; 3])> =
            self.neighbors.iter().map(|e| (e.le, e.re)).collect();
        let candidates = self.kernel.outgoing_points(&boxes);

        let mut sendmap: Vec<Option<Vec<u64>>> = vec![None; self.leaf.num_leaves];
        for (entry, slots) in self.neighbors.iter().zip(candidates) {
            let payload = sendmap[entry.id].get_or_insert_with(Vec::new);
            for slot in slots {
                if slot < self.norig {
                    payload.push(self.idx_local.get(slot));
                }
            }
        }
        for payload in sendmap.iter_mut().flatten() {
            payload.sort_unstable();
            payload.dedup();
        }

        let ids: Vec<usize> = self.neighbors.iter().map(|e| e.id).collect();
        let les: Vec<[f64; 3]> = self.neighbors.iter().map(|e| e.le).collect();
        let res: Vec<[f64; 3]> = self.neighbors.iter().map(|e| e.re).collect();
        self.known.extend(ids.iter().copied());
        self.neighbors.clear();
        (sendmap, ids, les, res)
    }

    /// Ingest a halo payload from `from_leaf`: wrap coordinates across
    /// periodic boundaries, append the global indices, insert the points,
    /// and adopt any previously unknown neighbor introductions.
    pub fn incoming_points(
        &mut self,
        from_leaf: usize,
        global_idx: &[u64],
        nbr_ids: &[usize],
        nbr_le: &[[f64; 3]],
        nbr_re: &[[f64; 3]],
        mut positions: Vec<f64>,
    ) -> Result<()> {
        if global_idx.is_empty() {
            return Ok(());
        }
        self.wrap_positions(from_leaf, &mut positions);
        for &g in global_idx {
            self.idx_local.try_push(g)?;
        }
        self.kernel.insert(&positions)?;
        for (i, &k) in nbr_ids.iter().enumerate() {
            if k == self.leaf.id || self.known.contains(&k) {
                continue;
            }
            let entry = NeighborEntry { id: k, le: nbr_le[i], re: nbr_re[i] };
            if !self.neighbors.contains(&entry) {
                debug!("leaf {} learned neighbor {} from {}", self.leaf.id, k, from_leaf);
                self.neighbors.push(entry);
            }
        }
        Ok(())
    }

    /// Periodic coordinate wrapping. A self-send moves each coordinate to
    /// whichever side of the leaf's own box is nearer; a send from a
    /// wrap-adjacent peer translates the points whose wrapped position is
    /// closer than the raw one. Ties (a point exactly on the midline) keep
    /// the original coordinate.
    fn wrap_positions(&self, from_leaf: usize, positions: &mut [f64]) {
        let leaf = &self.leaf;
        if from_leaf == leaf.id {
            for d in 0..self.dim {
                if !(leaf.periodic_left[d] && leaf.periodic_right[d]) {
                    continue;
                }
                for p in positions.chunks_exact_mut(self.dim) {
                    let dl = p[d] - leaf.left_edge[d];
                    let dr = leaf.right_edge[d] - p[d];
                    if dl < dr {
                        p[d] += leaf.domain_width[d];
                    } else if dr < dl {
                        p[d] -= leaf.domain_width[d];
                    }
                }
            }
            return;
        }
        for d in 0..self.dim {
            if leaf.periodic_right[d] && leaf.right_neighbors[d].contains(&from_leaf) {
                for p in positions.chunks_exact_mut(self.dim) {
                    if p[d] + leaf.domain_width[d] - leaf.right_edge[d] < leaf.left_edge[d] - p[d] {
                        p[d] += leaf.domain_width[d];
                    }
                }
            }
            if leaf.periodic_left[d] && leaf.left_neighbors[d].contains(&from_leaf) {
                for p in positions.chunks_exact_mut(self.dim) {
                    if leaf.left_edge[d] - p[d] + leaf.domain_width[d] < p[d] - leaf.right_edge[d] {
                        p[d] -= leaf.domain_width[d];
                    }
                }
            }
        }
    }

    /// Serialize the final local triangulation. Repeated calls return the
    /// same tables.
    pub fn serialize(&self) -> Result<SerializedLeaf> {
        let sc = self.kernel.serialize_info2idx(self.norig, &self.idx_local)?;
        let (vert_sort, cell_sort) = arg_sort_serialized(&sc.cells, self.dim + 1);
        Ok(SerializedLeaf {
            leaf_id: self.leaf.id as u64,
            dim: self.dim,
            cells: sc.cells,
            neighbors: sc.neighbors,
            inf_idx: sc.inf_idx,
            vert_sort,
            cell_sort,
            ncells_total: sc.ncells_total as u64,
        })
    }

    /// Voronoi volumes of the originally owned points; `-1.0` marks cells
    /// the kernel reports as unbounded.
    pub fn voronoi_volumes(&self) -> Result<Vec<f64>> {
        let mut vols = self.kernel.voronoi_volumes()?;
        vols.truncate(self.norig);
        Ok(vols)
    }
}
