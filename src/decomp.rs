//! Domain decomposition: a k-d tree over the point set whose leaves tile
//! the domain box exactly.
//!
//! Construction recursively splits the widest axis at the median point
//! until a range fits `leafsize`. Splitting physically reorders the global
//! index permutation, so every leaf owns one contiguous slice
//! `idx[start_idx..stop_idx)` -- the ownership ranges the consolidator
//! later keys on.
//!
//! Leaves reference each other by id only (the neighbor graph is cyclic
//! under periodic boundaries, including legal self-references when a leaf
//! spans a periodic axis alone), so neighbor lists are plain id vectors
//! over a flat leaf array. The tree is read-only after construction.

use ordered_float::OrderedFloat;

use log::debug;

use crate::error::{Error, Result};
use crate::points::PointArray;

/// Immutable descriptor of one partition of the domain.
#[derive(Debug, Clone)]
pub struct Leaf {
    pub id: usize,
    /// Half-open range owned by this leaf in the global permutation.
    pub start_idx: usize,
    pub stop_idx: usize,
    pub left_edge: [f64; 3],
    pub right_edge: [f64; 3],
    /// Per-axis ids of leaves sharing this leaf's lower / upper face.
    pub left_neighbors: [Vec<usize>; 3],
    pub right_neighbors: [Vec<usize>; 3],
    pub periodic_left: [bool; 3],
    pub periodic_right: [bool; 3],
    /// Width of the whole domain; meaningful where a periodic flag is set.
    pub domain_width: [f64; 3],
    pub num_leaves: usize,
}

impl Leaf {
    pub fn npts(&self) -> usize {
        self.stop_idx - self.start_idx
    }

    /// Union of the per-axis neighbor lists, self included only when the
    /// leaf is its own wrap-around neighbor.
    pub fn neighbor_ids(&self) -> Vec<usize> {
        let mut ids: Vec<usize> = self
            .left_neighbors
            .iter()
            .chain(self.right_neighbors.iter())
            .flatten()
            .copied()
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

/// The decomposition: leaves plus the global index permutation.
#[derive(Debug, Clone)]
pub struct DomainTree {
    dim: usize,
    pub leaves: Vec<Leaf>,
    /// Permutation of `0..N`; leaf `l` owns `idx[l.start_idx..l.stop_idx]`.
    pub idx: Vec<u64>,
    pub left_edge: [f64; 3],
    pub right_edge: [f64; 3],
    pub periodic: [bool; 3],
}

impl DomainTree {
    /// Non-periodic decomposition over the bounding box of `pts`.
    pub fn build(pts: &PointArray, leafsize: usize) -> Result<Self> {
        let (le, re) = pts.bounds();
        Self::build_in_domain(pts, leafsize, le, re, false)
    }

    /// Decomposition over an explicit domain box, optionally periodic on
    /// every axis.
    pub fn build_in_domain(
        pts: &PointArray,
        leafsize: usize,
        left_edge: [f64; 3],
        right_edge: [f64; 3],
        periodic: bool,
    ) -> Result<Self> {
        let dim = pts.dim();
        if leafsize == 0 {
            return Err(Error::Config("leafsize must be positive".into()));
        }
        if pts.is_empty() {
            return Err(Error::Config("cannot decompose an empty point set".into()));
        }
        for d in 0..dim {
            if !(left_edge[d] < right_edge[d]) {
                return Err(Error::Config(format!(
                    "domain edge order violated on axis {d}: {} >= {}",
                    left_edge[d], right_edge[d]
                )));
            }
        }

        let mut idx: Vec<u64> = (0..pts.len() as u64).collect();
        let mut boxes: Vec<([f64; 3], [f64; 3], usize, usize)> = Vec::new();
        split_range(pts, &mut idx, 0, pts.len(), left_edge, right_edge, leafsize, &mut boxes);
        debug!("decomposed {} points into {} leaves", pts.len(), boxes.len());

        let num_leaves = boxes.len();
        let mut width = [0.0; 3];
        for d in 0..dim {
            width[d] = right_edge[d] - left_edge[d];
        }
        let flags = [periodic && dim >= 1, periodic && dim >= 2, periodic && dim >= 3];

        let mut leaves: Vec<Leaf> = boxes
            .iter()
            .enumerate()
            .map(|(id, &(le, re, start, stop))| Leaf {
                id,
                start_idx: start,
                stop_idx: stop,
                left_edge: le,
                right_edge: re,
                left_neighbors: Default::default(),
                right_neighbors: Default::default(),
                periodic_left: [false; 3],
                periodic_right: [false; 3],
                domain_width: width,
                num_leaves,
            })
            .collect();

        // Face adjacency, axis by axis; wrap-around adjacency where the
        // domain is periodic. Overlap on the remaining axes is evaluated
        // on the torus: two leaves that only touch through another axis's
        // wrap (a corner across the periodic boundary) are neighbors too.
        let touches = |a: &Leaf, b: &Leaf, d: usize| -> bool {
            let direct = b.left_edge[d] <= a.right_edge[d] && b.right_edge[d] >= a.left_edge[d];
            let wrapped = flags[d]
                && ((a.left_edge[d] == left_edge[d] && b.right_edge[d] == right_edge[d])
                    || (a.right_edge[d] == right_edge[d] && b.left_edge[d] == left_edge[d]));
            direct || wrapped
        };
        let overlaps_other_axes = |a: &Leaf, b: &Leaf, axis: usize| -> bool {
            (0..dim).filter(|&d| d != axis).all(|d| touches(a, b, d))
        };
        let mut all_left: Vec<[Vec<usize>; 3]> = vec![Default::default(); num_leaves];
        let mut all_right: Vec<[Vec<usize>; 3]> = vec![Default::default(); num_leaves];
        for i in 0..num_leaves {
            for d in 0..dim {
                let mut left = Vec::new();
                let mut right = Vec::new();
                for j in 0..num_leaves {
                    if i != j && overlaps_other_axes(&leaves[i], &leaves[j], d) {
                        if leaves[j].right_edge[d] == leaves[i].left_edge[d] {
                            left.push(j);
                        }
                        if leaves[j].left_edge[d] == leaves[i].right_edge[d] {
                            right.push(j);
                        }
                    }
                }
                if flags[d] {
                    if leaves[i].left_edge[d] == left_edge[d] {
                        for j in 0..num_leaves {
                            if leaves[j].right_edge[d] == right_edge[d]
                                && overlaps_other_axes(&leaves[i], &leaves[j], d)
                            {
                                left.push(j);
                            }
                        }
                    }
                    if leaves[i].right_edge[d] == right_edge[d] {
                        for j in 0..num_leaves {
                            if leaves[j].left_edge[d] == left_edge[d]
                                && overlaps_other_axes(&leaves[i], &leaves[j], d)
                            {
                                right.push(j);
                            }
                        }
                    }
                }
                left.sort_unstable();
                left.dedup();
                right.sort_unstable();
                right.dedup();
                all_left[i][d] = left;
                all_right[i][d] = right;
            }
        }
        for (i, leaf) in leaves.iter_mut().enumerate() {
            for d in 0..dim {
                if flags[d] {
                    leaf.periodic_left[d] = leaf.left_edge[d] == left_edge[d];
                    leaf.periodic_right[d] = leaf.right_edge[d] == right_edge[d];
                }
            }
            leaf.left_neighbors = std::mem::take(&mut all_left[i]);
            leaf.right_neighbors = std::mem::take(&mut all_right[i]);
        }

        Ok(Self { dim, leaves, idx, left_edge, right_edge, periodic: flags })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn num_leaves(&self) -> usize {
        self.leaves.len()
    }

    pub fn leaf(&self, id: usize) -> &Leaf {
        &self.leaves[id]
    }
}

#[allow(clippy::too_many_arguments)]
fn split_range(
    pts: &PointArray,
    idx: &mut [u64],
    start: usize,
    stop: usize,
    le: [f64; 3],
    re: [f64; 3],
    leafsize: usize,
    out: &mut Vec<([f64; 3], [f64; 3], usize, usize)>,
) {
    let n = stop - start;
    if n <= leafsize {
        out.push((le, re, start, stop));
        return;
    }
    let dim = pts.dim();
    // Widest axis first; fall through to the next widest if every point
    // shares the same coordinate on it.
    let mut axes: Vec<usize> = (0..dim).collect();
    axes.sort_by_key(|&d| std::cmp::Reverse(OrderedFloat(re[d] - le[d])));
    for &axis in &axes {
        let range = &mut idx[start..stop];
        range.sort_by_key(|&i| OrderedFloat(pts.row(i as usize)[axis]));
        let m = n / 2;
        let lo = pts.row(range[m - 1] as usize)[axis];
        let hi = pts.row(range[m] as usize)[axis];
        let split = 0.5 * (lo + hi);
        if split <= le[axis] || split >= re[axis] {
            continue;
        }
        let mut lre = re;
        lre[axis] = split;
        let mut rle = le;
        rle[axis] = split;
        split_range(pts, idx, start, start + m, le, lre, leafsize, out);
        split_range(pts, idx, start + m, stop, rle, re, leafsize, out);
        return;
    }
    // Degenerate range (all points identical); keep it as one leaf.
    out.push((le, re, start, stop));
}
