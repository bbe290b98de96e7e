//! Voronoi cell volumes from the dual of the triangulation.
//!
//! The dual cell of a finite vertex is bounded exactly when every incident
//! cell is finite; unbounded cells are reported as `-1.0`. Bounded cells
//! are measured from circumcenters:
//!
//! - 2D: the circumcenters of the cells around the vertex, taken in ring
//!   order, form the Voronoi polygon; its area is the shoelace area.
//! - 3D: each edge `(v, u)` of the triangulation is dual to one planar face
//!   of `v`'s Voronoi cell, the polygon of circumcenters of the cells
//!   around the edge; the cell volume is the sum of the pyramids from `v`
//!   over those faces.
//!
//! Rings are walked combinatorially through the neighbor structure (two
//! cells are ring-adjacent when they share a facet containing the pivot),
//! never by angle, so the ordering is exact.

use std::collections::BTreeSet;

use crate::delaunay::{Delaunay, INFINITE};
use crate::error::{Error, Result};
use crate::geometry::{circumsphere, polygon_area, pyramid_volume};

impl Delaunay {
    /// Volumes per insertion slot, in insertion order; duplicates report
    /// the volume of their shared vertex. `-1.0` marks unbounded cells.
    pub fn voronoi_volumes(&self) -> Result<Vec<f64>> {
        if !self.is_bootstrapped() {
            if self.num_slots() == 0 {
                return Ok(Vec::new());
            }
            return Err(Error::Degenerate(
                "triangulation never reached a full-rank simplex".into(),
            ));
        }
        let dim = self.dim();
        let nverts = self.num_finite_verts();
        let mut incident: Vec<Vec<usize>> = vec![Vec::new(); nverts];
        let mut unbounded = vec![false; nverts];
        for (c, cell) in self.alive_cells() {
            let infinite = cell.verts[..=dim].contains(&INFINITE);
            for &v in &cell.verts[..=dim] {
                if v == INFINITE {
                    continue;
                }
                if infinite {
                    unbounded[v] = true;
                } else {
                    incident[v].push(c);
                }
            }
        }

        // Circumcenters of all live finite cells, indexed by cell id.
        let mut centers: Vec<Option<[f64; 3]>> = vec![None; self.raw_cell_count()];
        for (c, cell) in self.alive_cells() {
            if !cell.verts[..=dim].contains(&INFINITE) {
                let vs: Vec<&[f64]> = cell.verts[..=dim].iter().map(|&v| self.point(v)).collect();
                centers[c] = circumsphere(dim, &vs).map(|(center, _)| center);
            }
        }

        let mut vol_vert = vec![-1.0f64; nverts];
        for v in 0..nverts {
            if unbounded[v] {
                continue;
            }
            let vol = if dim == 2 {
                self.polygon_around(v, &incident[v], &centers)
            } else {
                self.cell_volume_3d(v, &incident[v], &centers)
            };
            if let Some(vol) = vol {
                vol_vert[v] = vol;
            }
        }

        Ok((0..self.num_slots()).map(|s| vol_vert[self.slot_vert(s)]).collect())
    }

    /// 2D: shoelace area of the ring of circumcenters around `v`.
    fn polygon_around(&self, v: usize, incident: &[usize], centers: &[Option<[f64; 3]>]) -> Option<f64> {
        let ring = self.ring_cells(incident.first().copied()?, incident.len(), |cell| {
            let mut exits = [0usize; 2];
            let mut k = 0;
            for s in 0..=self.dim() {
                if self.cell(cell).verts[s] != v {
                    exits[k] = s;
                    k += 1;
                }
            }
            exits
        })?;
        let poly: Option<Vec<[f64; 3]>> = ring.iter().map(|&c| centers[c]).collect();
        Some(polygon_area(&poly?))
    }

    /// 3D: sum of face pyramids over every edge `(v, u)`.
    fn cell_volume_3d(&self, v: usize, incident: &[usize], centers: &[Option<[f64; 3]>]) -> Option<f64> {
        let mut others: BTreeSet<usize> = BTreeSet::new();
        for &c in incident {
            for &u in &self.cell(c).verts[..=self.dim()] {
                if u != v {
                    others.insert(u);
                }
            }
        }
        let mut vol = 0.0;
        for &u in &others {
            let around: Vec<usize> = incident
                .iter()
                .copied()
                .filter(|&c| self.cell(c).verts[..=self.dim()].contains(&u))
                .collect();
            let ring = self.ring_cells(around.first().copied()?, around.len(), |cell| {
                let mut exits = [0usize; 2];
                let mut k = 0;
                for s in 0..=self.dim() {
                    let w = self.cell(cell).verts[s];
                    if w != v && w != u {
                        exits[k] = s;
                        k += 1;
                    }
                }
                exits
            })?;
            let face: Option<Vec<[f64; 3]>> = ring.iter().map(|&c| centers[c]).collect();
            vol += pyramid_volume(self.point(v), &face?);
        }
        Some(vol)
    }

    /// Walk the closed ring of cells around a pivot (a vertex in 2D, an
    /// edge in 3D). `exits` yields the two slots of a cell whose neighbors
    /// also contain the pivot. Returns `None` if the ring does not close
    /// within the expected length.
    fn ring_cells(
        &self,
        start: usize,
        expect: usize,
        exits: impl Fn(usize) -> [usize; 2],
    ) -> Option<Vec<usize>> {
        let mut ring = vec![start];
        let [s0, _] = exits(start);
        let mut prev = start;
        let mut cur = self.cell(start).nbrs[s0];
        while cur != start {
            if ring.len() > expect {
                return None;
            }
            ring.push(cur);
            let [a, b] = exits(cur);
            let (na, nb) = (self.cell(cur).nbrs[a], self.cell(cur).nbrs[b]);
            let next = if na == prev { nb } else { na };
            prev = cur;
            cur = next;
        }
        if ring.len() == expect { Some(ring) } else { None }
    }
}
