//! The serial Delaunay kernel.
//!
//! An incremental Bowyer-Watson triangulation over a growing point set,
//! dimension 2 or 3 chosen at runtime. The complex is closed by a single
//! **infinite vertex** (sentinel [`INFINITE`]): every hull facet is shared
//! between a finite cell and an infinite cell, so all of space is covered
//! and neighbor slots are total. Neighbor `i` of a cell sits opposite
//! vertex `i`.
//!
//! The kernel is what a partition worker wraps (one instance per leaf) and
//! what the serial reference triangulation is built from. Operations:
//!
//! - [`Delaunay::insert`] -- incremental insertion. Bit-identical duplicate
//!   points resolve to the existing vertex; a degenerate prefix (fewer than
//!   `D + 1` affinely independent points seen so far) is buffered and
//!   flushed once a full-rank simplex exists.
//! - [`Delaunay::outgoing_points`] -- halo candidates per query box: the
//!   vertices of any cell whose circumball meets the closed box, with the
//!   outer half-space standing in for the circumball of infinite cells.
//! - [`Delaunay::serialize_info2idx`] (in [`serialize`]) -- exportable cell
//!   and neighbor tables restricted to cells with at least one owned
//!   vertex.
//! - [`Delaunay::voronoi_volumes`] (in [`volumes`]) -- dual cell volumes
//!   with `-1` marking unbounded cells.
//!
//! Predicate tie rule: a point exactly on a circumsphere is *not* in
//! conflict. Points landing exactly on the hull's supporting hyperplane
//! are handled by the facet-circumsphere test so they still triangulate.

pub mod serialize;
pub mod volumes;

pub use serialize::{IndexKind, IndexVec, SerializedCells, arg_sort_serialized};

use std::collections::{BTreeSet, HashMap};

use log::trace;

use crate::error::{Error, Result};
use crate::geometry::{
    ball_box_intersects, circumsphere, facet_in_sphere, halfspace_box_intersects, in_sphere2,
    in_sphere3, orient_facet, orient2d, orient3d,
};

/// Vertex sentinel for the single vertex at infinity.
pub const INFINITE: usize = usize::MAX;

const UNSET: usize = usize::MAX - 1;

/// One cell of the complex: a triangle (2D) or tetrahedron (3D), possibly
/// infinite. Slots `D + 1 ..` are unused.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Cell {
    pub verts: [usize; 4],
    pub nbrs: [usize; 4],
    pub alive: bool,
}

pub struct Delaunay {
    dim: usize,
    /// Vertex coordinates, stride `dim`.
    coords: Vec<f64>,
    /// Vertex -> insertion slot of its first insertion.
    vert_slot: Vec<usize>,
    /// Insertion slot -> vertex (duplicates share a vertex).
    slot_vert: Vec<usize>,
    cells: Vec<Cell>,
    free: Vec<usize>,
    /// Exact-coordinate dedup: coordinate bit pattern -> vertex.
    dedup: HashMap<[u64; 3], usize>,
    /// Vertices waiting for the first full-rank simplex.
    pending: Vec<usize>,
    bootstrapped: bool,
    /// Walk start for point location.
    hint: usize,
    /// Cavity stamps, aligned with `cells`.
    mark: Vec<u64>,
    stamp: u64,
}

impl Delaunay {
    pub fn new(dim: usize) -> Result<Self> {
        if !(2..=3).contains(&dim) {
            return Err(Error::Config(format!("dimension must be 2 or 3, got {dim}")));
        }
        Ok(Self {
            dim,
            coords: Vec::new(),
            vert_slot: Vec::new(),
            slot_vert: Vec::new(),
            cells: Vec::new(),
            free: Vec::new(),
            dedup: HashMap::new(),
            pending: Vec::new(),
            bootstrapped: false,
            hint: 0,
            mark: Vec::new(),
            stamp: 0,
        })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of insertion slots seen so far (duplicates included).
    pub fn num_slots(&self) -> usize {
        self.slot_vert.len()
    }

    pub fn num_finite_verts(&self) -> usize {
        self.vert_slot.len()
    }

    pub fn num_verts(&self) -> usize {
        self.num_finite_verts() + usize::from(self.bootstrapped)
    }

    pub fn num_cells(&self) -> usize {
        self.alive_cells().count()
    }

    pub fn num_finite_cells(&self) -> usize {
        self.alive_cells().filter(|&(_, c)| !self.cell_is_infinite(c)).count()
    }

    pub fn num_infinite_cells(&self) -> usize {
        self.num_cells() - self.num_finite_cells()
    }

    fn edge_set(&self) -> BTreeSet<(usize, usize)> {
        let mut edges = BTreeSet::new();
        for (_, cell) in self.alive_cells() {
            for i in 0..=self.dim {
                for j in (i + 1)..=self.dim {
                    let (a, b) = (cell.verts[i], cell.verts[j]);
                    edges.insert((a.min(b), a.max(b)));
                }
            }
        }
        edges
    }

    pub fn num_edges(&self) -> usize {
        self.edge_set().len()
    }

    pub fn num_finite_edges(&self) -> usize {
        self.edge_set().iter().filter(|&&(_, b)| b != INFINITE).count()
    }

    pub fn num_infinite_edges(&self) -> usize {
        self.num_edges() - self.num_finite_edges()
    }

    pub(crate) fn point(&self, v: usize) -> &[f64] {
        &self.coords[v * self.dim..(v + 1) * self.dim]
    }

    pub(crate) fn alive_cells(&self) -> impl Iterator<Item = (usize, &Cell)> {
        self.cells.iter().enumerate().filter(|(_, c)| c.alive)
    }

    pub(crate) fn cell(&self, c: usize) -> &Cell {
        &self.cells[c]
    }

    /// Length of the cell store including dead slots; indexes returned by
    /// [`Self::alive_cells`] are always below this.
    pub(crate) fn raw_cell_count(&self) -> usize {
        self.cells.len()
    }

    pub(crate) fn is_bootstrapped(&self) -> bool {
        self.bootstrapped
    }

    pub(crate) fn vert_slot(&self, v: usize) -> usize {
        self.vert_slot[v]
    }

    pub(crate) fn slot_vert(&self, slot: usize) -> usize {
        self.slot_vert[slot]
    }

    fn cell_is_infinite(&self, c: &Cell) -> bool {
        c.verts[..=self.dim].contains(&INFINITE)
    }

    pub(crate) fn inf_slot(&self, c: usize) -> Option<usize> {
        self.cells[c].verts[..=self.dim].iter().position(|&v| v == INFINITE)
    }

    fn coord_key(&self, p: &[f64]) -> [u64; 3] {
        let mut k = [0u64; 3];
        for (d, &c) in p.iter().enumerate() {
            k[d] = c.to_bits();
        }
        k
    }

    /// Insert points given as a flat coordinate buffer (stride `dim`).
    ///
    /// Insertion order is significant only for degenerate (cocircular /
    /// cospherical) configurations; for points in general position the
    /// result is the unique Delaunay triangulation of the set.
    pub fn insert(&mut self, coords: &[f64]) -> Result<()> {
        if coords.len() % self.dim != 0 {
            return Err(Error::Config(format!(
                "coordinate buffer of length {} is not a multiple of dim {}",
                coords.len(),
                self.dim
            )));
        }
        for row in coords.chunks_exact(self.dim) {
            let slot = self.slot_vert.len();
            let key = self.coord_key(row);
            if let Some(&v) = self.dedup.get(&key) {
                self.slot_vert.push(v);
                continue;
            }
            let v = self.vert_slot.len();
            self.coords.extend_from_slice(row);
            self.vert_slot.push(slot);
            self.slot_vert.push(v);
            self.dedup.insert(key, v);
            if self.bootstrapped {
                self.link_vertex(v)?;
            } else {
                self.pending.push(v);
                self.try_bootstrap()?;
            }
        }
        Ok(())
    }

    /// Halo candidates: for every query box, the insertion indices of all
    /// vertices belonging to a cell whose (closed) circumball meets the
    /// box. Infinite cells contribute their finite vertices wherever the
    /// box meets the closed outer half-space of the hull facet. Results
    /// are sorted ascending and deduplicated.
    pub fn outgoing_points(&self, boxes: &[([f64; 3], [f64; 3])]) -> Vec<Vec<usize>> {
        let dim = self.dim;
        let mut out: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); boxes.len()];
        if !self.bootstrapped {
            // Degenerate (lower-dimensional) complex: every point is on
            // the boundary, so every point is a candidate everywhere.
            return boxes.iter().map(|_| (0..self.num_slots()).collect()).collect();
        }
        for (c, cell) in self.alive_cells() {
            if let Some(islot) = self.inf_slot(c) {
                let fv = self.facet_verts(c, islot);
                let facet: Vec<&[f64]> = fv[..dim].iter().map(|&v| self.point(v)).collect();
                let witness = self.witness_of(c, islot);
                for (bi, (le, re)) in boxes.iter().enumerate() {
                    if halfspace_box_intersects(dim, &facet, self.point(witness), &le[..dim], &re[..dim])
                    {
                        for &v in &fv[..dim] {
                            out[bi].insert(self.vert_slot[v]);
                        }
                    }
                }
            } else {
                let vs: Vec<&[f64]> =
                    cell.verts[..=dim].iter().map(|&v| self.point(v)).collect();
                let ball = circumsphere(dim, &vs);
                for (bi, (le, re)) in boxes.iter().enumerate() {
                    let hit = match ball {
                        Some((center, r2)) => {
                            ball_box_intersects(dim, &center, r2, &le[..dim], &re[..dim])
                        }
                        // Flat cell: no meaningful ball, send conservatively.
                        None => true,
                    };
                    if hit {
                        for &v in &cell.verts[..=dim] {
                            out[bi].insert(self.vert_slot[v]);
                        }
                    }
                }
            }
        }
        out.into_iter().map(|s| s.into_iter().collect()).collect()
    }

    /// Structural validity: neighbor reciprocity, positive orientation of
    /// finite cells, and the local Delaunay property across every shared
    /// facet.
    pub fn is_valid(&self) -> bool {
        for (c, cell) in self.alive_cells() {
            for slot in 0..=self.dim {
                let n = cell.nbrs[slot];
                if !self.cells[n].alive {
                    return false;
                }
                if !self.cells[n].nbrs[..=self.dim].contains(&c) {
                    return false;
                }
            }
            if !self.cell_is_infinite(cell) {
                let vs: Vec<&[f64]> =
                    cell.verts[..=self.dim].iter().map(|&v| self.point(v)).collect();
                if self.orient_simplex(&vs) < 0.0 {
                    return false;
                }
                // Empty-sphere against each neighbor's opposite vertex.
                for slot in 0..=self.dim {
                    let n = cell.nbrs[slot];
                    let back = self.cells[n].nbrs[..=self.dim]
                        .iter()
                        .position(|&x| x == c)
                        .unwrap();
                    let w = self.cells[n].verts[back];
                    if w != INFINITE && self.in_sphere_cell(cell, self.point(w)) > 0.0 {
                        return false;
                    }
                }
            }
        }
        true
    }

    // ---- internals ----------------------------------------------------

    fn orient_simplex(&self, vs: &[&[f64]]) -> f64 {
        match self.dim {
            2 => orient2d(vs[0], vs[1], vs[2]),
            _ => orient3d(vs[0], vs[1], vs[2], vs[3]),
        }
    }

    fn in_sphere_cell(&self, cell: &Cell, p: &[f64]) -> f64 {
        match self.dim {
            2 => in_sphere2(
                self.point(cell.verts[0]),
                self.point(cell.verts[1]),
                self.point(cell.verts[2]),
                p,
            ),
            _ => in_sphere3(
                self.point(cell.verts[0]),
                self.point(cell.verts[1]),
                self.point(cell.verts[2]),
                self.point(cell.verts[3]),
                p,
            ),
        }
    }

    /// The facet of `c` opposite `slot`, in stored vertex order.
    fn facet_verts(&self, c: usize, slot: usize) -> [usize; 3] {
        let mut fv = [UNSET; 3];
        let mut k = 0;
        for s in 0..=self.dim {
            if s != slot {
                fv[k] = self.cells[c].verts[s];
                k += 1;
            }
        }
        fv
    }

    /// A vertex strictly on the inner side of the hull facet of the
    /// infinite cell `c` (`islot` = slot of the infinite vertex): the
    /// opposite vertex of the finite cell across the facet.
    fn witness_of(&self, c: usize, islot: usize) -> usize {
        let inner = self.cells[c].nbrs[islot];
        let back = self.cells[inner].nbrs[..=self.dim]
            .iter()
            .position(|&x| x == c)
            .expect("neighbor reciprocity");
        self.cells[inner].verts[back]
    }

    fn in_conflict(&self, c: usize, p: &[f64]) -> bool {
        let dim = self.dim;
        match self.inf_slot(c) {
            Some(islot) => {
                let fv = self.facet_verts(c, islot);
                let facet: Vec<&[f64]> = fv[..dim].iter().map(|&v| self.point(v)).collect();
                let q = self.witness_of(c, islot);
                let oq = orient_facet(dim, &facet, self.point(q));
                if oq == 0.0 {
                    return false;
                }
                let op = orient_facet(dim, &facet, p);
                if op == 0.0 {
                    facet_in_sphere(dim, &facet, p) > 0.0
                } else {
                    (op > 0.0) != (oq > 0.0)
                }
            }
            None => self.in_sphere_cell(&self.cells[c], p) > 0.0,
        }
    }

    /// True when `p` lies inside or on the boundary of the finite cell `c`.
    fn cell_contains(&self, c: usize, p: &[f64]) -> bool {
        for slot in 0..=self.dim {
            let fv = self.facet_verts(c, slot);
            let facet: Vec<&[f64]> =
                fv[..self.dim].iter().map(|&v| self.point(v)).collect();
            let oq = orient_facet(self.dim, &facet, self.point(self.cells[c].verts[slot]));
            let op = orient_facet(self.dim, &facet, p);
            if oq != 0.0 && op != 0.0 && (op > 0.0) != (oq > 0.0) {
                return false;
            }
        }
        true
    }

    fn first_alive(&self) -> usize {
        self.cells.iter().position(|c| c.alive).expect("non-empty complex")
    }

    /// Visibility walk towards `p`, then a conflict check with scan
    /// fallbacks for the degenerate cases.
    fn find_seed(&self, p: &[f64]) -> Option<usize> {
        let mut c = if self.hint < self.cells.len() && self.cells[self.hint].alive {
            self.hint
        } else {
            self.first_alive()
        };
        if let Some(islot) = self.inf_slot(c) {
            c = self.cells[c].nbrs[islot];
        }
        let mut steps = 0usize;
        'walk: loop {
            if self.inf_slot(c).is_some() {
                break;
            }
            steps += 1;
            if steps > self.cells.len() + 4 {
                break;
            }
            for slot in 0..=self.dim {
                let fv = self.facet_verts(c, slot);
                let facet: Vec<&[f64]> =
                    fv[..self.dim].iter().map(|&v| self.point(v)).collect();
                let oq =
                    orient_facet(self.dim, &facet, self.point(self.cells[c].verts[slot]));
                if oq == 0.0 {
                    continue;
                }
                let op = orient_facet(self.dim, &facet, p);
                if op != 0.0 && (op > 0.0) != (oq > 0.0) {
                    c = self.cells[c].nbrs[slot];
                    continue 'walk;
                }
            }
            break;
        }
        if self.in_conflict(c, p) {
            return Some(c);
        }
        // Walk ended without a conflict: a degenerate landing. Scan.
        trace!("conflict walk fell back to a full scan");
        for (i, _) in self.alive_cells() {
            if self.in_conflict(i, p) {
                return Some(i);
            }
        }
        // Point exactly on the circumsphere of its containing cell.
        for (i, cell) in self.alive_cells() {
            if !self.cell_is_infinite(cell) && self.cell_contains(i, p) {
                return Some(i);
            }
        }
        None
    }

    fn alloc_cell(&mut self, verts: [usize; 4]) -> usize {
        let cell = Cell { verts, nbrs: [UNSET; 4], alive: true };
        match self.free.pop() {
            Some(i) => {
                self.cells[i] = cell;
                i
            }
            None => {
                self.cells.push(cell);
                self.mark.push(0);
                self.cells.len() - 1
            }
        }
    }

    /// Insert an already-registered vertex into the complex.
    fn link_vertex(&mut self, v: usize) -> Result<()> {
        let mut p = [0.0f64; 3];
        p[..self.dim].copy_from_slice(self.point(v));
        let p = &p[..self.dim];

        let seed = self.find_seed(p).ok_or_else(|| {
            Error::Degenerate("no conflict cell found for insertion point".into())
        })?;

        // Grow the conflict cavity.
        self.stamp += 1;
        let stamp = self.stamp;
        self.mark[seed] = stamp;
        let mut cavity = vec![seed];
        let mut boundary: Vec<(usize, usize, usize)> = Vec::new();
        let mut head = 0;
        while head < cavity.len() {
            let c = cavity[head];
            head += 1;
            for slot in 0..=self.dim {
                let n = self.cells[c].nbrs[slot];
                if self.mark[n] == stamp {
                    continue;
                }
                if self.in_conflict(n, p) {
                    self.mark[n] = stamp;
                    cavity.push(n);
                } else {
                    boundary.push((c, slot, n));
                }
            }
        }
        if boundary.is_empty() {
            return Err(Error::Degenerate("conflict cavity has no boundary".into()));
        }

        // Star the cavity boundary from the new vertex.
        let mut created: Vec<usize> = Vec::with_capacity(boundary.len());
        let mut ridges: HashMap<[usize; 2], (usize, usize)> = HashMap::new();
        for &(c, slot, out) in &boundary {
            let fv = self.facet_verts(c, slot);
            let mut verts = [UNSET; 4];
            verts[0] = v;
            verts[1..=self.dim].copy_from_slice(&fv[..self.dim]);
            if !verts[..=self.dim].contains(&INFINITE) {
                let vs: Vec<&[f64]> =
                    verts[..=self.dim].iter().map(|&x| self.point(x)).collect();
                if self.orient_simplex(&vs) < 0.0 {
                    verts.swap(1, 2);
                }
            }
            let nc = self.alloc_cell(verts);
            created.push(nc);
            // Across the boundary facet.
            self.cells[nc].nbrs[0] = out;
            let oslot = self.cells[out].nbrs[..=self.dim]
                .iter()
                .position(|&x| x == c)
                .expect("boundary neighbor reciprocity");
            self.cells[out].nbrs[oslot] = nc;
            // Between new cells, matched on the shared ridge.
            for j in 1..=self.dim {
                let mut rk = [UNSET; 2];
                let mut k = 0;
                for s in 1..=self.dim {
                    if s != j {
                        rk[k] = self.cells[nc].verts[s];
                        k += 1;
                    }
                }
                rk[..k].sort_unstable();
                match ridges.get(&rk) {
                    Some(&(other, oj)) => {
                        self.cells[nc].nbrs[j] = other;
                        self.cells[other].nbrs[oj] = nc;
                    }
                    None => {
                        ridges.insert(rk, (nc, j));
                    }
                }
            }
        }

        for &c in &cavity {
            self.cells[c].alive = false;
            self.free.push(c);
        }
        self.hint = created[0];
        Ok(())
    }

    fn independent(&self, basis: &[usize], v: usize) -> bool {
        let p = self.point(v);
        match (self.dim, basis.len()) {
            (_, 1) => true,
            (2, 2) => orient2d(self.point(basis[0]), self.point(basis[1]), p) != 0.0,
            (3, 2) => {
                let a = self.point(basis[0]);
                let b = self.point(basis[1]);
                let u = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
                let w = [p[0] - a[0], p[1] - a[1], p[2] - a[2]];
                let cx = u[1] * w[2] - u[2] * w[1];
                let cy = u[2] * w[0] - u[0] * w[2];
                let cz = u[0] * w[1] - u[1] * w[0];
                cx != 0.0 || cy != 0.0 || cz != 0.0
            }
            (3, 3) => {
                orient3d(
                    self.point(basis[0]),
                    self.point(basis[1]),
                    self.point(basis[2]),
                    p,
                ) != 0.0
            }
            _ => false,
        }
    }

    fn try_bootstrap(&mut self) -> Result<()> {
        if self.pending.len() < self.dim + 1 {
            return Ok(());
        }
        let mut basis = vec![self.pending[0]];
        for &v in &self.pending[1..] {
            if self.independent(&basis, v) {
                basis.push(v);
                if basis.len() == self.dim + 1 {
                    break;
                }
            }
        }
        if basis.len() < self.dim + 1 {
            return Ok(());
        }
        self.build_first_simplex(&basis);
        self.bootstrapped = true;
        let rest: Vec<usize> =
            self.pending.drain(..).filter(|v| !basis.contains(v)).collect();
        for v in rest {
            self.link_vertex(v)?;
        }
        Ok(())
    }

    fn build_first_simplex(&mut self, basis: &[usize]) {
        let mut verts = [UNSET; 4];
        verts[..=self.dim].copy_from_slice(basis);
        let vs: Vec<&[f64]> = verts[..=self.dim].iter().map(|&x| self.point(x)).collect();
        if self.orient_simplex(&vs) < 0.0 {
            verts.swap(1, 2);
        }
        let c0 = self.alloc_cell(verts);
        let mut inf_ids = [UNSET; 4];
        for (i, id) in inf_ids[..=self.dim].iter_mut().enumerate() {
            let mut iv = verts;
            iv[i] = INFINITE;
            *id = self.alloc_cell(iv);
        }
        for i in 0..=self.dim {
            self.cells[c0].nbrs[i] = inf_ids[i];
            for k in 0..=self.dim {
                self.cells[inf_ids[i]].nbrs[k] = if k == i { c0 } else { inf_ids[k] };
            }
        }
        self.hint = c0;
    }
}
