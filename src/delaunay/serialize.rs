//! Serialized cell tables and the index-width dimorphism.
//!
//! Whether a leaf's serialized tables use 32- or 64-bit indices is a
//! run-time choice driven by the leaf's highest owned index (with a 10x
//! headroom factor for ghosts and cell counts). The choice is carried as a
//! tagged variant -- [`IndexVec`] -- rather than as a type parameter, so
//! the coordinator and the wire format stay monomorphic.

use crate::delaunay::{Delaunay, INFINITE};
use crate::error::{Error, Result};

/// Index width of a serialized table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    U32,
    U64,
}

impl IndexKind {
    /// Width for a leaf whose owned range ends at `stop_idx`, with the 10x
    /// headroom the exchange protocol assumes for ghosts and cell counts.
    pub fn for_stop_idx(stop_idx: u64) -> Self {
        if stop_idx.saturating_mul(10) < u64::from(u32::MAX) {
            IndexKind::U32
        } else {
            IndexKind::U64
        }
    }

    /// Wire dtype code: 0 for u32, 1 for u64.
    pub fn dtype_code(self) -> u64 {
        match self {
            IndexKind::U32 => 0,
            IndexKind::U64 => 1,
        }
    }

    /// The infinite-vertex sentinel for this width.
    pub fn inf(self) -> u64 {
        match self {
            IndexKind::U32 => u64::from(u32::MAX),
            IndexKind::U64 => u64::MAX,
        }
    }

    /// Bytes per index.
    pub fn width(self) -> usize {
        match self {
            IndexKind::U32 => 4,
            IndexKind::U64 => 8,
        }
    }
}

/// A flat index table tagged with its width.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexVec {
    U32(Vec<u32>),
    U64(Vec<u64>),
}

impl IndexVec {
    pub fn new(kind: IndexKind) -> Self {
        Self::with_capacity(kind, 0)
    }

    pub fn with_capacity(kind: IndexKind, cap: usize) -> Self {
        match kind {
            IndexKind::U32 => IndexVec::U32(Vec::with_capacity(cap)),
            IndexKind::U64 => IndexVec::U64(Vec::with_capacity(cap)),
        }
    }

    /// A half-open range `[start, stop)` materialized in the given width.
    pub fn from_range(kind: IndexKind, start: u64, stop: u64) -> Result<Self> {
        let mut v = Self::with_capacity(kind, (stop - start) as usize);
        for i in start..stop {
            v.try_push(i)?;
        }
        Ok(v)
    }

    pub fn kind(&self) -> IndexKind {
        match self {
            IndexVec::U32(_) => IndexKind::U32,
            IndexVec::U64(_) => IndexKind::U64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            IndexVec::U32(v) => v.len(),
            IndexVec::U64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, i: usize) -> u64 {
        match self {
            IndexVec::U32(v) => u64::from(v[i]),
            IndexVec::U64(v) => v[i],
        }
    }

    /// Push a value, failing if it does not fit the table's width.
    pub fn try_push(&mut self, x: u64) -> Result<()> {
        match self {
            IndexVec::U32(v) => {
                let narrow = u32::try_from(x).map_err(|_| {
                    Error::Protocol(format!("index {x} does not fit a 32-bit leaf table"))
                })?;
                v.push(narrow);
            }
            IndexVec::U64(v) => v.push(x),
        }
        Ok(())
    }

    pub fn iter_u64(&self) -> impl Iterator<Item = u64> + '_ {
        (0..self.len()).map(move |i| self.get(i))
    }
}

/// Result of [`Delaunay::serialize_info2idx`].
#[derive(Debug, Clone)]
pub struct SerializedCells {
    /// `ncells x (D+1)` vertex table, vertices mapped through the caller's
    /// local-to-global index map, infinite vertex as `inf_idx`.
    pub cells: IndexVec,
    /// `ncells x (D+1)` neighbor table of per-leaf cell positions; slots
    /// whose destination cell was not serialized carry `inf_idx`.
    pub neighbors: IndexVec,
    pub inf_idx: u64,
    pub ncells: usize,
    /// All live cells of the local triangulation, serialized or not.
    pub ncells_total: usize,
}

impl Delaunay {
    /// Serialize every cell with at least one owned vertex (insertion slot
    /// `< norig`), mapping vertex slots through `idx_local`. Repeated calls
    /// return identical tables.
    pub fn serialize_info2idx(&self, norig: usize, idx_local: &IndexVec) -> Result<SerializedCells> {
        let kind = idx_local.kind();
        let inf = kind.inf();
        if !self.is_bootstrapped() {
            if self.num_slots() == 0 {
                return Ok(SerializedCells {
                    cells: IndexVec::new(kind),
                    neighbors: IndexVec::new(kind),
                    inf_idx: inf,
                    ncells: 0,
                    ncells_total: 0,
                });
            }
            return Err(Error::Degenerate(
                "triangulation never reached a full-rank simplex".into(),
            ));
        }
        if idx_local.len() != self.num_slots() {
            return Err(Error::Protocol(format!(
                "index map covers {} slots but the triangulation has {}",
                idx_local.len(),
                self.num_slots()
            )));
        }
        let dim = self.dim();
        let stride = dim + 1;
        let mut pos = vec![usize::MAX; self.raw_cell_count()];
        let mut exported = Vec::new();
        for (c, cell) in self.alive_cells() {
            let owned = cell.verts[..=dim]
                .iter()
                .any(|&v| v != INFINITE && self.vert_slot(v) < norig);
            if owned {
                pos[c] = exported.len();
                exported.push(c);
            }
        }
        let mut cells_tab = IndexVec::with_capacity(kind, exported.len() * stride);
        let mut nbrs_tab = IndexVec::with_capacity(kind, exported.len() * stride);
        for &c in &exported {
            for s in 0..=dim {
                let v = self.cell(c).verts[s];
                let mapped = if v == INFINITE { inf } else { idx_local.get(self.vert_slot(v)) };
                cells_tab.try_push(mapped)?;
            }
        }
        for &c in &exported {
            for s in 0..=dim {
                let n = self.cell(c).nbrs[s];
                let mapped = if pos[n] == usize::MAX { inf } else { pos[n] as u64 };
                nbrs_tab.try_push(mapped)?;
            }
        }
        Ok(SerializedCells {
            cells: cells_tab,
            neighbors: nbrs_tab,
            inf_idx: inf,
            ncells: exported.len(),
            ncells_total: self.num_cells(),
        })
    }
}

/// Canonical orderings of a serialized vertex table: per-cell argsort of
/// the `stride` vertex values, and the stable argsort of cells by their
/// sorted vertex tuples. Both are what the consolidator keys on.
pub fn arg_sort_serialized(cells: &IndexVec, stride: usize) -> (Vec<u32>, Vec<u64>) {
    let ncells = cells.len() / stride;
    let mut vert_sort = Vec::with_capacity(cells.len());
    let mut tuples: Vec<[u64; 4]> = Vec::with_capacity(ncells);
    for c in 0..ncells {
        let mut order: Vec<u32> = (0..stride as u32).collect();
        order.sort_by_key(|&s| cells.get(c * stride + s as usize));
        let mut tup = [u64::MAX; 4];
        for (k, &s) in order.iter().enumerate() {
            tup[k] = cells.get(c * stride + s as usize);
        }
        vert_sort.extend_from_slice(&order);
        tuples.push(tup);
    }
    let mut cell_sort: Vec<u64> = (0..ncells as u64).collect();
    cell_sort.sort_by_key(|&c| tuples[c as usize]);
    (vert_sort, cell_sort)
}
