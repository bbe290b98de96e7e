//! Consolidation of per-leaf serialized triangulations into one global
//! cell/neighbor table.
//!
//! Pure function of its inputs. The merge is keyed entirely in global
//! index space: a cell's identity is its sorted vertex tuple (with every
//! per-leaf infinite index remapped to the single canonical one), so
//! copies of a boundary-straddling cell collapse regardless of which leaf
//! serialized them or how periodic wrapping moved their coordinates.
//!
//! Ownership and determinism:
//! - a cell is kept only by its **owner**, the leaf whose index range
//!   contains the smallest owned vertex in the cell;
//! - global cell order is `(leaf id, per-leaf cell-sort position)`;
//! - the per-leaf keying pass runs under rayon, but the merge walks leaves
//!   strictly in id order, so the output is a function of the input alone.
//!
//! Neighbor slots are remapped by looking the destination cell's key up in
//! a global hash index; slots whose destination the sending leaf did not
//! serialize (the sentinel) are resolved through the shared facet instead.
//! Anything unresolvable is a protocol violation.

use std::collections::HashMap;

use rayon::prelude::*;

use crate::delaunay::serialize::{IndexKind, IndexVec};
use crate::error::{Error, Result};
use crate::wire::SerializedLeaf;

/// Consolidated global tables: `(cells, neighbors, inf_idx)`.
pub type GlobalTables = (IndexVec, IndexVec, u64);

pub fn consolidate_leaves(
    dim: usize,
    leaves: &[SerializedLeaf],
    starts: &[u64],
    stops: &[u64],
    npts: usize,
    use_double: bool,
) -> Result<GlobalTables> {
    let stride = dim + 1;
    let use_double = use_double || npts as u64 >= u64::from(u32::MAX);
    let kind = if use_double { IndexKind::U64 } else { IndexKind::U32 };
    let inf = kind.inf();

    for (l, sl) in leaves.iter().enumerate() {
        if sl.leaf_id != l as u64 {
            return Err(Error::Protocol(format!(
                "leaf {} serialized under id {}",
                l, sl.leaf_id
            )));
        }
        let ncells = sl.ncells();
        if sl.neighbors.len() != sl.cells.len()
            || sl.vert_sort.len() != ncells * stride
            || sl.cell_sort.len() != ncells
        {
            return Err(Error::Protocol(format!("inconsistent tables for leaf {l}")));
        }
    }

    // Sorted vertex keys for every cell of every leaf, in canonical
    // (global-infinite) index space.
    let leaf_keys: Vec<Vec<[u64; 4]>> = leaves
        .par_iter()
        .map(|sl| -> Result<Vec<[u64; 4]>> {
            let ncells = sl.ncells();
            let mut keys = Vec::with_capacity(ncells);
            for c in 0..ncells {
                let mut key = [u64::MAX; 4];
                for (k, slot) in key[..stride].iter_mut().enumerate() {
                    let perm = sl.vert_sort[c * stride + k] as usize;
                    let raw = sl.cells.get(c * stride + perm);
                    *slot = if raw == sl.inf_idx { inf } else { raw };
                }
                if key[..stride].windows(2).any(|w| w[0] > w[1]) {
                    return Err(Error::Protocol(format!(
                        "vertex sort of leaf {} does not sort cell {}",
                        sl.leaf_id, c
                    )));
                }
                keys.push(key);
            }
            Ok(keys)
        })
        .collect::<Result<_>>()?;

    let owner_of = |v: u64| -> Result<usize> {
        let pos = starts.partition_point(|&s| s <= v);
        if pos == 0 || v >= stops[pos - 1] {
            return Err(Error::Protocol(format!("vertex {v} outside every leaf range")));
        }
        Ok(pos - 1)
    };

    // First pass: decide ownership, assign global ids in deterministic
    // order, and index every kept cell by its key.
    let mut kept: Vec<Vec<usize>> = Vec::with_capacity(leaves.len());
    let mut key_to_gid: HashMap<[u64; 4], u64> = HashMap::new();
    let mut ncells_global = 0u64;
    for (l, sl) in leaves.iter().enumerate() {
        let mut local = Vec::new();
        for &c in &sl.cell_sort {
            let key = leaf_keys[l][c as usize];
            if key[0] == inf {
                return Err(Error::Protocol(format!(
                    "cell {c} of leaf {l} has no finite vertex"
                )));
            }
            if owner_of(key[0])? != l {
                continue;
            }
            // Under periodic wrapping a leaf can hold two incarnations of
            // one cell (original and self-image); they carry the same
            // global ids and collapse here.
            if key_to_gid.contains_key(&key) {
                continue;
            }
            key_to_gid.insert(key, ncells_global);
            local.push(c as usize);
            ncells_global += 1;
        }
        kept.push(local);
    }

    let mut bases = Vec::with_capacity(kept.len());
    let mut acc = 0u64;
    for local in &kept {
        bases.push(acc);
        acc += local.len() as u64;
    }

    // Facet index over the kept cells, for neighbor slots whose
    // destination the sending leaf never serialized.
    let mut facets: HashMap<[u64; 4], Vec<u64>> = HashMap::new();
    for (l, local) in kept.iter().enumerate() {
        for (offset, &c) in local.iter().enumerate() {
            let gid = bases[l] + offset as u64;
            let key = leaf_keys[l][c];
            for skip in 0..stride {
                let mut facet = [u64::MAX; 4];
                let mut k = 0;
                for (s, &v) in key[..stride].iter().enumerate() {
                    if s != skip {
                        facet[k] = v;
                        k += 1;
                    }
                }
                facets.entry(facet).or_default().push(gid);
            }
        }
    }

    // Second pass: emit the global tables.
    let mut cells_tab = IndexVec::with_capacity(kind, ncells_global as usize * stride);
    let mut nbrs_tab = IndexVec::with_capacity(kind, ncells_global as usize * stride);
    for (l, local) in kept.iter().enumerate() {
        let sl = &leaves[l];
        let ncells_local = sl.ncells();
        for (offset, &c) in local.iter().enumerate() {
            let gid = bases[l] + offset as u64;
            for s in 0..stride {
                let raw = sl.cells.get(c * stride + s);
                cells_tab.try_push(if raw == sl.inf_idx { inf } else { raw })?;
            }
            let key = leaf_keys[l][c];
            for s in 0..stride {
                let j = sl.neighbors.get(c * stride + s);
                let target = if j == sl.inf_idx {
                    // Neighbor s sits opposite stored vertex s; its facet is
                    // this cell's key with one occurrence of that vertex
                    // removed.
                    let raw = sl.cells.get(c * stride + s);
                    let opposite = if raw == sl.inf_idx { inf } else { raw };
                    resolve_by_facet(&facets, &key, opposite, stride, gid).ok_or_else(|| {
                        Error::Protocol(format!(
                            "unresolvable neighbor across facet {s} of cell {c} in leaf {l}"
                        ))
                    })?
                } else {
                    if j as usize >= ncells_local {
                        return Err(Error::Protocol(format!(
                            "neighbor index {j} out of range for leaf {l}"
                        )));
                    }
                    // The destination key can be absent when a cospherical
                    // tie was broken differently on the ghost side of
                    // another leaf; the shared facet still identifies the
                    // kept neighbor.
                    match key_to_gid.get(&leaf_keys[l][j as usize]) {
                        Some(&gid2) => gid2,
                        None => {
                            let raw = sl.cells.get(c * stride + s);
                            let opposite = if raw == sl.inf_idx { inf } else { raw };
                            resolve_by_facet(&facets, &key, opposite, stride, gid).ok_or_else(
                                || {
                                    Error::Protocol(format!(
                                        "neighbor of cell {c} in leaf {l} was kept by no leaf"
                                    ))
                                },
                            )?
                        }
                    }
                };
                nbrs_tab.try_push(target)?;
            }
        }
    }

    Ok((cells_tab, nbrs_tab, inf))
}

/// The other cell sharing the facet of `key` obtained by removing one
/// occurrence of `opposite`. `None` when the facet is unknown or has no
/// unambiguous partner.
fn resolve_by_facet(
    facets: &HashMap<[u64; 4], Vec<u64>>,
    key: &[u64; 4],
    opposite: u64,
    stride: usize,
    this_gid: u64,
) -> Option<u64> {
    let skip = key[..stride].iter().position(|&v| v == opposite)?;
    let mut facet = [u64::MAX; 4];
    let mut k = 0;
    for (s, &v) in key[..stride].iter().enumerate() {
        if s != skip {
            facet[k] = v;
            k += 1;
        }
    }
    let incident = facets.get(&facet)?;
    if incident.len() != 2 {
        return None;
    }
    match (incident[0] == this_gid, incident[1] == this_gid) {
        (true, false) => Some(incident[1]),
        (false, true) => Some(incident[0]),
        _ => None,
    }
}
