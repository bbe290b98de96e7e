//! Message types and byte formats of the two channel fabrics.
//!
//! **Mailbox messages** (process to process, during the exchange) are
//! in-memory values: either an explicit [`Message::Empty`] marker -- sent
//! so every receiver pops a deterministic number of messages per round --
//! or a points payload. Payloads carry global indices only; the receiver
//! reads coordinates from the shared point array.
//!
//! **Output channels** (worker to master, after convergence) are byte
//! oriented and length framed: each channel message is one frame that
//! knows its own length, and frames on one channel are strictly ordered.
//!
//! Triangulation result, per leaf: a fixed header of five little-endian
//! u64s `(leaf_id, ncells, dtype_code, inf_idx, ncells_total)` with
//! `dtype_code ∈ {0: u32, 1: u64, 2: i32, 3: i64}`, then four raw frames:
//! the cells table `(ncells x (D+1))`, the neighbors table (same shape),
//! the per-cell vertex-sort permutation (u32), and the cell-sort
//! permutation (u64). The encoder only emits codes 0 and 1; the decoder
//! accepts all four and rejects negative signed values.
//!
//! Volumes result, per leaf: one u64 `leaf_id` then `norig x f64`.

use crate::delaunay::IndexVec;
use crate::error::{Error, Result};

/// One mailbox message of the exchange phase.
#[derive(Debug, Clone)]
pub enum Message {
    /// No-op padding; keeps the per-round receive count aligned.
    Empty,
    Points {
        /// Destination leaf id.
        target: usize,
        /// Sending leaf id.
        source: usize,
        /// Global (permuted) indices of the points being sent.
        indices: Vec<u64>,
        /// Neighbor introductions riding along with the payload.
        nbr_ids: Vec<usize>,
        nbr_le: Vec<[f64; 3]>,
        nbr_re: Vec<[f64; 3]>,
    },
}

/// The serialized triangulation of one leaf, as produced once at the end
/// of the exchange phase.
#[derive(Debug, Clone)]
pub struct SerializedLeaf {
    pub leaf_id: u64,
    pub dim: usize,
    pub cells: IndexVec,
    pub neighbors: IndexVec,
    pub inf_idx: u64,
    pub vert_sort: Vec<u32>,
    pub cell_sort: Vec<u64>,
    pub ncells_total: u64,
}

impl SerializedLeaf {
    pub fn ncells(&self) -> usize {
        self.cells.len() / (self.dim + 1)
    }

    /// Encode as the ordered frame sequence of the output channel.
    pub fn encode(&self) -> Vec<Vec<u8>> {
        let header = pack_u64s(&[
            self.leaf_id,
            self.ncells() as u64,
            self.cells.kind().dtype_code(),
            self.inf_idx,
            self.ncells_total,
        ]);
        vec![
            header,
            pack_index_vec(&self.cells),
            pack_index_vec(&self.neighbors),
            pack_u32s(&self.vert_sort),
            pack_u64s(&self.cell_sort),
        ]
    }
}

/// Encode a leaf's volume result as its frame sequence.
pub fn encode_volumes(leaf_id: u64, vols: &[f64]) -> Vec<Vec<u8>> {
    let mut data = Vec::with_capacity(vols.len() * 8);
    for v in vols {
        data.extend_from_slice(&v.to_le_bytes());
    }
    vec![pack_u64s(&[leaf_id]), data]
}

fn pack_u64s(xs: &[u64]) -> Vec<u8> {
    let mut out = Vec::with_capacity(xs.len() * 8);
    for x in xs {
        out.extend_from_slice(&x.to_le_bytes());
    }
    out
}

fn pack_u32s(xs: &[u32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(xs.len() * 4);
    for x in xs {
        out.extend_from_slice(&x.to_le_bytes());
    }
    out
}

fn pack_index_vec(v: &IndexVec) -> Vec<u8> {
    match v {
        IndexVec::U32(xs) => pack_u32s(xs),
        IndexVec::U64(xs) => pack_u64s(xs),
    }
}

fn unpack_u64s(frame: &[u8], expect: usize, what: &str) -> Result<Vec<u64>> {
    if frame.len() != expect * 8 {
        return Err(Error::Protocol(format!(
            "{what} frame is {} bytes, expected {}",
            frame.len(),
            expect * 8
        )));
    }
    Ok(frame
        .chunks_exact(8)
        .map(|c| u64::from_le_bytes(c.try_into().unwrap()))
        .collect())
}

fn unpack_u32s(frame: &[u8], expect: usize, what: &str) -> Result<Vec<u32>> {
    if frame.len() != expect * 4 {
        return Err(Error::Protocol(format!(
            "{what} frame is {} bytes, expected {}",
            frame.len(),
            expect * 4
        )));
    }
    Ok(frame
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes(c.try_into().unwrap()))
        .collect())
}

/// Decode an index table frame under a wire dtype code.
fn unpack_index_table(frame: &[u8], code: u64, expect: usize, what: &str) -> Result<IndexVec> {
    match code {
        0 => Ok(IndexVec::U32(unpack_u32s(frame, expect, what)?)),
        1 => Ok(IndexVec::U64(unpack_u64s(frame, expect, what)?)),
        2 => {
            let raw = unpack_u32s(frame, expect, what)?;
            let mut out = Vec::with_capacity(raw.len());
            for x in raw {
                let signed = x as i32;
                if signed < 0 {
                    return Err(Error::Protocol(format!("negative index in {what} frame")));
                }
                out.push(signed as u32);
            }
            Ok(IndexVec::U32(out))
        }
        3 => {
            let raw = unpack_u64s(frame, expect, what)?;
            let mut out = Vec::with_capacity(raw.len());
            for x in raw {
                let signed = x as i64;
                if signed < 0 {
                    return Err(Error::Protocol(format!("negative index in {what} frame")));
                }
                out.push(signed as u64);
            }
            Ok(IndexVec::U64(out))
        }
        other => Err(Error::Protocol(format!("unknown dtype code {other}"))),
    }
}

enum TriState {
    Header,
    Cells,
    Neighbors,
    VertSort,
    CellSort,
    Done,
}

/// Streaming decoder for one leaf's triangulation frames.
pub struct TriangulationDecoder {
    dim: usize,
    expected_leaf: u64,
    state: TriState,
    ncells: usize,
    dtype: u64,
    partial: Option<SerializedLeaf>,
}

impl TriangulationDecoder {
    pub fn new(dim: usize, expected_leaf: u64) -> Self {
        Self {
            dim,
            expected_leaf,
            state: TriState::Header,
            ncells: 0,
            dtype: 0,
            partial: None,
        }
    }

    /// Feed the next frame; returns the finished leaf after the last one.
    pub fn push(&mut self, frame: &[u8]) -> Result<Option<SerializedLeaf>> {
        let stride = self.dim + 1;
        match self.state {
            TriState::Header => {
                let h = unpack_u64s(frame, 5, "header")?;
                if h[0] != self.expected_leaf {
                    return Err(Error::Protocol(format!(
                        "header names leaf {} on the channel of leaf {}",
                        h[0], self.expected_leaf
                    )));
                }
                self.ncells = h[1] as usize;
                self.dtype = h[2];
                self.partial = Some(SerializedLeaf {
                    leaf_id: h[0],
                    dim: self.dim,
                    cells: IndexVec::U32(Vec::new()),
                    neighbors: IndexVec::U32(Vec::new()),
                    inf_idx: h[3],
                    vert_sort: Vec::new(),
                    cell_sort: Vec::new(),
                    ncells_total: h[4],
                });
                self.state = TriState::Cells;
                Ok(None)
            }
            TriState::Cells => {
                let table = unpack_index_table(frame, self.dtype, self.ncells * stride, "cells")?;
                self.partial.as_mut().unwrap().cells = table;
                self.state = TriState::Neighbors;
                Ok(None)
            }
            TriState::Neighbors => {
                let table =
                    unpack_index_table(frame, self.dtype, self.ncells * stride, "neighbors")?;
                self.partial.as_mut().unwrap().neighbors = table;
                self.state = TriState::VertSort;
                Ok(None)
            }
            TriState::VertSort => {
                self.partial.as_mut().unwrap().vert_sort =
                    unpack_u32s(frame, self.ncells * stride, "vertex sort")?;
                self.state = TriState::CellSort;
                Ok(None)
            }
            TriState::CellSort => {
                self.partial.as_mut().unwrap().cell_sort =
                    unpack_u64s(frame, self.ncells, "cell sort")?;
                self.state = TriState::Done;
                Ok(self.partial.take())
            }
            TriState::Done => Err(Error::Protocol(format!(
                "unexpected extra frame on the channel of leaf {}",
                self.expected_leaf
            ))),
        }
    }
}

/// Streaming decoder for one leaf's volume frames.
pub struct VolumesDecoder {
    expected_leaf: u64,
    norig: usize,
    seen_header: bool,
    done: bool,
}

impl VolumesDecoder {
    pub fn new(expected_leaf: u64, norig: usize) -> Self {
        Self { expected_leaf, norig, seen_header: false, done: false }
    }

    pub fn push(&mut self, frame: &[u8]) -> Result<Option<Vec<f64>>> {
        if self.done {
            return Err(Error::Protocol(format!(
                "unexpected extra frame on the channel of leaf {}",
                self.expected_leaf
            )));
        }
        if !self.seen_header {
            let h = unpack_u64s(frame, 1, "volume header")?;
            if h[0] != self.expected_leaf {
                return Err(Error::Protocol(format!(
                    "volume header names leaf {} on the channel of leaf {}",
                    h[0], self.expected_leaf
                )));
            }
            self.seen_header = true;
            return Ok(None);
        }
        if frame.len() != self.norig * 8 {
            return Err(Error::Protocol(format!(
                "volume frame is {} bytes, expected {}",
                frame.len(),
                self.norig * 8
            )));
        }
        self.done = true;
        Ok(Some(
            frame
                .chunks_exact(8)
                .map(|c| f64::from_le_bytes(c.try_into().unwrap()))
                .collect(),
        ))
    }
}
