//! Immutable `(N, D)` coordinate arrays.
//!
//! A [`PointArray`] is the shared read-only input buffer of the engine: the
//! master publishes it once, before any worker starts, and every partition
//! worker reads coordinates out of it by global index. Rows are stored
//! contiguously (`row-major`, stride `D`), `D ∈ {2, 3}`.

use crate::error::{Error, Result};

/// An immutable row-major array of `N` points in `D` dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct PointArray {
    data: Vec<f64>,
    dim: usize,
}

impl PointArray {
    /// Build from a flat coordinate buffer of length `N * dim`.
    pub fn from_flat(data: Vec<f64>, dim: usize) -> Result<Self> {
        if !(2..=3).contains(&dim) {
            return Err(Error::Config(format!("dimension must be 2 or 3, got {dim}")));
        }
        if data.len() % dim != 0 {
            return Err(Error::Config(format!(
                "flat buffer of length {} is not a multiple of dim {}",
                data.len(),
                dim
            )));
        }
        Ok(Self { data, dim })
    }

    /// Build from explicit rows. All rows must have the same length.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let dim = rows.first().map(Vec::len).unwrap_or(2);
        let mut data = Vec::with_capacity(rows.len() * dim);
        for r in rows {
            if r.len() != dim {
                return Err(Error::Config("ragged point rows".into()));
            }
            data.extend_from_slice(r);
        }
        Self::from_flat(data, dim)
    }

    pub fn len(&self) -> usize {
        self.data.len() / self.dim
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.dim..(i + 1) * self.dim]
    }

    pub fn as_flat(&self) -> &[f64] {
        &self.data
    }

    /// Component-wise min/max over all rows.
    pub fn bounds(&self) -> ([f64; 3], [f64; 3]) {
        let mut le = [f64::INFINITY; 3];
        let mut re = [f64::NEG_INFINITY; 3];
        for i in 0..self.len() {
            let p = self.row(i);
            for (d, &c) in p.iter().enumerate() {
                le[d] = le[d].min(c);
                re[d] = re[d].max(c);
            }
        }
        (le, re)
    }
}
