//! Assertion functions for testing triangulation outputs.
//!
//! These compare a parallel run's results against a serial reference and
//! panic with enough context to see *where* the structures diverge, not
//! just that they do.

use crate::triangulation::Triangulation;

/// Assert that two triangulations are structurally equivalent: the same
/// canonical finite and hull cells after normalizing the infinite vertex,
/// and the same neighbor relation between them.
///
/// # Panics
///
/// Panics with the first differing canonical cell (or the first cell whose
/// neighbor set differs) and both tables' counts.
pub fn assert_triangulations_equivalent(actual: &Triangulation, expected: &Triangulation) {
    assert_eq!(actual.dim(), expected.dim(), "dimension mismatch");
    let a = actual.canonical_cells();
    let b = expected.canonical_cells();
    if a != b {
        let mismatch = a
            .iter()
            .zip(b.iter())
            .position(|(x, y)| x != y)
            .unwrap_or_else(|| a.len().min(b.len()));
        panic!(
            "triangulations differ: {} vs {} cells ({} vs {} finite), first divergence at \
             canonical position {} ({:?} vs {:?})",
            actual.num_cells(),
            expected.num_cells(),
            actual.num_finite_cells(),
            expected.num_finite_cells(),
            mismatch,
            a.get(mismatch),
            b.get(mismatch),
        );
    }
    let a = actual.canonical_neighbors();
    let b = expected.canonical_neighbors();
    if let Some(mismatch) = a.iter().zip(b.iter()).position(|(x, y)| x != y) {
        panic!(
            "cells agree but the neighbor relation differs at canonical position {}: cell {:?} \
             has neighbors {:?} vs {:?}",
            mismatch, a[mismatch].0, a[mismatch].1, b[mismatch].1,
        );
    }
    assert_eq!(a.len(), b.len(), "neighbor relations differ in length");
}

/// Assert that two volume arrays agree within an absolute tolerance.
/// Unbounded sentinels (`-1.0`) must match exactly on both sides.
///
/// # Panics
///
/// Panics with the first offending index.
pub fn assert_volumes_close(actual: &[f64], expected: &[f64], tol: f64) {
    assert_eq!(actual.len(), expected.len(), "volume arrays differ in length");
    for (i, (&a, &e)) in actual.iter().zip(expected.iter()).enumerate() {
        let ok = if a < 0.0 || e < 0.0 { a == e } else { (a - e).abs() <= tol };
        assert!(ok, "volume {i} differs: {a} vs {e} (tolerance {tol})");
    }
}

/// Assert that every volume is finite (no unbounded sentinel).
///
/// # Panics
///
/// Panics with the first unbounded index.
pub fn assert_all_bounded(vols: &[f64]) {
    for (i, &v) in vols.iter().enumerate() {
        assert!(v >= 0.0, "point {i} has an unbounded Voronoi cell");
    }
}
