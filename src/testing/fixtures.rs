//! Known point sets with hand-checked triangulation counts.

use crate::points::PointArray;

/// 2D: the unit-square corners plus four interior points. The serial
/// triangulation has 10 finite cells, 4 hull cells and 9 vertices
/// (8 finite + the infinite one); the four corner vertices have unbounded
/// Voronoi cells.
pub fn square8_points() -> PointArray {
    PointArray::from_rows(&[
        vec![-0.4941988586954018, -0.07594397977563715],
        vec![-0.06448037284989526, 0.4958248496365813],
        vec![0.4911154367094632, 0.09383830681375946],
        vec![-0.348353580869097, -0.3586778257652367],
        vec![-1.0, -1.0],
        vec![-1.0, 1.0],
        vec![1.0, -1.0],
        vec![1.0, 1.0],
    ])
    .expect("fixture is well-formed")
}

pub const SQUARE8_NCELLS_FIN: usize = 10;
pub const SQUARE8_NCELLS_INF: usize = 4;
pub const SQUARE8_NVERTS_FIN: usize = 8;

/// 3D: the origin plus the corners of the `[-1, 1]` cube. The corners are
/// cospherical, so individual diagonal choices on the cube faces are
/// insertion-order dependent, but every valid triangulation has 12 finite
/// cells, 12 hull cells, 10 vertices, 26 finite edges and 8 infinite
/// edges.
pub fn cube9_points() -> PointArray {
    PointArray::from_rows(&[
        vec![0.0, 0.0, 0.0],
        vec![-1.0, -1.0, -1.0],
        vec![-1.0, -1.0, 1.0],
        vec![-1.0, 1.0, -1.0],
        vec![-1.0, 1.0, 1.0],
        vec![1.0, -1.0, -1.0],
        vec![1.0, -1.0, 1.0],
        vec![1.0, 1.0, -1.0],
        vec![1.0, 1.0, 1.0],
    ])
    .expect("fixture is well-formed")
}

pub const CUBE9_NCELLS_FIN: usize = 12;
pub const CUBE9_NCELLS_INF: usize = 12;
pub const CUBE9_NVERTS_FIN: usize = 9;
pub const CUBE9_NEDGES_FIN: usize = 26;
pub const CUBE9_NEDGES_INF: usize = 8;
