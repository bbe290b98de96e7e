use tessella::delaunay::{Delaunay, IndexKind, IndexVec};
use tessella::testing::*;
use tessella::Triangulation;

#[test]
fn insert_known_2d_set() -> anyhow::Result<()> {
    let pts = square8_points();
    let mut t = Delaunay::new(2)?;
    t.insert(pts.as_flat())?;
    assert!(t.is_valid());
    assert_eq!(t.num_finite_verts(), SQUARE8_NVERTS_FIN);
    assert_eq!(t.num_verts(), SQUARE8_NVERTS_FIN + 1);
    assert_eq!(t.num_finite_cells(), SQUARE8_NCELLS_FIN);
    assert_eq!(t.num_infinite_cells(), SQUARE8_NCELLS_INF);
    assert_eq!(t.num_cells(), SQUARE8_NCELLS_FIN + SQUARE8_NCELLS_INF);
    Ok(())
}

#[test]
fn duplicate_insertion_changes_nothing() -> anyhow::Result<()> {
    let pts = square8_points();
    let dup = with_duplicate_row(&pts, 0);
    let mut t = Delaunay::new(2)?;
    t.insert(dup.as_flat())?;
    assert!(t.is_valid());
    assert_eq!(t.num_finite_verts(), SQUARE8_NVERTS_FIN);
    assert_eq!(t.num_finite_cells(), SQUARE8_NCELLS_FIN);
    assert_eq!(t.num_infinite_cells(), SQUARE8_NCELLS_INF);

    // The triangulation over the duplicated input is the same structure.
    let once = Triangulation::build_serial(&pts)?;
    let twice = Triangulation::build_serial(&dup)?;
    assert_triangulations_equivalent(&twice, &once);
    Ok(())
}

#[test]
fn hull_vertices_have_unbounded_cells() -> anyhow::Result<()> {
    let pts = square8_points();
    let mut t = Delaunay::new(2)?;
    t.insert(pts.as_flat())?;
    let vols = t.voronoi_volumes()?;
    assert_eq!(vols.len(), 8);
    for (i, &v) in vols.iter().enumerate() {
        if i < 4 {
            assert!(v > 0.0, "interior point {i} should have a bounded cell, got {v}");
        } else {
            assert_eq!(v, -1.0, "corner {i} should be unbounded");
        }
    }
    Ok(())
}

#[test]
fn serialization_is_stable_and_complete() -> anyhow::Result<()> {
    let pts = square8_points();
    let mut t = Delaunay::new(2)?;
    t.insert(pts.as_flat())?;
    let idx_local = IndexVec::from_range(IndexKind::U32, 0, 8)?;
    let a = t.serialize_info2idx(8, &idx_local)?;
    let b = t.serialize_info2idx(8, &idx_local)?;
    assert_eq!(a.cells, b.cells);
    assert_eq!(a.neighbors, b.neighbors);
    assert_eq!(a.ncells, SQUARE8_NCELLS_FIN + SQUARE8_NCELLS_INF);
    assert_eq!(a.ncells_total, a.ncells);
    assert_eq!(a.inf_idx, u64::from(u32::MAX));
    Ok(())
}

#[test]
fn everything_is_a_candidate_for_a_covering_box() -> anyhow::Result<()> {
    let pts = square8_points();
    let mut t = Delaunay::new(2)?;
    t.insert(pts.as_flat())?;
    let candidates = t.outgoing_points(&[([-2.0, -2.0, 0.0], [2.0, 2.0, 0.0])]);
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0], (0..8).collect::<Vec<_>>());
    Ok(())
}

#[test]
fn collinear_input_is_rejected_lazily() -> anyhow::Result<()> {
    let mut t = Delaunay::new(2)?;
    t.insert(&[0.0, 0.0, 1.0, 1.0, 2.0, 2.0, 3.0, 3.0])?;
    assert!(t.voronoi_volumes().is_err());
    let idx_local = IndexVec::from_range(IndexKind::U32, 0, 4)?;
    assert!(t.serialize_info2idx(4, &idx_local).is_err());
    // A point off the line rescues the whole set.
    t.insert(&[1.0, 0.0])?;
    assert!(t.is_valid());
    assert_eq!(t.num_finite_verts(), 5);
    Ok(())
}
