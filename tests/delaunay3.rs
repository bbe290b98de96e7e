use tessella::delaunay::Delaunay;
use tessella::testing::*;

#[test]
fn insert_known_3d_set() -> anyhow::Result<()> {
    let pts = cube9_points();
    let mut t = Delaunay::new(3)?;
    t.insert(pts.as_flat())?;
    assert!(t.is_valid());
    assert_eq!(t.num_finite_verts(), CUBE9_NVERTS_FIN);
    assert_eq!(t.num_verts(), CUBE9_NVERTS_FIN + 1);
    assert_eq!(t.num_finite_cells(), CUBE9_NCELLS_FIN);
    assert_eq!(t.num_infinite_cells(), CUBE9_NCELLS_INF);
    assert_eq!(t.num_finite_edges(), CUBE9_NEDGES_FIN);
    assert_eq!(t.num_infinite_edges(), CUBE9_NEDGES_INF);
    Ok(())
}

#[test]
fn duplicate_insertion_changes_nothing() -> anyhow::Result<()> {
    let pts = cube9_points();
    let dup = with_duplicate_row(&pts, 0);
    let mut t = Delaunay::new(3)?;
    t.insert(dup.as_flat())?;
    assert!(t.is_valid());
    assert_eq!(t.num_finite_verts(), CUBE9_NVERTS_FIN);
    assert_eq!(t.num_finite_cells(), CUBE9_NCELLS_FIN);
    assert_eq!(t.num_infinite_cells(), CUBE9_NCELLS_INF);
    Ok(())
}

#[test]
fn center_volume_is_the_l1_ball() -> anyhow::Result<()> {
    // The dual cell of the cube center is the octahedron |x|+|y|+|z| <= 3/2,
    // volume (2r)^3 / 6 = 4.5; every corner is a hull vertex.
    let pts = cube9_points();
    let mut t = Delaunay::new(3)?;
    t.insert(pts.as_flat())?;
    let vols = t.voronoi_volumes()?;
    assert_eq!(vols.len(), 9);
    assert!((vols[0] - 4.5).abs() < 1e-12, "center volume was {}", vols[0]);
    for (i, &v) in vols.iter().enumerate().skip(1) {
        assert_eq!(v, -1.0, "corner {i} should be unbounded");
    }
    Ok(())
}

#[test]
fn random_3d_set_is_locally_delaunay() -> anyhow::Result<()> {
    let pts = random_points(200, 3, 7);
    let mut t = Delaunay::new(3)?;
    t.insert(pts.as_flat())?;
    assert!(t.is_valid());
    assert_eq!(t.num_finite_verts(), 200);
    Ok(())
}
