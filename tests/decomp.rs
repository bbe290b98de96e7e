use tessella::testing::*;
use tessella::DomainTree;

#[test]
fn leaves_partition_the_points() -> anyhow::Result<()> {
    let pts = random_points(500, 2, 1);
    let tree = DomainTree::build(&pts, 64)?;
    assert!(tree.num_leaves() >= 8);
    assert_eq!(tree.idx.len(), 500);

    // Ranges are contiguous in id order and cover the permutation.
    let mut cursor = 0;
    for leaf in &tree.leaves {
        assert_eq!(leaf.start_idx, cursor);
        assert!(leaf.npts() > 0 && leaf.npts() <= 64);
        cursor = leaf.stop_idx;
    }
    assert_eq!(cursor, 500);

    // The permutation is a permutation.
    let mut seen = tree.idx.clone();
    seen.sort_unstable();
    assert_eq!(seen, (0..500).collect::<Vec<u64>>());

    // Every owned point sits inside its leaf's closed box.
    for leaf in &tree.leaves {
        for &g in &tree.idx[leaf.start_idx..leaf.stop_idx] {
            let p = pts.row(g as usize);
            for d in 0..2 {
                assert!(p[d] >= leaf.left_edge[d] && p[d] <= leaf.right_edge[d]);
            }
        }
    }
    Ok(())
}

#[test]
fn face_neighbors_are_symmetric() -> anyhow::Result<()> {
    let pts = random_points(300, 3, 2);
    let tree = DomainTree::build(&pts, 40)?;
    for leaf in &tree.leaves {
        for d in 0..3 {
            assert!(!leaf.periodic_left[d] && !leaf.periodic_right[d]);
            for &j in &leaf.left_neighbors[d] {
                assert!(tree.leaf(j).right_neighbors[d].contains(&leaf.id));
            }
            for &j in &leaf.right_neighbors[d] {
                assert!(tree.leaf(j).left_neighbors[d].contains(&leaf.id));
            }
        }
    }
    Ok(())
}

#[test]
fn periodic_single_leaf_neighbors_itself_on_every_axis() -> anyhow::Result<()> {
    let pts = random_points_in(30, 2, 3, [0.0; 3], [1.0, 1.0, 0.0]);
    let tree = DomainTree::build_in_domain(&pts, 64, [0.0; 3], [1.0, 1.0, 0.0], true)?;
    assert_eq!(tree.num_leaves(), 1);
    let leaf = tree.leaf(0);
    for d in 0..2 {
        assert!(leaf.periodic_left[d] && leaf.periodic_right[d]);
        assert_eq!(leaf.left_neighbors[d], vec![0]);
        assert_eq!(leaf.right_neighbors[d], vec![0]);
        assert_eq!(leaf.domain_width[d], 1.0);
    }
    assert_eq!(leaf.neighbor_ids(), vec![0]);
    Ok(())
}

#[test]
fn periodic_two_leaves_wrap_around_the_split_axis() -> anyhow::Result<()> {
    let pts = random_points_in(100, 2, 4, [0.0; 3], [1.0, 1.0, 0.0]);
    let tree = DomainTree::build_in_domain(&pts, 50, [0.0; 3], [1.0, 1.0, 0.0], true)?;
    assert_eq!(tree.num_leaves(), 2);
    let (a, b) = (tree.leaf(0), tree.leaf(1));
    // Direct adjacency at the split plane plus wrap adjacency across the
    // domain boundary on the split axis.
    assert!(a.right_neighbors[0].contains(&b.id));
    assert!(a.left_neighbors[0].contains(&b.id));
    assert!(a.periodic_left[0] && !a.periodic_right[0]);
    assert!(b.periodic_right[0] && !b.periodic_left[0]);
    // Both span the unsplit axis alone, so both are their own wrap
    // neighbor there.
    for leaf in [a, b] {
        assert!(leaf.periodic_left[1] && leaf.periodic_right[1]);
        assert!(leaf.left_neighbors[1].contains(&leaf.id));
        assert!(leaf.right_neighbors[1].contains(&leaf.id));
    }
    Ok(())
}
