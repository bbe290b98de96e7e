use tessella::delaunay::IndexVec;
use tessella::wire::{SerializedLeaf, TriangulationDecoder, VolumesDecoder, encode_volumes};

fn sample_leaf() -> SerializedLeaf {
    // Two triangles sharing an edge, plus hull sentinels.
    let inf = u64::from(u32::MAX);
    SerializedLeaf {
        leaf_id: 3,
        dim: 2,
        cells: IndexVec::U32(vec![0, 1, 2, 1, 2, 3]),
        neighbors: IndexVec::U32(vec![1, u32::MAX, u32::MAX, u32::MAX, u32::MAX, 0]),
        inf_idx: inf,
        vert_sort: vec![0, 1, 2, 0, 1, 2],
        cell_sort: vec![0, 1],
        ncells_total: 6,
    }
}

#[test]
fn triangulation_frames_round_trip() -> anyhow::Result<()> {
    let leaf = sample_leaf();
    let frames = leaf.encode();
    assert_eq!(frames.len(), 5);
    assert_eq!(frames[0].len(), 40);

    let mut decoder = TriangulationDecoder::new(2, 3);
    let mut decoded = None;
    for frame in &frames {
        if let Some(out) = decoder.push(frame)? {
            decoded = Some(out);
        }
    }
    let decoded = decoded.expect("decoder completed");
    assert_eq!(decoded.leaf_id, 3);
    assert_eq!(decoded.cells, leaf.cells);
    assert_eq!(decoded.neighbors, leaf.neighbors);
    assert_eq!(decoded.inf_idx, leaf.inf_idx);
    assert_eq!(decoded.vert_sort, leaf.vert_sort);
    assert_eq!(decoded.cell_sort, leaf.cell_sort);
    assert_eq!(decoded.ncells_total, 6);
    Ok(())
}

#[test]
fn header_for_the_wrong_leaf_is_a_protocol_violation() {
    let frames = sample_leaf().encode();
    let mut decoder = TriangulationDecoder::new(2, 7);
    let err = decoder.push(&frames[0]).unwrap_err();
    assert!(err.to_string().contains("protocol violation"), "got: {err}");
}

#[test]
fn bad_dtype_and_short_frames_are_rejected() {
    let leaf = sample_leaf();
    let mut frames = leaf.encode();
    // Corrupt the dtype code in the header.
    frames[0][16] = 9;
    let mut decoder = TriangulationDecoder::new(2, 3);
    decoder.push(&frames[0]).unwrap();
    assert!(decoder.push(&frames[1]).is_err());

    // Truncated cells frame.
    let frames = leaf.encode();
    let mut decoder = TriangulationDecoder::new(2, 3);
    decoder.push(&frames[0]).unwrap();
    assert!(decoder.push(&frames[1][..frames[1].len() - 4]).is_err());
}

#[test]
fn signed_dtypes_decode_when_non_negative() -> anyhow::Result<()> {
    // A hand-built i32 stream: one 2D cell, no sentinels anywhere.
    let mut header = Vec::new();
    for x in [4u64, 1, 2, u64::from(u32::MAX), 1] {
        header.extend_from_slice(&x.to_le_bytes());
    }
    let table: Vec<u8> = [0i32, 1, 2].iter().flat_map(|x| x.to_le_bytes()).collect();
    let vert_sort: Vec<u8> = [0u32, 1, 2].iter().flat_map(|x| x.to_le_bytes()).collect();
    let cell_sort: Vec<u8> = 0u64.to_le_bytes().to_vec();

    let mut decoder = TriangulationDecoder::new(2, 4);
    decoder.push(&header)?;
    decoder.push(&table)?;
    decoder.push(&table)?;
    decoder.push(&vert_sort)?;
    let decoded = decoder.push(&cell_sort)?.expect("decoder completed");
    assert_eq!(decoded.cells, IndexVec::U32(vec![0, 1, 2]));

    // A negative index under a signed dtype is a protocol violation.
    let bad: Vec<u8> = [0i32, -1, 2].iter().flat_map(|x| x.to_le_bytes()).collect();
    let mut decoder = TriangulationDecoder::new(2, 4);
    decoder.push(&header)?;
    assert!(decoder.push(&bad).is_err());
    Ok(())
}

#[test]
fn volume_frames_round_trip() -> anyhow::Result<()> {
    let vols = vec![0.25, 1.5, -1.0];
    let frames = encode_volumes(5, &vols);
    assert_eq!(frames.len(), 2);
    let mut decoder = VolumesDecoder::new(5, 3);
    assert!(decoder.push(&frames[0])?.is_none());
    assert_eq!(decoder.push(&frames[1])?, Some(vols));
    Ok(())
}
