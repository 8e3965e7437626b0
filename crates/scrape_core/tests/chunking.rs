use pretty_assertions::assert_eq;
use scrape_core::{IdChunker, ObjectId, CHUNK_SIZE};

fn ids(range: std::ops::RangeInclusive<i64>) -> Vec<ObjectId> {
    range.map(ObjectId::from).collect()
}

#[test]
fn four_hundred_fifty_ids_make_three_batches() {
    let batches = IdChunker::new().chunk(&ids(1..=450));

    assert_eq!(batches.len(), 3);
    assert_eq!(batches[0].ids(), ids(1..=200).as_slice());
    assert_eq!(batches[1].ids(), ids(201..=400).as_slice());
    assert_eq!(batches[2].ids(), ids(401..=450).as_slice());
    assert_eq!(
        batches.iter().map(|b| b.index()).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
}

#[test]
fn batch_count_is_ceiling_of_universe_over_chunk_size() {
    for n in [1usize, 199, 200, 201, 399, 400, 401, 1000, 1234] {
        let universe = ids(1..=n as i64);
        let batches = IdChunker::new().chunk(&universe);

        assert_eq!(batches.len(), n.div_ceil(CHUNK_SIZE), "n={n}");
        let (last, full) = batches.split_last().unwrap();
        assert!(full.iter().all(|b| b.len() == CHUNK_SIZE), "n={n}");
        let expected_last = if n % CHUNK_SIZE == 0 { CHUNK_SIZE } else { n % CHUNK_SIZE };
        assert_eq!(last.len(), expected_last, "n={n}");
    }
}

#[test]
fn empty_input_yields_no_batches() {
    assert!(IdChunker::new().chunk(&[]).is_empty());
}

#[test]
fn where_clause_lists_ids_in_order() {
    let batches = IdChunker::with_chunk_size(3).chunk(&ids(7..=11));

    assert_eq!(batches[0].where_clause(), "OBJECTID in (7,8,9)");
    assert_eq!(batches[1].where_clause(), "OBJECTID in (10,11)");
}

#[test]
fn duplicates_and_text_ids_pass_through_unchanged() {
    let input = vec![
        ObjectId::from(5i64),
        ObjectId::from(5i64),
        ObjectId::from("abc"),
        ObjectId::from(-1i64),
    ];
    let batches = IdChunker::with_chunk_size(10).chunk(&input);

    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].ids(), input.as_slice());
    assert_eq!(batches[0].where_clause(), "OBJECTID in (5,5,abc,-1)");
}

#[test]
fn zero_chunk_size_is_clamped_to_one() {
    let chunker = IdChunker::with_chunk_size(0);
    assert_eq!(chunker.chunk_size(), 1);
    assert_eq!(chunker.chunk(&ids(1..=3)).len(), 3);
}

#[test]
fn custom_field_is_used_in_predicate() {
    let batches = IdChunker::with_chunk_size(2)
        .with_field("FID")
        .chunk(&ids(1..=2));
    assert_eq!(batches[0].where_clause(), "FID in (1,2)");
}
