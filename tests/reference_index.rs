use roadref::{parse_flexible, Category, Phase, ReferenceDelta, ReferenceIndex, SectionKey};
use std::collections::BTreeSet;

fn key(number: u16, section: u16, subsection: u16) -> SectionKey {
    SectionKey::new(
        Category::European,
        Phase::Operational,
        number,
        section,
        subsection,
    )
}

fn add(index: &mut ReferenceIndex, key: SectionKey, segment_id: u64) {
    index.apply(&ReferenceDelta {
        removed: false,
        key,
        segment_id,
    });
}

fn remove(index: &mut ReferenceIndex, key: SectionKey, segment_id: u64) {
    index.apply(&ReferenceDelta {
        removed: true,
        key,
        segment_id,
    });
}

#[test]
fn accumulates_segments_per_key() {
    let mut index = ReferenceIndex::new();
    add(&mut index, key(6, 1, 1), 1);
    add(&mut index, key(6, 1, 1), 2);
    add(&mut index, key(6, 1, 2), 3);

    assert_eq!(
        index.get(&key(6, 1, 1)),
        Some(&BTreeSet::from([1u64, 2u64]))
    );
    assert_eq!(index.key_count(), 2);
}

#[test]
fn duplicate_adds_are_idempotent() {
    let mut index = ReferenceIndex::new();
    add(&mut index, key(6, 1, 1), 1);
    add(&mut index, key(6, 1, 1), 1);
    assert_eq!(index.get(&key(6, 1, 1)).map(BTreeSet::len), Some(1));
}

#[test]
fn removal_of_absent_member_is_a_noop() {
    let mut index = ReferenceIndex::new();
    add(&mut index, key(6, 1, 1), 1);
    remove(&mut index, key(6, 1, 1), 99);
    remove(&mut index, key(7, 1, 1), 1);
    assert_eq!(index.get(&key(6, 1, 1)).map(BTreeSet::len), Some(1));
}

#[test]
fn emptied_keys_disappear_from_the_store() {
    let mut index = ReferenceIndex::new();
    add(&mut index, key(6, 1, 1), 1);
    remove(&mut index, key(6, 1, 1), 1);
    assert_eq!(index.get(&key(6, 1, 1)), None);
    assert!(index.is_empty());
}

#[test]
fn range_scan_returns_keys_in_key_order() {
    let mut index = ReferenceIndex::new();
    add(&mut index, key(6, 2, 1), 20);
    add(&mut index, key(6, 1, 2), 12);
    add(&mut index, key(6, 1, 1), 11);
    add(&mut index, key(7, 1, 1), 99);

    let matched = index
        .query(&parse_flexible("EV6").expect("pattern parses"))
        .expect("query succeeds");
    assert_eq!(
        matched.keys,
        vec![key(6, 1, 1), key(6, 1, 2), key(6, 2, 1)]
    );
    assert_eq!(matched.segment_ids, BTreeSet::from([11u64, 12u64, 20u64]));
}

#[test]
fn range_scan_respects_the_half_open_bound() {
    let mut index = ReferenceIndex::new();
    add(&mut index, key(6, 3, 1), 1);
    add(&mut index, key(6, 4, 0), 2);

    let matched = index
        .query(&parse_flexible("EV6 S3").expect("pattern parses"))
        .expect("query succeeds");
    assert_eq!(matched.keys, vec![key(6, 3, 1)]);
    assert_eq!(matched.segment_ids, BTreeSet::from([1u64]));
}

#[test]
fn exact_pattern_matches_a_single_key() {
    let mut index = ReferenceIndex::new();
    add(&mut index, key(6, 1, 1), 1);
    add(&mut index, key(6, 1, 2), 2);

    let matched = index
        .query(&parse_flexible("EV6 S1D1").expect("pattern parses"))
        .expect("query succeeds");
    assert_eq!(matched.keys, vec![key(6, 1, 1)]);
}

#[test]
fn query_over_empty_space_matches_nothing() {
    let index = ReferenceIndex::new();
    let matched = index
        .query(&parse_flexible("EV6").expect("pattern parses"))
        .expect("query succeeds");
    assert!(matched.is_empty());
}

#[test]
fn union_spans_keys_sharing_segments() {
    let mut index = ReferenceIndex::new();
    add(&mut index, key(6, 1, 1), 1);
    add(&mut index, key(6, 1, 2), 1);
    add(&mut index, key(6, 2, 1), 2);

    let matched = index
        .query(&parse_flexible("EV6").expect("pattern parses"))
        .expect("query succeeds");
    assert_eq!(matched.keys.len(), 3);
    // Segment 1 backs two keys but appears once in the union.
    assert_eq!(matched.segment_ids, BTreeSet::from([1u64, 2u64]));
}
