use roadref::{
    attached_extents, diff_extents, Extent, ExtentTable, ObjectDelta, RoadObject,
    ROAD_SYSTEM_TYPE,
};
use std::collections::BTreeMap;

fn object(id: u64, extents: Vec<Extent>) -> RoadObject {
    RoadObject {
        id,
        object_type: ROAD_SYSTEM_TYPE,
        version: 1,
        properties: BTreeMap::from([(11276, "19024".to_string())]),
        extents,
    }
}

#[test]
fn expands_extents_with_owner_identity() {
    let object = object(
        7,
        vec![Extent::new(1, 0.0, 1.0), Extent::new(2, 0.25, 0.75)],
    );
    let extents = attached_extents(Some(&object));
    assert_eq!(extents.len(), 2);
    assert!(extents
        .iter()
        .all(|extent| extent.object_id == 7 && extent.object_type == ROAD_SYSTEM_TYPE));
    assert!(attached_extents(None).is_empty());
}

#[test]
fn insert_produces_only_additions() {
    let delta = ObjectDelta::insert(object(1, vec![Extent::new(1, 0.0, 1.0)]));
    let deltas = diff_extents(&delta);
    assert_eq!(deltas.len(), 1);
    assert!(!deltas[0].removed);
    assert_eq!(deltas[0].segment_id(), 1);
}

#[test]
fn delete_produces_only_removals() {
    let delta = ObjectDelta::delete(object(
        1,
        vec![Extent::new(1, 0.0, 1.0), Extent::new(2, 0.0, 1.0)],
    ));
    let deltas = diff_extents(&delta);
    assert_eq!(deltas.len(), 2);
    assert!(deltas.iter().all(|delta| delta.removed));
}

#[test]
fn update_diffs_unchanged_extents_away() {
    let before = object(1, vec![Extent::new(1, 0.0, 1.0)]);
    let after = object(
        1,
        vec![Extent::new(1, 0.0, 1.0), Extent::new(2, 0.0, 1.0)],
    );
    let deltas = diff_extents(&ObjectDelta::update(before, after));
    // Segment 1 is untouched; only the new attachment on segment 2 shows.
    assert_eq!(deltas.len(), 1);
    assert!(!deltas[0].removed);
    assert_eq!(deltas[0].segment_id(), 2);
}

#[test]
fn unchanged_update_produces_nothing() {
    let before = object(1, vec![Extent::new(1, 0.0, 1.0)]);
    let after = before.clone();
    assert!(diff_extents(&ObjectDelta::update(before, after)).is_empty());
}

#[test]
fn property_change_reissues_extents() {
    let before = object(1, vec![Extent::new(1, 0.0, 1.0)]);
    let mut after = before.clone();
    after
        .properties
        .insert(11277, "6".to_string());
    let deltas = diff_extents(&ObjectDelta::update(before, after));
    // Classification feeds key derivation, so changed properties must
    // re-emit the extent under its new identity.
    assert_eq!(deltas.len(), 2);
    assert_eq!(deltas.iter().filter(|delta| delta.removed).count(), 1);
    assert_eq!(deltas.iter().filter(|delta| !delta.removed).count(), 1);
}

#[test]
fn table_folds_deltas_into_current_sets() {
    let mut table = ExtentTable::new();
    let insert = diff_extents(&ObjectDelta::insert(object(
        1,
        vec![Extent::new(1, 0.0, 1.0), Extent::new(2, 0.0, 0.5)],
    )));
    for delta in &insert {
        table.apply(delta);
    }
    assert_eq!(table.segment_count(), 2);
    assert_eq!(table.segment(1).map(|set| set.len()), Some(1));
    assert_eq!(table.segment(2).map(|set| set.len()), Some(1));
}

#[test]
fn distinct_objects_never_collide_on_identical_coordinates() {
    let mut table = ExtentTable::new();
    for object_id in [1, 2] {
        for delta in diff_extents(&ObjectDelta::insert(object(
            object_id,
            vec![Extent::new(9, 0.0, 1.0)],
        ))) {
            table.apply(&delta);
        }
    }
    assert_eq!(table.segment(9).map(|set| set.len()), Some(2));

    // Deleting one object leaves the other's attachment alone.
    for delta in diff_extents(&ObjectDelta::delete(object(
        1,
        vec![Extent::new(9, 0.0, 1.0)],
    ))) {
        table.apply(&delta);
    }
    let remaining = table.segment(9).expect("segment still attached");
    assert_eq!(remaining.len(), 1);
    assert!(remaining.iter().all(|extent| extent.object_id == 2));
}

#[test]
fn remove_of_nonmember_is_a_noop() {
    let mut table = ExtentTable::new();
    for delta in diff_extents(&ObjectDelta::insert(object(
        1,
        vec![Extent::new(1, 0.0, 1.0)],
    ))) {
        table.apply(&delta);
    }
    let ghost = diff_extents(&ObjectDelta::delete(object(
        42,
        vec![Extent::new(1, 0.0, 1.0)],
    )));
    for delta in &ghost {
        table.apply(delta);
    }
    // Redelivered or unmatched removals leave the fold unchanged.
    assert_eq!(table.segment(1).map(|set| set.len()), Some(1));
}

#[test]
fn emptied_segments_are_deleted_from_the_table() {
    let mut table = ExtentTable::new();
    let road_object = object(1, vec![Extent::new(1, 0.0, 1.0)]);
    for delta in diff_extents(&ObjectDelta::insert(road_object.clone())) {
        table.apply(&delta);
    }
    for delta in diff_extents(&ObjectDelta::delete(road_object)) {
        table.apply(&delta);
    }
    assert!(table.is_empty());
    assert_eq!(table.segment(1), None);
}

#[test]
fn fold_is_idempotent_under_redelivery() {
    let mut table = ExtentTable::new();
    let deltas = diff_extents(&ObjectDelta::insert(object(
        1,
        vec![Extent::new(1, 0.0, 1.0)],
    )));
    for _ in 0..3 {
        for delta in &deltas {
            table.apply(delta);
        }
    }
    assert_eq!(table.segment(1).map(|set| set.len()), Some(1));
}
