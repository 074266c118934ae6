use roadref::{
    Category, Extent, ObjectDelta, ObjectRole, Phase, Pipeline, RoadObject, SectionKey,
    PROP_CATEGORY, PROP_NUMBER, PROP_PHASE, PROP_SECTION, PROP_SUBSECTION, ROAD_SYSTEM_TYPE,
    SECTION_TYPE,
};
use std::collections::{BTreeMap, BTreeSet};

fn road_system(id: u64, number: u16, extents: Vec<Extent>) -> RoadObject {
    RoadObject {
        id,
        object_type: ROAD_SYSTEM_TYPE,
        version: 1,
        properties: BTreeMap::from([
            (PROP_CATEGORY, Category::European.value_code().to_string()),
            (PROP_PHASE, Phase::Operational.value_code().to_string()),
            (PROP_NUMBER, number.to_string()),
        ]),
        extents,
    }
}

fn section(id: u64, section: u16, subsection: u16, extents: Vec<Extent>) -> RoadObject {
    RoadObject {
        id,
        object_type: SECTION_TYPE,
        version: 1,
        properties: BTreeMap::from([
            (PROP_SECTION, section.to_string()),
            (PROP_SUBSECTION, subsection.to_string()),
        ]),
        extents,
    }
}

fn ev_key(number: u16, section: u16, subsection: u16) -> SectionKey {
    SectionKey::new(
        Category::European,
        Phase::Operational,
        number,
        section,
        subsection,
    )
}

#[test]
fn overlapping_pair_creates_a_reference() {
    let mut pipeline = Pipeline::new();
    pipeline.process(
        ObjectRole::RoadSystem,
        &ObjectDelta::insert(road_system(1, 6, vec![Extent::new(1, 0.0, 1.0)])),
    );
    pipeline.process(
        ObjectRole::Section,
        &ObjectDelta::insert(section(2, 1, 1, vec![Extent::new(1, 0.0, 1.0)])),
    );

    assert_eq!(
        pipeline.index().get(&ev_key(6, 1, 1)),
        Some(&BTreeSet::from([1u64]))
    );
}

#[test]
fn non_overlapping_pair_creates_nothing() {
    let mut pipeline = Pipeline::new();
    pipeline.process(
        ObjectRole::RoadSystem,
        &ObjectDelta::insert(road_system(1, 6, vec![Extent::new(1, 0.0, 0.5)])),
    );
    pipeline.process(
        ObjectRole::Section,
        &ObjectDelta::insert(section(2, 1, 1, vec![Extent::new(1, 0.6, 1.0)])),
    );

    assert_eq!(pipeline.index().get(&ev_key(6, 1, 1)), None);
    assert!(pipeline.index().is_empty());
}

#[test]
fn boundary_touching_extents_create_nothing() {
    let mut pipeline = Pipeline::new();
    pipeline.process(
        ObjectRole::RoadSystem,
        &ObjectDelta::insert(road_system(1, 6, vec![Extent::new(1, 0.0, 0.5)])),
    );
    pipeline.process(
        ObjectRole::Section,
        &ObjectDelta::insert(section(2, 1, 1, vec![Extent::new(1, 0.5, 1.0)])),
    );

    assert_eq!(pipeline.index().get(&ev_key(6, 1, 1)), None);
}

#[test]
fn update_adding_an_extent_grows_the_reference_set() {
    let mut pipeline = Pipeline::new();
    let v1 = road_system(1, 6, vec![Extent::new(1, 0.0, 1.0)]);
    let v2 = road_system(
        1,
        6,
        vec![Extent::new(1, 0.0, 1.0), Extent::new(2, 0.0, 1.0)],
    );
    let both_segments = section(
        2,
        1,
        1,
        vec![Extent::new(1, 0.0, 1.0), Extent::new(2, 0.0, 1.0)],
    );

    pipeline.process(ObjectRole::RoadSystem, &ObjectDelta::insert(v1.clone()));
    pipeline.process(ObjectRole::Section, &ObjectDelta::insert(both_segments));
    assert_eq!(
        pipeline.index().get(&ev_key(6, 1, 1)),
        Some(&BTreeSet::from([1u64]))
    );

    let report = pipeline.process(ObjectRole::RoadSystem, &ObjectDelta::update(v1, v2));
    assert_eq!(
        pipeline.index().get(&ev_key(6, 1, 1)),
        Some(&BTreeSet::from([1u64, 2u64]))
    );
    // Only segment 2 changed, so only segment 2 was recomputed.
    assert_eq!(report.segments_recomputed, 1);
    assert_eq!(report.reference_adds, 1);
    assert_eq!(report.reference_removes, 0);
}

#[test]
fn deleting_the_road_system_clears_the_key() {
    let mut pipeline = Pipeline::new();
    let road = road_system(1, 6, vec![Extent::new(1, 0.0, 1.0)]);
    pipeline.process(ObjectRole::RoadSystem, &ObjectDelta::insert(road.clone()));
    pipeline.process(
        ObjectRole::Section,
        &ObjectDelta::insert(section(2, 1, 1, vec![Extent::new(1, 0.0, 1.0)])),
    );
    assert_eq!(
        pipeline.index().get(&ev_key(6, 1, 1)),
        Some(&BTreeSet::from([1u64]))
    );

    pipeline.process(ObjectRole::RoadSystem, &ObjectDelta::delete(road));
    // The emptied key disappears from the store entirely.
    assert_eq!(pipeline.index().get(&ev_key(6, 1, 1)), None);
    assert!(pipeline.index().is_empty());
}

#[test]
fn arrival_order_does_not_matter() {
    let mut pipeline = Pipeline::new();
    pipeline.process(
        ObjectRole::Section,
        &ObjectDelta::insert(section(2, 1, 1, vec![Extent::new(1, 0.0, 1.0)])),
    );
    assert!(pipeline.index().is_empty());

    pipeline.process(
        ObjectRole::RoadSystem,
        &ObjectDelta::insert(road_system(1, 6, vec![Extent::new(1, 0.0, 1.0)])),
    );
    assert_eq!(
        pipeline.index().get(&ev_key(6, 1, 1)),
        Some(&BTreeSet::from([1u64]))
    );
}

#[test]
fn several_segments_accumulate_under_one_key() {
    let mut pipeline = Pipeline::new();
    for (road_id, section_id, segment_id) in [(1u64, 3u64, 1u64), (2, 4, 2)] {
        pipeline.process(
            ObjectRole::RoadSystem,
            &ObjectDelta::insert(road_system(
                road_id,
                6,
                vec![Extent::new(segment_id, 0.0, 1.0)],
            )),
        );
        pipeline.process(
            ObjectRole::Section,
            &ObjectDelta::insert(section(
                section_id,
                1,
                1,
                vec![Extent::new(segment_id, 0.0, 1.0)],
            )),
        );
    }
    assert_eq!(
        pipeline.index().get(&ev_key(6, 1, 1)),
        Some(&BTreeSet::from([1u64, 2u64]))
    );
}

#[test]
fn objects_without_classification_flow_through_harmlessly() {
    let mut pipeline = Pipeline::new();
    let mut bare = road_system(1, 6, vec![Extent::new(1, 0.0, 1.0)]);
    bare.properties.clear();
    pipeline.process(ObjectRole::RoadSystem, &ObjectDelta::insert(bare));
    pipeline.process(
        ObjectRole::Section,
        &ObjectDelta::insert(section(2, 1, 1, vec![Extent::new(1, 0.0, 1.0)])),
    );
    assert!(pipeline.index().is_empty());
}

#[test]
fn redelivered_deltas_leave_the_index_unchanged() {
    let mut pipeline = Pipeline::new();
    let road = ObjectDelta::insert(road_system(1, 6, vec![Extent::new(1, 0.0, 1.0)]));
    let sec = ObjectDelta::insert(section(2, 1, 1, vec![Extent::new(1, 0.0, 1.0)]));
    pipeline.process(ObjectRole::RoadSystem, &road);
    pipeline.process(ObjectRole::Section, &sec);
    let before = pipeline
        .index()
        .get(&ev_key(6, 1, 1))
        .cloned()
        .expect("reference exists");

    // At-least-once delivery means consumers see repeats.
    pipeline.process(ObjectRole::RoadSystem, &road);
    pipeline.process(ObjectRole::Section, &sec);
    assert_eq!(pipeline.index().get(&ev_key(6, 1, 1)), Some(&before));
}
