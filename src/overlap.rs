use crate::extent_table::AttachedExtent;
use crate::keys::{Category, Phase, SectionKey};
use crate::model::{PROP_CATEGORY, PROP_NUMBER, PROP_PHASE, PROP_SECTION, PROP_SUBSECTION};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::debug;

/// Open intersection of two half-open intervals.
///
/// Touching at a boundary (`a.end == b.start`) is not an overlap.
pub fn overlaps(a: &AttachedExtent, b: &AttachedExtent) -> bool {
    a.start < b.end && b.start < a.end
}

/// Recomputes the full key set for one segment from both roles' extent sets.
///
/// Every overlapping (road-system, section) extent pair contributes the key
/// derived from the road-system side's category/phase/number and the section
/// side's section/subsection. Pairs missing a required classification are
/// skipped; sparse classification is expected data, not an error.
pub fn recompute_segment_keys(
    road_systems: &HashSet<AttachedExtent>,
    sections: &HashSet<AttachedExtent>,
) -> BTreeSet<SectionKey> {
    let mut keys = BTreeSet::new();
    for road_system in road_systems {
        for section in sections {
            if !overlaps(road_system, section) {
                continue;
            }
            if let Some(key) = derive_key(&road_system.properties, &section.properties) {
                keys.insert(key);
            }
        }
    }
    keys
}

/// Derives the composite key for one overlapping pair, if both sides carry
/// the required classification properties.
pub fn derive_key(
    road_system_properties: &BTreeMap<u32, String>,
    section_properties: &BTreeMap<u32, String>,
) -> Option<SectionKey> {
    let category = enum_property(road_system_properties, PROP_CATEGORY, Category::from_value_code)?;
    let phase = enum_property(road_system_properties, PROP_PHASE, Phase::from_value_code)?;
    let number = numeric_property(road_system_properties, PROP_NUMBER)?;
    let section = numeric_property(section_properties, PROP_SECTION)?;
    let subsection = numeric_property(section_properties, PROP_SUBSECTION)?;
    Some(SectionKey {
        category,
        phase,
        number,
        section,
        subsection,
    })
}

fn enum_property<T>(
    properties: &BTreeMap<u32, String>,
    property_id: u32,
    resolve: impl Fn(u32) -> Option<T>,
) -> Option<T> {
    let raw = properties.get(&property_id)?;
    let code = match raw.parse::<u32>() {
        Ok(code) => code,
        Err(_) => {
            debug!(property_id, value = %raw, "non-numeric enum property value, skipping pair");
            return None;
        }
    };
    let resolved = resolve(code);
    if resolved.is_none() {
        debug!(property_id, code, "unknown enum value code, skipping pair");
    }
    resolved
}

fn numeric_property(properties: &BTreeMap<u32, String>, property_id: u32) -> Option<u16> {
    let raw = properties.get(&property_id)?;
    match raw.parse::<u16>() {
        Ok(value) => Some(value),
        Err(_) => {
            debug!(property_id, value = %raw, "non-numeric classification value, skipping pair");
            None
        }
    }
}
