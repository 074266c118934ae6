use crate::model::{ObjectDelta, RoadObject};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::hash::{Hash, Hasher};

/// Extent tagged with the identity of its owning object.
///
/// Two extents with identical coordinates on the same segment are still
/// distinct when they come from different objects (or different positions in
/// one object's extent list), so deleting one object never disturbs
/// another's attachment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachedExtent {
    pub segment_id: u64,
    pub start: f64,
    pub end: f64,
    pub extent_index: u32,
    pub object_id: u64,
    pub object_type: u32,
    pub properties: BTreeMap<u32, String>,
}

impl PartialEq for AttachedExtent {
    fn eq(&self, other: &Self) -> bool {
        self.segment_id == other.segment_id
            && self.start.to_bits() == other.start.to_bits()
            && self.end.to_bits() == other.end.to_bits()
            && self.extent_index == other.extent_index
            && self.object_id == other.object_id
            && self.object_type == other.object_type
            && self.properties == other.properties
    }
}

impl Eq for AttachedExtent {}

impl Hash for AttachedExtent {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.segment_id.hash(state);
        self.start.to_bits().hash(state);
        self.end.to_bits().hash(state);
        self.extent_index.hash(state);
        self.object_id.hash(state);
        self.object_type.hash(state);
        self.properties.hash(state);
    }
}

/// Signed per-segment extent change produced by diffing a delta's sides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtentDelta {
    pub removed: bool,
    pub extent: AttachedExtent,
}

impl ExtentDelta {
    pub fn segment_id(&self) -> u64 {
        self.extent.segment_id
    }
}

/// Expands an optional object into the set of extents it attaches.
pub fn attached_extents(object: Option<&RoadObject>) -> HashSet<AttachedExtent> {
    let Some(object) = object else {
        return HashSet::new();
    };
    object
        .extents
        .iter()
        .enumerate()
        .map(|(index, extent)| AttachedExtent {
            segment_id: extent.segment_id,
            start: extent.start,
            end: extent.end,
            extent_index: index as u32,
            object_id: object.id,
            object_type: object.object_type,
            properties: object.properties.clone(),
        })
        .collect()
}

/// Diffs the two sides of an object delta into signed per-segment events.
///
/// Removals are emitted before additions. One object delta fans out into
/// events for every segment its extents touch.
pub fn diff_extents(delta: &ObjectDelta) -> Vec<ExtentDelta> {
    let before = attached_extents(delta.before.as_ref());
    let after = attached_extents(delta.after.as_ref());
    let mut deltas = Vec::new();
    for extent in before.difference(&after) {
        deltas.push(ExtentDelta {
            removed: true,
            extent: extent.clone(),
        });
    }
    for extent in after.difference(&before) {
        deltas.push(ExtentDelta {
            removed: false,
            extent: extent.clone(),
        });
    }
    deltas
}

/// Per-segment table of the extents currently attached by one object role.
///
/// Folding the full delta stream keeps each entry equal to the extents of
/// all live objects of the role on that segment. Removal of a non-member is
/// a no-op, so redelivered events leave the table unchanged.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ExtentTable {
    entries: BTreeMap<u64, HashSet<AttachedExtent>>,
}

impl ExtentTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one signed event and returns the segment it touched.
    pub fn apply(&mut self, delta: &ExtentDelta) -> u64 {
        let segment_id = delta.segment_id();
        if delta.removed {
            if let Some(entry) = self.entries.get_mut(&segment_id) {
                entry.remove(&delta.extent);
                if entry.is_empty() {
                    self.entries.remove(&segment_id);
                }
            }
        } else {
            self.entries
                .entry(segment_id)
                .or_default()
                .insert(delta.extent.clone());
        }
        segment_id
    }

    /// Extents currently attached to a segment, if any.
    pub fn segment(&self, segment_id: u64) -> Option<&HashSet<AttachedExtent>> {
        self.entries.get(&segment_id)
    }

    /// Number of segments with at least one attached extent.
    pub fn segment_count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Segments with at least one attached extent, in id order.
    pub fn segments(&self) -> impl Iterator<Item = u64> + '_ {
        self.entries.keys().copied()
    }
}
