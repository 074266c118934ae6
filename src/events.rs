use crate::model::{Extent, RoadObject};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Snapshot of one object version as embedded in change events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectVersion {
    pub version: u32,
    pub properties: BTreeMap<u32, String>,
    pub extents: Vec<Extent>,
}

impl ObjectVersion {
    /// Binds the version snapshot to its object identity.
    pub fn materialize(&self, object_id: u64, object_type: u32) -> RoadObject {
        RoadObject {
            id: object_id,
            object_type,
            version: self.version,
            properties: self.properties.clone(),
            extents: self.extents.clone(),
        }
    }
}

/// Replacement or removal of an object's extent list inside a patch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtentChange {
    Replaced { extents: Vec<Extent> },
    Removed,
}

/// Partial update applied on top of an original version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectPatch {
    pub version: u32,
    #[serde(default)]
    pub property_changes: BTreeMap<u32, String>,
    #[serde(default)]
    pub extent_change: Option<ExtentChange>,
}

/// Payload variants of a change event.
///
/// The source occasionally grows new variants; they decode as `Unknown` and
/// are skipped upstream rather than failing the batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeEventData {
    Created {
        version: ObjectVersion,
    },
    Modified {
        #[serde(default)]
        original: Option<ObjectVersion>,
        patch: ObjectPatch,
    },
    Removed {
        #[serde(default)]
        original: Option<ObjectVersion>,
    },
    #[serde(other)]
    Unknown,
}

/// Notification that an object was created, modified, or removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub event_id: u64,
    pub object_id: u64,
    pub object_type: u32,
    pub data: ChangeEventData,
}

/// Applies a patch on top of the original version.
///
/// Changed properties win, unmentioned properties survive; the extent list
/// is replaced or cleared when the patch says so and kept otherwise; the
/// result adopts the patch's version id.
pub fn apply_patch(original: &ObjectVersion, patch: &ObjectPatch) -> ObjectVersion {
    let mut properties = original.properties.clone();
    for (property_id, value) in &patch.property_changes {
        properties.insert(*property_id, value.clone());
    }
    let extents = match &patch.extent_change {
        Some(ExtentChange::Replaced { extents }) => extents.clone(),
        Some(ExtentChange::Removed) => Vec::new(),
        None => original.extents.clone(),
    };
    ObjectVersion {
        version: patch.version,
        properties,
        extents,
    }
}
