use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Object type carrying road-system classification (category/phase/number).
pub const ROAD_SYSTEM_TYPE: u32 = 915;
/// Object type carrying section/subsection classification.
pub const SECTION_TYPE: u32 = 916;

/// Classification property id for the road category enum value.
pub const PROP_CATEGORY: u32 = 11276;
/// Classification property id for the road number.
pub const PROP_NUMBER: u32 = 11277;
/// Classification property id for the road phase enum value.
pub const PROP_PHASE: u32 = 11278;
/// Classification property id for the section number.
pub const PROP_SECTION: u32 = 11281;
/// Classification property id for the subsection number.
pub const PROP_SUBSECTION: u32 = 11284;

/// Role an object stream plays in the overlap join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObjectRole {
    RoadSystem,
    Section,
}

impl ObjectRole {
    /// Object type ingested for this role.
    pub fn object_type(self) -> u32 {
        match self {
            ObjectRole::RoadSystem => ROAD_SYSTEM_TYPE,
            ObjectRole::Section => SECTION_TYPE,
        }
    }

    /// Resolves the role for an ingested object type, if it is one we index.
    pub fn from_object_type(object_type: u32) -> Option<Self> {
        match object_type {
            ROAD_SYSTEM_TYPE => Some(ObjectRole::RoadSystem),
            SECTION_TYPE => Some(ObjectRole::Section),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ObjectRole::RoadSystem => "road_system",
            ObjectRole::Section => "section",
        }
    }

    pub fn all() -> [ObjectRole; 2] {
        [ObjectRole::RoadSystem, ObjectRole::Section]
    }
}

/// Half-open position interval `[start, end)` on a network segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub segment_id: u64,
    pub start: f64,
    pub end: f64,
}

impl Extent {
    pub fn new(segment_id: u64, start: f64, end: f64) -> Self {
        Self {
            segment_id,
            start,
            end,
        }
    }
}

/// Versioned domain record placed on the linear network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadObject {
    pub id: u64,
    pub object_type: u32,
    pub version: u32,
    pub properties: BTreeMap<u32, String>,
    pub extents: Vec<Extent>,
}

impl RoadObject {
    /// Returns a classification property value, if present.
    pub fn property(&self, property_id: u32) -> Option<&str> {
        self.properties.get(&property_id).map(String::as_str)
    }
}

/// Wire form of one observed change: insert, update, or delete.
///
/// `before == None` is an insert, `after == None` a delete; both present is
/// an update. Both absent never occurs on a healthy stream and is treated as
/// an empty record by consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectDelta {
    pub before: Option<RoadObject>,
    pub after: Option<RoadObject>,
}

impl ObjectDelta {
    pub fn insert(after: RoadObject) -> Self {
        Self {
            before: None,
            after: Some(after),
        }
    }

    pub fn update(before: RoadObject, after: RoadObject) -> Self {
        Self {
            before: Some(before),
            after: Some(after),
        }
    }

    pub fn delete(before: RoadObject) -> Self {
        Self {
            before: Some(before),
            after: None,
        }
    }

    /// Tagged view so handling every variant is compiler-enforced.
    pub fn kind(&self) -> Option<DeltaKind<'_>> {
        match (&self.before, &self.after) {
            (None, Some(after)) => Some(DeltaKind::Insert(after)),
            (Some(before), Some(after)) => Some(DeltaKind::Update(before, after)),
            (Some(before), None) => Some(DeltaKind::Delete(before)),
            (None, None) => None,
        }
    }

    /// Id of the object this delta concerns.
    pub fn object_id(&self) -> Option<u64> {
        self.after
            .as_ref()
            .or(self.before.as_ref())
            .map(|object| object.id)
    }
}

/// Exhaustive classification of a before/after pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeltaKind<'a> {
    Insert(&'a RoadObject),
    Update(&'a RoadObject, &'a RoadObject),
    Delete(&'a RoadObject),
}
