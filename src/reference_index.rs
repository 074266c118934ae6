use crate::change_detector::ReferenceDelta;
use crate::codec::{self, CodecError, SECTION_KEY_WIDTH};
use crate::keys::{KeyRange, PartialSectionKey, PatternError, SectionKey};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Query failure surfaced to the control surface.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("invalid query pattern: {0}")]
    Pattern(#[from] PatternError),
    #[error("stored key is not decodable: {0}")]
    Corrupt(CodecError),
}

/// Keys and aggregated segment ids matched by a range scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeMatch {
    pub keys: Vec<SectionKey>,
    pub segment_ids: BTreeSet<u64>,
}

impl RangeMatch {
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Range-scannable mapping from composite key to the set of segment ids
/// referencing it.
///
/// Entries are keyed by the fixed-width encoding, so the store's native
/// byte order is exactly the key's total order and prefix queries are plain
/// range scans. The value for a key is always the net effect of the deltas
/// applied so far; a key whose set empties is deleted from the store. The
/// index is a materialized view: recovery after corruption is a replay of
/// the upstream delta history, never a rebuild from the index itself.
#[derive(Debug, Default, Clone)]
pub struct ReferenceIndex {
    entries: BTreeMap<[u8; SECTION_KEY_WIDTH], BTreeSet<u64>>,
}

impl ReferenceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one add/remove delta. Idempotent per (key, segment) pair.
    pub fn apply(&mut self, delta: &ReferenceDelta) {
        let encoded = codec::encode_key(&delta.key);
        if delta.removed {
            if let Some(entry) = self.entries.get_mut(&encoded) {
                entry.remove(&delta.segment_id);
                if entry.is_empty() {
                    self.entries.remove(&encoded);
                }
            }
        } else {
            self.entries
                .entry(encoded)
                .or_default()
                .insert(delta.segment_id);
        }
    }

    /// Segment ids stored under an exact key, if any.
    pub fn get(&self, key: &SectionKey) -> Option<&BTreeSet<u64>> {
        self.entries.get(&codec::encode_key(key))
    }

    /// Scans the half-open range, returning matched keys in key order and
    /// the union of their segment sets.
    pub fn range(&self, range: &KeyRange) -> Result<RangeMatch, QueryError> {
        let from = codec::encode_key(&range.from);
        let to = codec::encode_key(&range.to);
        let mut matched = RangeMatch::default();
        for (encoded, segment_ids) in self.entries.range(from..to) {
            let key = codec::decode_key(encoded).map_err(QueryError::Corrupt)?;
            matched.keys.push(key);
            matched.segment_ids.extend(segment_ids.iter().copied());
        }
        Ok(matched)
    }

    /// Scans all keys sharing the prefix.
    pub fn query(&self, prefix: &PartialSectionKey) -> Result<RangeMatch, QueryError> {
        self.range(&prefix.to_range())
    }

    /// Number of keys with at least one referencing segment.
    pub fn key_count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
