use crate::keys::SectionKey;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Incremental add/remove event for one composite key on one segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReferenceDelta {
    pub removed: bool,
    pub key: SectionKey,
    pub segment_id: u64,
}

/// Stateful operator converting full recomputed key sets into deltas.
///
/// Upstream joins only expose the current full key set per segment; this
/// operator diffs each new set against the last one it committed for the
/// segment and emits the difference, which is what downstream accumulation
/// needs. State for a segment is deleted outright when its set becomes
/// empty, keeping storage proportional to live segments.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ChangeDetector {
    previous: BTreeMap<u64, BTreeSet<SectionKey>>,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Diffs the new full set against the committed one and updates state.
    ///
    /// Emits removals before additions. Produces no events when the set is
    /// unchanged.
    pub fn process(
        &mut self,
        segment_id: u64,
        new_keys: BTreeSet<SectionKey>,
    ) -> Vec<ReferenceDelta> {
        let previous = self.previous.get(&segment_id);
        let empty = BTreeSet::new();
        let previous_keys = previous.unwrap_or(&empty);

        let mut deltas = Vec::new();
        for key in previous_keys.difference(&new_keys) {
            deltas.push(ReferenceDelta {
                removed: true,
                key: *key,
                segment_id,
            });
        }
        for key in new_keys.difference(previous_keys) {
            deltas.push(ReferenceDelta {
                removed: false,
                key: *key,
                segment_id,
            });
        }

        if new_keys.is_empty() {
            self.previous.remove(&segment_id);
        } else {
            self.previous.insert(segment_id, new_keys);
        }
        deltas
    }

    /// Last committed key set for a segment, if any.
    pub fn previous_keys(&self, segment_id: u64) -> Option<&BTreeSet<SectionKey>> {
        self.previous.get(&segment_id)
    }

    /// Number of segments with committed non-empty state.
    pub fn tracked_segments(&self) -> usize {
        self.previous.len()
    }
}
