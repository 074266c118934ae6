use crate::change_detector::{ChangeDetector, ReferenceDelta};
use crate::extent_table::{diff_extents, ExtentDelta, ExtentTable};
use crate::model::{ObjectDelta, ObjectRole};
use crate::overlap::recompute_segment_keys;
use crate::reference_index::ReferenceIndex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// Counters for one processed unit of work.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PipelineReport {
    pub extent_deltas: usize,
    pub segments_recomputed: usize,
    pub reference_adds: usize,
    pub reference_removes: usize,
}

impl PipelineReport {
    fn count(&mut self, deltas: &[ReferenceDelta]) {
        for delta in deltas {
            if delta.removed {
                self.reference_removes += 1;
            } else {
                self.reference_adds += 1;
            }
        }
    }
}

/// Join and change-detection state for one partition of the segment space.
///
/// Owns both roles' extent tables and the change detector for its segments;
/// exactly one worker may hold a partition, which is what keeps per-segment
/// event ordering strict without any locking.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct SegmentPartition {
    road_systems: ExtentTable,
    sections: ExtentTable,
    detector: ChangeDetector,
}

impl SegmentPartition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a batch of signed extent events for one role, recomputes each
    /// touched segment once, and returns the emitted reference deltas.
    pub fn apply_extent_deltas(
        &mut self,
        role: ObjectRole,
        deltas: &[ExtentDelta],
        report: &mut PipelineReport,
    ) -> Vec<ReferenceDelta> {
        let table = match role {
            ObjectRole::RoadSystem => &mut self.road_systems,
            ObjectRole::Section => &mut self.sections,
        };
        let mut touched = BTreeSet::new();
        for delta in deltas {
            touched.insert(table.apply(delta));
        }
        report.extent_deltas += deltas.len();

        let empty = HashSet::new();
        let mut emitted = Vec::new();
        for segment_id in touched {
            let left = self.road_systems.segment(segment_id).unwrap_or(&empty);
            let right = self.sections.segment(segment_id).unwrap_or(&empty);
            let keys = recompute_segment_keys(left, right);
            emitted.extend(self.detector.process(segment_id, keys));
            report.segments_recomputed += 1;
        }
        report.count(&emitted);
        emitted
    }

    /// Diffs one object delta and runs the batch through the partition.
    pub fn apply_object_delta(
        &mut self,
        role: ObjectRole,
        delta: &ObjectDelta,
        report: &mut PipelineReport,
    ) -> Vec<ReferenceDelta> {
        let extent_deltas = diff_extents(delta);
        self.apply_extent_deltas(role, &extent_deltas, report)
    }

    pub fn road_systems(&self) -> &ExtentTable {
        &self.road_systems
    }

    pub fn sections(&self) -> &ExtentTable {
        &self.sections
    }

    pub fn detector(&self) -> &ChangeDetector {
        &self.detector
    }
}

/// Single-owner dataflow from object deltas to the queryable index.
///
/// The synchronous counterpart of the partitioned runtime: one partition
/// covering the whole segment space plus the reference index, useful for
/// tests and single-threaded embedding.
#[derive(Debug, Default)]
pub struct Pipeline {
    partition: SegmentPartition,
    index: ReferenceIndex,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Processes one object delta end to end.
    pub fn process(&mut self, role: ObjectRole, delta: &ObjectDelta) -> PipelineReport {
        let mut report = PipelineReport::default();
        for reference_delta in self
            .partition
            .apply_object_delta(role, delta, &mut report)
        {
            self.index.apply(&reference_delta);
        }
        report
    }

    pub fn index(&self) -> &ReferenceIndex {
        &self.index
    }

    pub fn partition(&self) -> &SegmentPartition {
        &self.partition
    }
}
