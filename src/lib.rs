//! Continuously updated road-section reference index over a streamed
//! road-object source.
//!
//! Object deltas ingested from the external source flow through per-role
//! extent tables, an interval-overlap join, and a snapshot-to-delta change
//! detector into a range-queryable index from composite section keys to the
//! segments referencing them.

pub mod app;
pub mod bus;
pub mod change_detector;
pub mod codec;
pub mod config;
pub mod control;
pub mod events;
pub mod extent_table;
pub mod keys;
pub mod model;
pub mod overlap;
pub mod pipeline;
pub mod producer;
pub mod progress;
pub mod reference_index;
pub mod runtime;
pub mod source;

pub use bus::{BusError, DeltaBus, InMemoryBus, PublishedDelta, SharedBus};
pub use change_detector::{ChangeDetector, ReferenceDelta};
pub use codec::{
    decode_key, decode_key_set, decode_reference_delta, encode_key, encode_key_set,
    encode_reference_delta, CodecError, REFERENCE_DELTA_WIDTH, SECTION_KEY_WIDTH,
};
pub use config::{load_config, Config, ConfigError};
pub use control::{
    ControlAction, ControlError, ControlResponse, ControlService, OverallStatus, QueryOutcome,
    StatusMode, TypeStatus,
};
pub use events::{
    apply_patch, ChangeEvent, ChangeEventData, ExtentChange, ObjectPatch, ObjectVersion,
};
pub use extent_table::{attached_extents, diff_extents, AttachedExtent, ExtentDelta, ExtentTable};
pub use keys::{
    parse_flexible, Category, KeyRange, PartialSectionKey, PatternError, Phase, SectionKey,
};
pub use model::{
    DeltaKind, Extent, ObjectDelta, ObjectRole, RoadObject, PROP_CATEGORY, PROP_NUMBER,
    PROP_PHASE, PROP_SECTION, PROP_SUBSECTION, ROAD_SYSTEM_TYPE, SECTION_TYPE,
};
pub use overlap::{derive_key, overlaps, recompute_segment_keys};
pub use pipeline::{Pipeline, PipelineReport, SegmentPartition};
pub use producer::{
    translate_event, BackfillControl, IngestError, IngestTick, ObjectProducer, ProducerConfig,
    StartOutcome, TickOutcome,
};
pub use progress::{
    load_or_reset, Clock, IngestionMode, IngestionProgress, InMemoryProgressStore,
    JsonFileProgressStore, ProgressStore, ProgressStoreError, SystemClock,
};
pub use reference_index::{QueryError, RangeMatch, ReferenceIndex};
pub use runtime::{
    hash_segment_id, IngestScheduler, PipelineRuntime, RuntimeConfig, RuntimeError,
    ShutdownReport,
};
pub use source::{HttpObjectSource, ObjectSource, SourceError};
