use crate::bus::{BusError, DeltaBus};
use crate::events::{apply_patch, ChangeEvent, ChangeEventData};
use crate::model::{ObjectDelta, ObjectRole};
use crate::progress::{
    load_or_reset, Clock, IngestionMode, IngestionProgress, ProgressStore, ProgressStoreError,
};
use crate::source::{ObjectSource, SourceError};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Tunables for the ingestion state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProducerConfig {
    pub backfill_page_size: usize,
    pub updates_batch_size: usize,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            backfill_page_size: 1_000,
            updates_batch_size: 500,
        }
    }
}

/// Failure inside one ingestion unit of work.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("source: {0}")]
    Source(#[from] SourceError),
    #[error("bus: {0}")]
    Bus(#[from] BusError),
    #[error("progress store: {0}")]
    Progress(#[from] ProgressStoreError),
    #[error("no event cursor stored for type {object_type} in updates mode")]
    MissingEventCursor { object_type: u32 },
}

/// Report of one scheduler tick for an object type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// No progress record exists; start has not been requested.
    NotInitialized,
    Backfill {
        pages: usize,
        objects: usize,
        completed: bool,
        interrupted: bool,
    },
    Updates {
        events: usize,
        skipped: usize,
        interrupted: bool,
    },
    /// The tick aborted; the error is also persisted as `last_error`.
    Failed { error: String },
}

/// Result of a start request: the active progress record, and whether the
/// request found a backfill already in progress.
#[derive(Debug, Clone, PartialEq)]
pub struct StartOutcome {
    pub progress: IngestionProgress,
    pub already_running: bool,
}

/// Scheduler seam: one scheduled unit of work for an object type.
pub trait IngestTick: Send {
    fn tick(&mut self) -> TickOutcome;
}

/// Control seam each object type's producer exposes to the control surface.
pub trait BackfillControl: Send {
    fn start(&mut self) -> Result<StartOutcome, IngestError>;
    fn stop(&mut self) -> Result<(), IngestError>;
    fn reset(&mut self) -> Result<StartOutcome, IngestError>;
    fn status(&self) -> Result<Option<IngestionProgress>, IngestError>;
}

enum PageResult {
    Advanced { published: usize },
    Completed { published: usize },
    Interrupted { published: usize },
}

/// Two-phase ingestion state machine for one object type.
///
/// Drives `UNINITIALIZED -> BACKFILL -> UPDATES` with durable, monotonically
/// advancing checkpoints. One instance exists per object type; instances
/// never share state, so a failing type cannot block the other.
pub struct ObjectProducer<S, B, P, C> {
    role: ObjectRole,
    source: S,
    bus: B,
    store: P,
    clock: C,
    config: ProducerConfig,
    running: Arc<AtomicBool>,
}

impl<S, B, P, C> ObjectProducer<S, B, P, C>
where
    S: ObjectSource,
    B: DeltaBus,
    P: ProgressStore,
    C: Clock,
{
    pub fn new(
        role: ObjectRole,
        source: S,
        bus: B,
        store: P,
        clock: C,
        config: ProducerConfig,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            role,
            source,
            bus,
            store,
            clock,
            config,
            running,
        }
    }

    pub fn object_type(&self) -> u32 {
        self.role.object_type()
    }

    /// Shared shutdown flag polled between pages and batches.
    pub fn running_handle(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Runs one scheduled unit of work for this type.
    ///
    /// In backfill mode this keeps fetching pages until completion, an
    /// error, or a shutdown request; in updates mode it processes one event
    /// batch.
    pub fn tick(&mut self) -> TickOutcome {
        let object_type = self.object_type();
        let progress = match load_or_reset(&self.store, object_type) {
            Ok(progress) => progress,
            Err(err) => {
                warn!(object_type, %err, "progress load failed, retrying next tick");
                return TickOutcome::Failed {
                    error: err.to_string(),
                };
            }
        };
        match progress {
            None => TickOutcome::NotInitialized,
            Some(progress) if progress.mode == IngestionMode::Backfill => {
                self.run_backfill(progress)
            }
            Some(progress) => self.run_updates(progress),
        }
    }

    fn run_backfill(&mut self, mut progress: IngestionProgress) -> TickOutcome {
        let object_type = self.object_type();
        let mut pages = 0;
        let mut objects = 0;
        loop {
            if !self.is_running() {
                info!(object_type, pages, objects, "backfill stopped by shutdown");
                return TickOutcome::Backfill {
                    pages,
                    objects,
                    completed: false,
                    interrupted: true,
                };
            }
            match self.backfill_page(&mut progress) {
                Ok(PageResult::Advanced { published }) => {
                    pages += 1;
                    objects += published;
                }
                Ok(PageResult::Completed { published }) => {
                    pages += 1;
                    objects += published;
                    info!(
                        object_type,
                        pages, objects, "backfill complete, switching to updates mode"
                    );
                    return TickOutcome::Backfill {
                        pages,
                        objects,
                        completed: true,
                        interrupted: false,
                    };
                }
                Ok(PageResult::Interrupted { published }) => {
                    pages += 1;
                    objects += published;
                    info!(
                        object_type,
                        pages, objects, "backfill page interrupted by shutdown"
                    );
                    return TickOutcome::Backfill {
                        pages,
                        objects,
                        completed: false,
                        interrupted: true,
                    };
                }
                Err(err) => return self.record_failure(progress, &err),
            }
        }
    }

    /// Fetches and publishes one backfill page, then advances the
    /// checkpoint. The checkpoint write happens strictly after the flush so
    /// it never passes an unacknowledged publish.
    fn backfill_page(
        &mut self,
        progress: &mut IngestionProgress,
    ) -> Result<PageResult, IngestError> {
        let object_type = self.object_type();
        let page = self.source.fetch_object_page(
            object_type,
            progress.last_processed_object_id,
            self.config.backfill_page_size,
        )?;
        let fetched = page.len();

        let mut last_id = None;
        let mut published = 0;
        let mut interrupted = false;
        for object in page {
            if !self.is_running() {
                interrupted = true;
                break;
            }
            let object_id = object.id;
            let delta = ObjectDelta::insert(object);
            self.bus.publish(self.role, object_id, &delta)?;
            last_id = Some(object_id);
            published += 1;
        }
        // Drain acknowledgements before any checkpoint write, also on the
        // shutdown path.
        self.bus.flush()?;

        if let Some(last_id) = last_id {
            progress.last_processed_object_id = Some(last_id);
        }
        progress.updated_ms = self.clock.now_ms();
        if interrupted {
            self.store.save(progress)?;
            return Ok(PageResult::Interrupted { published });
        }

        progress.last_error = None;
        let completed = fetched < self.config.backfill_page_size;
        if completed {
            progress.mode = IngestionMode::Updates;
            progress.backfill_completed_ms = Some(progress.updated_ms);
        }
        self.store.save(progress)?;
        if completed {
            Ok(PageResult::Completed { published })
        } else {
            Ok(PageResult::Advanced { published })
        }
    }

    fn run_updates(&mut self, mut progress: IngestionProgress) -> TickOutcome {
        let object_type = self.object_type();
        let Some(after_event_id) = progress.last_event_id else {
            let err = IngestError::MissingEventCursor { object_type };
            return self.record_failure(progress, &err);
        };
        let batch = match self.source.fetch_event_page(
            object_type,
            after_event_id,
            self.config.updates_batch_size,
        ) {
            Ok(batch) => batch,
            Err(err) => return self.record_failure(progress, &IngestError::Source(err)),
        };
        if batch.is_empty() {
            return TickOutcome::Updates {
                events: 0,
                skipped: 0,
                interrupted: false,
            };
        }

        let mut last_event_id = None;
        let mut events = 0;
        let mut skipped = 0;
        let mut interrupted = false;
        for event in batch {
            if !self.is_running() {
                interrupted = true;
                break;
            }
            let event_id = event.event_id;
            match translate_event(&event) {
                Some((object_id, delta)) => {
                    if let Err(err) = self.bus.publish(self.role, object_id, &delta) {
                        // Publishes already issued are drained by flush on
                        // the failure path before the error is recorded.
                        let _ = self.bus.flush();
                        return self.record_failure(progress, &IngestError::Bus(err));
                    }
                    events += 1;
                }
                None => skipped += 1,
            }
            last_event_id = Some(event_id);
        }
        if let Err(err) = self.bus.flush() {
            return self.record_failure(progress, &IngestError::Bus(err));
        }

        if let Some(last_event_id) = last_event_id {
            progress.last_event_id = Some(last_event_id);
            progress.last_error = None;
            progress.updated_ms = self.clock.now_ms();
            if let Err(err) = self.store.save(&progress) {
                return self.record_failure(progress, &IngestError::Progress(err));
            }
        }
        info!(
            object_type,
            events, skipped, interrupted, "updates batch processed"
        );
        TickOutcome::Updates {
            events,
            skipped,
            interrupted,
        }
    }

    /// Persists the failure without advancing any cursor; the same type is
    /// retried on the next scheduled tick.
    fn record_failure(
        &mut self,
        mut progress: IngestionProgress,
        err: &IngestError,
    ) -> TickOutcome {
        let object_type = self.object_type();
        warn!(object_type, %err, "ingestion batch failed");
        progress.last_error = Some(err.to_string());
        progress.updated_ms = self.clock.now_ms();
        if let Err(save_err) = self.store.save(&progress) {
            warn!(object_type, %save_err, "failed to persist ingestion error");
        }
        TickOutcome::Failed {
            error: err.to_string(),
        }
    }
}

impl<S, B, P, C> IngestTick for ObjectProducer<S, B, P, C>
where
    S: ObjectSource + Send,
    B: DeltaBus + Send,
    P: ProgressStore + Send,
    C: Clock + Send,
{
    fn tick(&mut self) -> TickOutcome {
        ObjectProducer::tick(self)
    }
}

impl<S, B, P, C> BackfillControl for ObjectProducer<S, B, P, C>
where
    S: ObjectSource + Send,
    B: DeltaBus + Send,
    P: ProgressStore + Send,
    C: Clock + Send,
{
    /// Initializes backfill, pinning the current event-log tail first so
    /// events arriving during backfill are replayed once updates begin.
    /// Idempotent while a backfill is already in progress.
    fn start(&mut self) -> Result<StartOutcome, IngestError> {
        let object_type = self.object_type();
        if let Some(existing) = load_or_reset(&self.store, object_type)? {
            if existing.mode == IngestionMode::Backfill {
                warn!(object_type, "backfill already in progress");
                return Ok(StartOutcome {
                    progress: existing,
                    already_running: true,
                });
            }
        }
        let latest_event_id = self.source.fetch_latest_event_id(object_type)?;
        let now_ms = self.clock.now_ms();
        let progress = IngestionProgress {
            object_type,
            mode: IngestionMode::Backfill,
            last_processed_object_id: None,
            last_event_id: Some(latest_event_id),
            backfill_started_ms: now_ms,
            backfill_completed_ms: None,
            last_error: None,
            updated_ms: now_ms,
        };
        self.store.save(&progress)?;
        info!(
            object_type,
            latest_event_id, "backfill started, event cursor pinned"
        );
        Ok(StartOutcome {
            progress,
            already_running: false,
        })
    }

    /// Deletes the progress record, halting further scheduled work.
    fn stop(&mut self) -> Result<(), IngestError> {
        let object_type = self.object_type();
        self.store.delete(object_type)?;
        info!(object_type, "backfill stopped");
        Ok(())
    }

    /// Stops, then restarts backfill from the beginning.
    fn reset(&mut self) -> Result<StartOutcome, IngestError> {
        let object_type = self.object_type();
        self.store.delete(object_type)?;
        info!(object_type, "backfill reset");
        self.start()
    }

    fn status(&self) -> Result<Option<IngestionProgress>, IngestError> {
        Ok(load_or_reset(&self.store, self.object_type())?)
    }
}

/// Translates one change event into a keyed delta, or `None` when the event
/// must be skipped (unknown variant or missing embedded original).
pub fn translate_event(event: &ChangeEvent) -> Option<(u64, ObjectDelta)> {
    match &event.data {
        ChangeEventData::Created { version } => Some((
            event.object_id,
            ObjectDelta::insert(version.materialize(event.object_id, event.object_type)),
        )),
        ChangeEventData::Modified { original, patch } => {
            let Some(original) = original else {
                warn!(
                    event_id = event.event_id,
                    object_id = event.object_id,
                    "modified event is missing its original version, skipping"
                );
                return None;
            };
            let before = original.materialize(event.object_id, event.object_type);
            let after =
                apply_patch(original, patch).materialize(event.object_id, event.object_type);
            Some((event.object_id, ObjectDelta::update(before, after)))
        }
        ChangeEventData::Removed { original } => {
            let Some(original) = original else {
                warn!(
                    event_id = event.event_id,
                    object_id = event.object_id,
                    "removed event is missing its original version, skipping"
                );
                return None;
            };
            Some((
                event.object_id,
                ObjectDelta::delete(original.materialize(event.object_id, event.object_type)),
            ))
        }
        ChangeEventData::Unknown => {
            warn!(
                event_id = event.event_id,
                object_id = event.object_id,
                "unknown change event variant, skipping"
            );
            None
        }
    }
}
