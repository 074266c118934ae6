use crate::producer::BackfillControl;
use crate::progress::{IngestionMode, IngestionProgress};
use crate::reference_index::{QueryError, ReferenceIndex};
use serde::Serialize;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tracing::warn;

/// Action acknowledged by a control request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlAction {
    Started,
    AlreadyRunning,
    Stopped,
    Reset,
}

/// Response to a start/stop/reset control request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControlResponse {
    pub object_type: u32,
    pub action: ControlAction,
    pub message: String,
}

/// Mode reported by status queries; uninitialized types are not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusMode {
    NotInitialized,
    Backfill,
    Updates,
}

impl From<IngestionMode> for StatusMode {
    fn from(mode: IngestionMode) -> Self {
        match mode {
            IngestionMode::Backfill => StatusMode::Backfill,
            IngestionMode::Updates => StatusMode::Updates,
        }
    }
}

/// Ingestion status for one object type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeStatus {
    pub object_type: u32,
    pub mode: StatusMode,
    pub last_processed_object_id: Option<u64>,
    pub last_event_id: Option<u64>,
    pub backfill_started_ms: Option<u64>,
    pub backfill_completed_ms: Option<u64>,
    pub last_error: Option<String>,
    pub updated_ms: Option<u64>,
}

impl TypeStatus {
    fn uninitialized(object_type: u32) -> Self {
        Self {
            object_type,
            mode: StatusMode::NotInitialized,
            last_processed_object_id: None,
            last_event_id: None,
            backfill_started_ms: None,
            backfill_completed_ms: None,
            last_error: None,
            updated_ms: None,
        }
    }

    fn from_progress(progress: IngestionProgress) -> Self {
        Self {
            object_type: progress.object_type,
            mode: progress.mode.into(),
            last_processed_object_id: progress.last_processed_object_id,
            last_event_id: progress.last_event_id,
            backfill_started_ms: Some(progress.backfill_started_ms),
            backfill_completed_ms: progress.backfill_completed_ms,
            last_error: progress.last_error,
            updated_ms: Some(progress.updated_ms),
        }
    }
}

/// Status summary across every managed object type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverallStatus {
    pub types: Vec<TypeStatus>,
}

/// Outcome of a flexible-pattern index query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum QueryOutcome {
    Matches {
        pattern: String,
        matched_keys: Vec<String>,
        match_count: usize,
        segment_ids: BTreeSet<u64>,
    },
    NotFound {
        pattern: String,
    },
    InvalidPattern {
        pattern: String,
        reason: String,
    },
    Unavailable {
        reason: String,
    },
}

/// Failure surfaced by a control request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControlError {
    pub object_type: Option<u32>,
    pub message: String,
}

type SharedControl = Arc<Mutex<dyn BackfillControl>>;

/// Control surface over the per-type producers and the reference index.
///
/// Each producer sits behind its own mutex, so controlling one type never
/// blocks another. Queries read the index through the shared handle the
/// aggregator writes to.
pub struct ControlService {
    producers: BTreeMap<u32, SharedControl>,
    index: Arc<RwLock<ReferenceIndex>>,
}

impl ControlService {
    pub fn new(
        producers: BTreeMap<u32, SharedControl>,
        index: Arc<RwLock<ReferenceIndex>>,
    ) -> Self {
        Self { producers, index }
    }

    fn producer(&self, object_type: u32) -> Result<&SharedControl, ControlError> {
        self.producers.get(&object_type).ok_or_else(|| ControlError {
            object_type: Some(object_type),
            message: format!("object type {object_type} is not managed"),
        })
    }

    fn lock(
        &self,
        object_type: u32,
    ) -> Result<MutexGuard<'_, dyn BackfillControl + 'static>, ControlError> {
        self.producer(object_type)?.lock().map_err(|_| ControlError {
            object_type: Some(object_type),
            message: "producer state poisoned".to_string(),
        })
    }

    /// Starts backfill for a type; idempotent while already backfilling.
    pub fn start(&self, object_type: u32) -> Result<ControlResponse, ControlError> {
        let mut producer = self.lock(object_type)?;
        let outcome = producer.start().map_err(|err| ControlError {
            object_type: Some(object_type),
            message: err.to_string(),
        })?;
        let (action, message) = if outcome.already_running {
            (
                ControlAction::AlreadyRunning,
                format!("backfill already in progress for type {object_type}"),
            )
        } else {
            (
                ControlAction::Started,
                format!("backfill started for type {object_type}"),
            )
        };
        Ok(ControlResponse {
            object_type,
            action,
            message,
        })
    }

    /// Stops scheduled work for a type by deleting its progress record.
    pub fn stop(&self, object_type: u32) -> Result<ControlResponse, ControlError> {
        let mut producer = self.lock(object_type)?;
        producer.stop().map_err(|err| ControlError {
            object_type: Some(object_type),
            message: err.to_string(),
        })?;
        Ok(ControlResponse {
            object_type,
            action: ControlAction::Stopped,
            message: format!("backfill stopped for type {object_type}"),
        })
    }

    /// Deletes progress and restarts backfill from the beginning.
    pub fn reset(&self, object_type: u32) -> Result<ControlResponse, ControlError> {
        let mut producer = self.lock(object_type)?;
        producer.reset().map_err(|err| ControlError {
            object_type: Some(object_type),
            message: err.to_string(),
        })?;
        Ok(ControlResponse {
            object_type,
            action: ControlAction::Reset,
            message: format!("backfill reset for type {object_type}"),
        })
    }

    /// Status for one type; an uninitialized type reports `NotInitialized`.
    pub fn status(&self, object_type: u32) -> Result<TypeStatus, ControlError> {
        let producer = self.lock(object_type)?;
        let progress = producer.status().map_err(|err| ControlError {
            object_type: Some(object_type),
            message: err.to_string(),
        })?;
        Ok(match progress {
            Some(progress) => TypeStatus::from_progress(progress),
            None => TypeStatus::uninitialized(object_type),
        })
    }

    /// Status summary across all managed types.
    pub fn overall_status(&self) -> Result<OverallStatus, ControlError> {
        let mut types = Vec::with_capacity(self.producers.len());
        for object_type in self.producers.keys() {
            types.push(self.status(*object_type)?);
        }
        Ok(OverallStatus { types })
    }

    /// Queries the reference index by a flexible key pattern.
    pub fn query(&self, pattern: &str) -> QueryOutcome {
        let prefix = match crate::keys::parse_flexible(pattern) {
            Ok(prefix) => prefix,
            Err(err) => {
                return QueryOutcome::InvalidPattern {
                    pattern: pattern.to_string(),
                    reason: err.to_string(),
                }
            }
        };
        let index = match self.index.read() {
            Ok(index) => index,
            Err(_) => {
                return QueryOutcome::Unavailable {
                    reason: "reference index unavailable".to_string(),
                }
            }
        };
        match index.query(&prefix) {
            Ok(matched) if matched.is_empty() => QueryOutcome::NotFound {
                pattern: pattern.to_string(),
            },
            Ok(matched) => QueryOutcome::Matches {
                pattern: pattern.to_string(),
                matched_keys: matched.keys.iter().map(|key| key.to_string()).collect(),
                match_count: matched.keys.len(),
                segment_ids: matched.segment_ids,
            },
            Err(QueryError::Pattern(err)) => QueryOutcome::InvalidPattern {
                pattern: pattern.to_string(),
                reason: err.to_string(),
            },
            Err(QueryError::Corrupt(err)) => {
                warn!(%err, "reference index returned a corrupt entry");
                QueryOutcome::Unavailable {
                    reason: format!("reference index corrupt: {err}"),
                }
            }
        }
    }
}
