use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::warn;

/// Ingestion phase for one object type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IngestionMode {
    Backfill,
    Updates,
}

/// Durable checkpoint record for one object type's ingestion.
///
/// `last_processed_object_id` and `last_event_id` only ever advance; they
/// are written strictly after the bus has acknowledged every publish of the
/// unit of work they describe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionProgress {
    pub object_type: u32,
    pub mode: IngestionMode,
    pub last_processed_object_id: Option<u64>,
    pub last_event_id: Option<u64>,
    pub backfill_started_ms: u64,
    pub backfill_completed_ms: Option<u64>,
    pub last_error: Option<String>,
    pub updated_ms: u64,
}

/// Failure surfaced by the progress store collaborator.
#[derive(Debug, Error)]
pub enum ProgressStoreError {
    #[error("progress store io for type {object_type}: {source}")]
    Io {
        object_type: u32,
        source: std::io::Error,
    },
    #[error("progress record for type {object_type} is undecodable: {source}")]
    Decode {
        object_type: u32,
        source: serde_json::Error,
    },
    #[error("progress record for type {object_type} failed checksum validation")]
    Corrupt { object_type: u32 },
}

/// Keyed store of ingestion progress records, one per object type.
pub trait ProgressStore {
    fn load(&self, object_type: u32) -> Result<Option<IngestionProgress>, ProgressStoreError>;
    fn save(&mut self, progress: &IngestionProgress) -> Result<(), ProgressStoreError>;
    fn delete(&mut self, object_type: u32) -> Result<(), ProgressStoreError>;
}

/// Volatile store for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct InMemoryProgressStore {
    records: HashMap<u32, IngestionProgress>,
}

impl InMemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressStore for InMemoryProgressStore {
    fn load(&self, object_type: u32) -> Result<Option<IngestionProgress>, ProgressStoreError> {
        Ok(self.records.get(&object_type).cloned())
    }

    fn save(&mut self, progress: &IngestionProgress) -> Result<(), ProgressStoreError> {
        self.records.insert(progress.object_type, progress.clone());
        Ok(())
    }

    fn delete(&mut self, object_type: u32) -> Result<(), ProgressStoreError> {
        self.records.remove(&object_type);
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ProgressEnvelope {
    checksum: String,
    record: IngestionProgress,
}

/// File-backed store writing one checksummed JSON record per object type.
///
/// The checksum is validated on load; a mismatch surfaces as
/// [`ProgressStoreError::Corrupt`] so the caller can decide whether to treat
/// the record as absent and restart from scratch.
#[derive(Debug, Clone)]
pub struct JsonFileProgressStore {
    dir: PathBuf,
}

impl JsonFileProgressStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, ProgressStoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| ProgressStoreError::Io {
            object_type: 0,
            source,
        })?;
        Ok(Self { dir })
    }

    fn path(&self, object_type: u32) -> PathBuf {
        self.dir.join(format!("progress-{object_type}.json"))
    }
}

impl ProgressStore for JsonFileProgressStore {
    fn load(&self, object_type: u32) -> Result<Option<IngestionProgress>, ProgressStoreError> {
        let path = self.path(object_type);
        let payload = match fs::read_to_string(&path) {
            Ok(payload) => payload,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ProgressStoreError::Io {
                    object_type,
                    source,
                })
            }
        };
        let envelope: ProgressEnvelope =
            serde_json::from_str(&payload).map_err(|source| ProgressStoreError::Decode {
                object_type,
                source,
            })?;
        let record_json =
            serde_json::to_string(&envelope.record).map_err(|source| ProgressStoreError::Decode {
                object_type,
                source,
            })?;
        if compute_checksum(record_json.as_bytes()) != envelope.checksum {
            return Err(ProgressStoreError::Corrupt { object_type });
        }
        Ok(Some(envelope.record))
    }

    fn save(&mut self, progress: &IngestionProgress) -> Result<(), ProgressStoreError> {
        let object_type = progress.object_type;
        let record_json =
            serde_json::to_string(progress).map_err(|source| ProgressStoreError::Decode {
                object_type,
                source,
            })?;
        let envelope = ProgressEnvelope {
            checksum: compute_checksum(record_json.as_bytes()),
            record: progress.clone(),
        };
        let payload =
            serde_json::to_string(&envelope).map_err(|source| ProgressStoreError::Decode {
                object_type,
                source,
            })?;
        fs::write(self.path(object_type), payload).map_err(|source| ProgressStoreError::Io {
            object_type,
            source,
        })
    }

    fn delete(&mut self, object_type: u32) -> Result<(), ProgressStoreError> {
        match fs::remove_file(self.path(object_type)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(ProgressStoreError::Io {
                object_type,
                source,
            }),
        }
    }
}

/// Loads a record, demoting a corrupt one to absent after logging.
pub fn load_or_reset<S: ProgressStore>(
    store: &S,
    object_type: u32,
) -> Result<Option<IngestionProgress>, ProgressStoreError> {
    match store.load(object_type) {
        Err(ProgressStoreError::Corrupt { .. }) => {
            warn!(object_type, "corrupt progress record, treating as absent");
            Ok(None)
        }
        other => other,
    }
}

fn compute_checksum(payload: &[u8]) -> String {
    let digest = Sha256::digest(payload);
    let mut encoded = String::with_capacity(digest.len() * 2);
    for byte in digest {
        encoded.push_str(&format!("{byte:02x}"));
    }
    encoded
}

/// Wall-clock seam so timestamps in progress records are testable.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Production clock reading the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or(0)
    }
}
