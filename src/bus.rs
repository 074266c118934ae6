use crate::model::{ObjectDelta, ObjectRole};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Failure surfaced by the bus collaborator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    #[error("publish rejected: {0}")]
    Publish(String),
    #[error("acknowledgement failed: {0}")]
    Ack(String),
}

/// Delta record published on a per-role topic, keyed by object id.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedDelta {
    pub role: ObjectRole,
    pub object_id: u64,
    pub delta: ObjectDelta,
}

/// Collaborator interface to the ordered, at-least-once message bus.
///
/// `publish` may buffer; `flush` blocks until every publish issued so far is
/// durably accepted. Checkpoints are only advanced after a successful flush,
/// which is the whole at-least-once discipline.
pub trait DeltaBus {
    fn publish(
        &mut self,
        role: ObjectRole,
        object_id: u64,
        delta: &ObjectDelta,
    ) -> Result<(), BusError>;

    fn flush(&mut self) -> Result<(), BusError>;
}

/// In-memory bus used by tests and the single-process runtime.
///
/// Records become visible to [`InMemoryBus::drain_delivered`] only after a
/// successful flush, mirroring the acknowledged/unacknowledged split of a
/// real bus. Failures are injectable per call for exercising the abort
/// paths.
#[derive(Debug, Default)]
pub struct InMemoryBus {
    pending: Vec<PublishedDelta>,
    delivered: Vec<PublishedDelta>,
    publish_failures: usize,
    flush_failures: usize,
    published_total: usize,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` publishes fail.
    pub fn fail_next_publishes(&mut self, count: usize) {
        self.publish_failures = count;
    }

    /// Makes the next `count` flushes fail.
    pub fn fail_next_flushes(&mut self, count: usize) {
        self.flush_failures = count;
    }

    /// Takes everything acknowledged so far, in publish order.
    pub fn drain_delivered(&mut self) -> Vec<PublishedDelta> {
        std::mem::take(&mut self.delivered)
    }

    /// Acknowledged records still waiting to be drained.
    pub fn delivered(&self) -> &[PublishedDelta] {
        &self.delivered
    }

    /// Published but not yet acknowledged records.
    pub fn pending(&self) -> &[PublishedDelta] {
        &self.pending
    }

    /// Total publishes accepted over the bus lifetime.
    pub fn published_total(&self) -> usize {
        self.published_total
    }
}

/// Shared handle so several producers can publish to one in-memory bus
/// while the runtime pump drains it.
pub type SharedBus = Arc<Mutex<InMemoryBus>>;

impl DeltaBus for SharedBus {
    fn publish(
        &mut self,
        role: ObjectRole,
        object_id: u64,
        delta: &ObjectDelta,
    ) -> Result<(), BusError> {
        self.lock()
            .map_err(|_| BusError::Publish("bus state poisoned".to_string()))?
            .publish(role, object_id, delta)
    }

    fn flush(&mut self) -> Result<(), BusError> {
        self.lock()
            .map_err(|_| BusError::Ack("bus state poisoned".to_string()))?
            .flush()
    }
}

impl DeltaBus for InMemoryBus {
    fn publish(
        &mut self,
        role: ObjectRole,
        object_id: u64,
        delta: &ObjectDelta,
    ) -> Result<(), BusError> {
        if self.publish_failures > 0 {
            self.publish_failures -= 1;
            return Err(BusError::Publish("injected publish failure".to_string()));
        }
        self.pending.push(PublishedDelta {
            role,
            object_id,
            delta: delta.clone(),
        });
        self.published_total += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), BusError> {
        if self.flush_failures > 0 {
            self.flush_failures -= 1;
            return Err(BusError::Ack("injected flush failure".to_string()));
        }
        self.delivered.append(&mut self.pending);
        Ok(())
    }
}
