use crate::bus::PublishedDelta;
use crate::change_detector::ReferenceDelta;
use crate::extent_table::{diff_extents, ExtentDelta};
use crate::model::{ObjectDelta, ObjectRole};
use crate::pipeline::{PipelineReport, SegmentPartition};
use crate::producer::{IngestTick, TickOutcome};
use crate::reference_index::ReferenceIndex;
use crossbeam_channel::{bounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Deterministic FNV-1a hash selecting the partition for a segment.
pub fn hash_segment_id(segment_id: u64) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;
    segment_id
        .to_be_bytes()
        .iter()
        .fold(OFFSET_BASIS, |hash, byte| {
            (hash ^ u64::from(*byte)).wrapping_mul(PRIME)
        })
}

/// Tunables for the partitioned runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub workers: usize,
    pub channel_capacity: usize,
    pub shutdown_wait_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            channel_capacity: 1_024,
            shutdown_wait_ms: 30_000,
        }
    }
}

/// Failure submitting work into the runtime.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("pipeline runtime is shut down")]
    ShutDown,
}

/// Extent-event batch routed to one segment partition.
struct RoutedBatch {
    role: ObjectRole,
    deltas: Vec<ExtentDelta>,
}

/// Partitioned dataflow runtime.
///
/// Extent events are routed by segment hash to worker threads, each the sole
/// owner of its partition's extent tables and change-detector state; the
/// emitted reference deltas converge on one aggregator thread, the sole
/// writer of the shared index. Per-segment and per-key event ordering is
/// preserved without any cross-key locking.
pub struct PipelineRuntime {
    senders: Vec<Sender<RoutedBatch>>,
    index: Arc<RwLock<ReferenceIndex>>,
    workers: Vec<JoinHandle<PipelineReport>>,
    aggregator: Option<JoinHandle<usize>>,
    shutdown_wait: Duration,
}

impl PipelineRuntime {
    /// Spawns the worker and aggregator threads.
    pub fn start(config: RuntimeConfig) -> Self {
        let worker_count = config.workers.max(1);
        let index = Arc::new(RwLock::new(ReferenceIndex::new()));
        let (aggregate_tx, aggregate_rx) = bounded::<Vec<ReferenceDelta>>(config.channel_capacity);

        let aggregator_index = index.clone();
        let aggregator = thread::Builder::new()
            .name("roadref-aggregator".to_string())
            .spawn(move || run_aggregator(aggregate_rx, aggregator_index))
            .ok();

        let mut senders = Vec::with_capacity(worker_count);
        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let (tx, rx) = bounded::<RoutedBatch>(config.channel_capacity);
            senders.push(tx);
            let aggregate_tx = aggregate_tx.clone();
            if let Ok(handle) = thread::Builder::new()
                .name(format!("roadref-worker-{worker_id}"))
                .spawn(move || run_worker(worker_id, rx, aggregate_tx))
            {
                workers.push(handle);
            }
        }
        drop(aggregate_tx);

        Self {
            senders,
            index,
            workers,
            aggregator,
            shutdown_wait: Duration::from_millis(config.shutdown_wait_ms),
        }
    }

    /// Shared handle queries read through; the aggregator is its only
    /// writer.
    pub fn index_handle(&self) -> Arc<RwLock<ReferenceIndex>> {
        self.index.clone()
    }

    /// Diffs one object delta and routes its extent events by segment hash.
    pub fn submit(&self, role: ObjectRole, delta: &ObjectDelta) -> Result<(), RuntimeError> {
        if self.senders.is_empty() {
            return Err(RuntimeError::ShutDown);
        }
        let mut routed: HashMap<usize, Vec<ExtentDelta>> = HashMap::new();
        for extent_delta in diff_extents(delta) {
            let partition =
                (hash_segment_id(extent_delta.segment_id()) % self.senders.len() as u64) as usize;
            routed.entry(partition).or_default().push(extent_delta);
        }
        for (partition, deltas) in routed {
            self.senders[partition]
                .send(RoutedBatch { role, deltas })
                .map_err(|_| RuntimeError::ShutDown)?;
        }
        Ok(())
    }

    /// Feeds one acknowledged bus record into the dataflow.
    pub fn submit_published(&self, record: &PublishedDelta) -> Result<(), RuntimeError> {
        self.submit(record.role, &record.delta)
    }

    /// Stops accepting work, drains in-flight batches within the bounded
    /// wait, and returns the merged worker reports.
    pub fn shutdown(mut self) -> ShutdownReport {
        self.senders.clear();
        let deadline = Instant::now() + self.shutdown_wait;
        let mut report = ShutdownReport::default();

        for handle in self.workers.drain(..) {
            match join_until(handle, deadline) {
                Some(worker_report) => {
                    report.extent_deltas += worker_report.extent_deltas;
                    report.segments_recomputed += worker_report.segments_recomputed;
                    report.reference_adds += worker_report.reference_adds;
                    report.reference_removes += worker_report.reference_removes;
                }
                None => report.interrupted_workers += 1,
            }
        }
        if let Some(handle) = self.aggregator.take() {
            match join_until(handle, deadline) {
                Some(applied) => report.reference_deltas_applied = applied,
                None => report.interrupted_workers += 1,
            }
        }
        if report.interrupted_workers > 0 {
            warn!(
                interrupted = report.interrupted_workers,
                "shutdown wait elapsed with workers still draining; \
                 remaining work resumes from the last persisted checkpoint"
            );
        } else {
            info!(
                applied = report.reference_deltas_applied,
                "pipeline runtime drained cleanly"
            );
        }
        report
    }
}

/// Totals reported by a drained runtime.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    pub extent_deltas: usize,
    pub segments_recomputed: usize,
    pub reference_adds: usize,
    pub reference_removes: usize,
    pub reference_deltas_applied: usize,
    pub interrupted_workers: usize,
}

fn run_worker(
    worker_id: usize,
    rx: Receiver<RoutedBatch>,
    aggregate_tx: Sender<Vec<ReferenceDelta>>,
) -> PipelineReport {
    let mut partition = SegmentPartition::new();
    let mut report = PipelineReport::default();
    // The loop ends when every submit handle is dropped and the queue is
    // drained, which is exactly the shutdown drain contract.
    while let Ok(batch) = rx.recv() {
        let emitted = partition.apply_extent_deltas(batch.role, &batch.deltas, &mut report);
        if !emitted.is_empty() && aggregate_tx.send(emitted).is_err() {
            warn!(worker_id, "aggregator gone, dropping remaining work");
            break;
        }
    }
    debug!(worker_id, ?report, "worker drained");
    report
}

fn run_aggregator(rx: Receiver<Vec<ReferenceDelta>>, index: Arc<RwLock<ReferenceIndex>>) -> usize {
    let mut applied = 0;
    while let Ok(batch) = rx.recv() {
        match index.write() {
            Ok(mut index) => {
                for delta in &batch {
                    index.apply(delta);
                    applied += 1;
                }
            }
            Err(_) => {
                warn!("reference index lock poisoned, aggregator stopping");
                break;
            }
        }
    }
    applied
}

/// Joins a thread, polling until the shared deadline; `None` if it is still
/// running when the deadline passes.
fn join_until<T>(handle: JoinHandle<T>, deadline: Instant) -> Option<T> {
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            return None;
        }
        thread::sleep(Duration::from_millis(20));
    }
    handle.join().ok()
}

/// Runs the scheduled ingestion ticks, one thread per object type.
///
/// A non-reentrant busy guard (the producer's own mutex) makes a tick that
/// outlives the interval get skipped rather than stacked.
pub struct IngestScheduler {
    running: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
    shutdown_wait: Duration,
}

impl IngestScheduler {
    pub fn start(
        drivers: Vec<(u32, Arc<Mutex<dyn IngestTick>>)>,
        tick_interval: Duration,
        shutdown_wait: Duration,
        running: Arc<AtomicBool>,
    ) -> Self {
        let mut handles = Vec::with_capacity(drivers.len());
        for (object_type, driver) in drivers {
            let running = running.clone();
            if let Ok(handle) = thread::Builder::new()
                .name(format!("roadref-ingest-{object_type}"))
                .spawn(move || run_tick_loop(object_type, driver, tick_interval, running))
            {
                handles.push(handle);
            }
        }
        Self {
            running,
            handles,
            shutdown_wait,
        }
    }

    /// Requests a cooperative stop and waits (bounded) for in-flight ticks.
    pub fn shutdown(mut self) {
        self.running.store(false, Ordering::SeqCst);
        let deadline = Instant::now() + self.shutdown_wait;
        for handle in self.handles.drain(..) {
            if join_until(handle, deadline).is_none() {
                warn!("ingest scheduler thread still busy past shutdown wait");
            }
        }
    }
}

fn run_tick_loop(
    object_type: u32,
    driver: Arc<Mutex<dyn IngestTick>>,
    tick_interval: Duration,
    running: Arc<AtomicBool>,
) {
    while running.load(Ordering::SeqCst) {
        match driver.try_lock() {
            Ok(mut guard) => {
                let outcome = guard.tick();
                if let TickOutcome::Failed { error } = &outcome {
                    warn!(object_type, %error, "ingestion tick failed, retrying next tick");
                }
            }
            Err(std::sync::TryLockError::WouldBlock) => {
                debug!(object_type, "previous tick still in progress, skipping");
            }
            Err(std::sync::TryLockError::Poisoned(_)) => {
                warn!(object_type, "producer state poisoned, scheduler stopping");
                return;
            }
        }
        sleep_responsive(tick_interval, &running);
    }
}

/// Sleeps in slices so a shutdown request interrupts the wait promptly.
fn sleep_responsive(total: Duration, running: &AtomicBool) {
    let slice = Duration::from_millis(50);
    let deadline = Instant::now() + total;
    while running.load(Ordering::SeqCst) && Instant::now() < deadline {
        thread::sleep(slice.min(deadline.saturating_duration_since(Instant::now())));
    }
}
