use crate::bus::{InMemoryBus, SharedBus};
use crate::config::{load_config, Config};
use crate::control::ControlService;
use crate::model::ObjectRole;
use crate::producer::{BackfillControl, IngestTick, ObjectProducer};
use crate::progress::{JsonFileProgressStore, SystemClock};
use crate::runtime::{IngestScheduler, PipelineRuntime};
use crate::source::HttpObjectSource;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::info;

const CONFIG_ENV: &str = "ROADREF_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "roadref.toml";

/// Application entrypoint: load configuration, wire the subsystems, and run
/// until asked to stop.
pub fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config_path =
        std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = if Path::new(&config_path).exists() {
        load_config(&config_path).with_context(|| format!("loading {config_path}"))?
    } else {
        info!(path = %config_path, "no config file, using defaults");
        Config::default()
    };

    let running = Arc::new(AtomicBool::new(true));
    serve(config, running)
}

/// Builds and runs the full service until the running flag clears.
pub fn serve(config: Config, running: Arc<AtomicBool>) -> Result<()> {
    let source = HttpObjectSource::new(
        config.source_endpoint.clone(),
        Duration::from_millis(config.request_timeout_ms),
    )?;
    let bus: SharedBus = Arc::new(Mutex::new(InMemoryBus::new()));
    let runtime = PipelineRuntime::start(config.runtime());

    let mut controls: BTreeMap<u32, Arc<Mutex<dyn BackfillControl>>> = BTreeMap::new();
    let mut drivers: Vec<(u32, Arc<Mutex<dyn IngestTick>>)> = Vec::new();
    for role in ObjectRole::all() {
        let store = JsonFileProgressStore::new(&config.data_dir)?;
        let producer = Arc::new(Mutex::new(ObjectProducer::new(
            role,
            source.clone(),
            bus.clone(),
            store,
            SystemClock,
            config.producer(),
            running.clone(),
        )));
        controls.insert(role.object_type(), producer.clone());
        drivers.push((role.object_type(), producer));
    }

    let control = ControlService::new(controls, runtime.index_handle());
    for role in ObjectRole::all() {
        let object_type = role.object_type();
        if let Ok(status) = control.status(object_type) {
            if status.mode == crate::control::StatusMode::NotInitialized {
                match control.start(object_type) {
                    Ok(response) => info!(object_type, message = %response.message, "bootstrap"),
                    Err(err) => info!(object_type, error = %err.message, "bootstrap start failed"),
                }
            }
        }
    }

    let scheduler = IngestScheduler::start(
        drivers,
        Duration::from_millis(config.tick_interval_ms),
        Duration::from_millis(config.shutdown_wait_ms),
        running.clone(),
    );

    info!("roadref service running");
    while running.load(Ordering::SeqCst) {
        pump(&bus, &runtime);
        std::thread::sleep(Duration::from_millis(100));
    }

    info!("shutdown requested, draining");
    scheduler.shutdown();
    pump(&bus, &runtime);
    runtime.shutdown();
    Ok(())
}

/// Moves acknowledged bus records into the pipeline runtime.
fn pump(bus: &SharedBus, runtime: &PipelineRuntime) {
    let records = match bus.lock() {
        Ok(mut bus) => bus.drain_delivered(),
        Err(_) => return,
    };
    for record in records {
        if runtime.submit_published(&record).is_err() {
            return;
        }
    }
}
