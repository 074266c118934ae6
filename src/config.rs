use crate::producer::ProducerConfig;
use crate::runtime::RuntimeConfig;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Service configuration, loadable from a TOML file; every field defaults.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Base endpoint of the object source API.
    pub source_endpoint: String,
    /// Directory for persisted ingestion progress records.
    pub data_dir: PathBuf,
    /// Source request timeout in milliseconds.
    pub request_timeout_ms: u64,
    /// Interval between scheduled ingestion ticks in milliseconds.
    pub tick_interval_ms: u64,
    pub backfill_page_size: usize,
    pub updates_batch_size: usize,
    pub workers: usize,
    pub channel_capacity: usize,
    /// Maximum wait for in-flight work during shutdown.
    pub shutdown_wait_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_endpoint: "https://roadnet.example/api/v1".to_string(),
            data_dir: PathBuf::from("data"),
            request_timeout_ms: 30_000,
            tick_interval_ms: 5_000,
            backfill_page_size: 1_000,
            updates_batch_size: 500,
            workers: 4,
            channel_capacity: 1_024,
            shutdown_wait_ms: 30_000,
        }
    }
}

impl Config {
    pub fn producer(&self) -> ProducerConfig {
        ProducerConfig {
            backfill_page_size: self.backfill_page_size,
            updates_batch_size: self.updates_batch_size,
        }
    }

    pub fn runtime(&self) -> RuntimeConfig {
        RuntimeConfig {
            workers: self.workers,
            channel_capacity: self.channel_capacity,
            shutdown_wait_ms: self.shutdown_wait_ms,
        }
    }
}

/// Failure loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Loads configuration from a TOML file.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path_ref = path.as_ref();
    let payload = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
        path: path_ref.to_path_buf(),
        source,
    })?;
    toml::from_str(&payload).map_err(|source| ConfigError::Parse {
        path: path_ref.to_path_buf(),
        source,
    })
}
