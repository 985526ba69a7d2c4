//! Configuration for the indexer

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration for the indexer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// Sync configuration
    pub sync: SyncConfig,
}

/// Sync engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Number of parallel fetch workers; 1 disables parallel sync
    pub workers: usize,

    /// Minimum gap (in blocks) that switches to parallel sync
    pub chunk: u32,

    /// Height to start indexing from when the index is empty.
    /// Negative values are treated as 0.
    pub min_start_height: i64,

    /// Fetch blocks without committing them to the index
    pub dry_run: bool,

    /// Fixed delay between retries of failed RPC calls in milliseconds
    pub retry_delay_ms: u64,

    /// Upper bound on divergence check passes within one resync
    pub max_resync_passes: usize,

    /// Capacity of the fetch/commit channel in sequential sync
    pub sequential_buffer: usize,

    /// Log progress every this many blocks
    pub progress_interval: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            workers: 8,
            chunk: 100,
            min_start_height: 0,
            dry_run: false,
            retry_delay_ms: 500,
            max_resync_passes: 64,
            sequential_buffer: 8,
            progress_interval: 1000,
        }
    }
}

impl SyncConfig {
    /// Start height for an empty index
    pub fn start_height(&self) -> u32 {
        self.min_start_height.clamp(0, u32::MAX as i64) as u32
    }

    /// Delay between retries
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl IndexerConfig {
    /// Load configuration from files and environment
    pub fn load() -> std::result::Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name("config/indexer").required(false))
            .add_source(File::with_name(&format!(
                "config/indexer-{}",
                std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into())
            )).required(false))
            // Local overrides (gitignored)
            .add_source(File::with_name("config/indexer-local").required(false))
            .add_source(Environment::with_prefix("QENUS_INDEXER").separator("__"))
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a single file
    pub fn from_file<P: AsRef<Path>>(path: P) -> std::result::Result<Self, ConfigError> {
        let config: Self = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.sync.workers == 0 {
            return Err(ConfigError::Message(
                "sync.workers must be greater than 0".into()
            ));
        }

        if self.sync.sequential_buffer == 0 {
            return Err(ConfigError::Message(
                "sync.sequential_buffer must be greater than 0".into()
            ));
        }

        if self.sync.progress_interval == 0 {
            return Err(ConfigError::Message(
                "sync.progress_interval must be greater than 0".into()
            ));
        }

        if self.sync.max_resync_passes == 0 {
            return Err(ConfigError::Message(
                "sync.max_resync_passes must be greater than 0".into()
            ));
        }

        Ok(())
    }
}
