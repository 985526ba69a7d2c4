//! Metrics emitted by the sync engine
//!
//! Thin facade over the `metrics` macros. Without an installed recorder all
//! calls are no-ops.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use std::time::Duration;

use crate::error::IndexerError;

pub const RESYNC_DURATION: &str = "indexer_resync_duration_ms";
pub const DB_SIZE: &str = "indexer_db_size_bytes";
pub const RESYNC_ERRORS: &str = "indexer_resync_errors_total";

/// Handle used by the orchestrator and the fetch workers
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncMetrics;

impl SyncMetrics {
    /// Register metric descriptions with the installed recorder
    pub fn new() -> Self {
        describe_histogram!(RESYNC_DURATION, Unit::Milliseconds, "Duration of successful resync passes");
        describe_gauge!(DB_SIZE, Unit::Bytes, "Size of the index database on disk");
        describe_counter!(RESYNC_ERRORS, "Resync and fetch errors by message and category");
        Self
    }

    pub fn observe_resync_duration(&self, elapsed: Duration) {
        histogram!(RESYNC_DURATION, elapsed.as_secs_f64() * 1000.0);
    }

    pub fn set_db_size(&self, bytes: u64) {
        gauge!(DB_SIZE, bytes as f64);
    }

    /// Safe to call concurrently from every worker
    pub fn inc_resync_error(&self, error: &IndexerError) {
        counter!(
            RESYNC_ERRORS,
            1,
            "error" => error.to_string(),
            "category" => error.category()
        );
    }
}
