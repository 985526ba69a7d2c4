//! Sync lifecycle tracking for health reporting

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::debug;

/// Point-in-time view of the sync lifecycle
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncSnapshot {
    /// A resync pass is in progress
    pub sync_mode: bool,

    /// The last resync pass reached the remote tip
    pub is_synchronized: bool,

    /// Best indexed height after the last successful pass
    pub best_height: u32,

    /// Best indexed hash after the last successful pass
    pub best_hash: String,

    /// Completion time of the last successful pass
    pub last_sync: Option<DateTime<Utc>>,

    /// Number of completed passes
    pub sync_count: u64,
}

/// Internal state shared between the sync engine and health endpoints
#[derive(Debug, Default)]
pub struct InternalState {
    inner: RwLock<SyncSnapshot>,
}

impl InternalState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the start of a resync pass
    pub fn started_sync(&self) {
        let mut state = self.inner.write();
        state.sync_mode = true;
        debug!("sync started");
    }

    /// Mark a pass that changed the index
    pub fn finished_sync(&self, best_height: u32, best_hash: &str) {
        let mut state = self.inner.write();
        state.sync_mode = false;
        state.is_synchronized = true;
        state.best_height = best_height;
        state.best_hash = best_hash.to_string();
        state.last_sync = Some(Utc::now());
        state.sync_count += 1;
    }

    /// Mark a pass that found the index already at the remote tip
    pub fn finished_sync_no_change(&self) {
        let mut state = self.inner.write();
        state.sync_mode = false;
        state.is_synchronized = true;
        state.last_sync = Some(Utc::now());
        state.sync_count += 1;
    }

    /// Current snapshot
    pub fn snapshot(&self) -> SyncSnapshot {
        self.inner.read().clone()
    }

    /// Snapshot rendered as JSON for health endpoints
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.snapshot())
    }
}
