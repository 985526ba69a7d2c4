//! Sync engine
//!
//! [`SyncWorker::resynchronize`] brings the index to the remote tip. Each
//! pass compares the local and remote best blocks and picks one path:
//! nothing to do, fork recovery, parallel catch-up or sequential catch-up.
//! Fork recovery and parallel catch-up are followed by a fresh pass so the
//! result is always checked against the current remote tip.

mod disconnect;
mod fork;
mod gate;
mod parallel;
mod sequential;

pub use gate::{GateClosed, OrderingGate};

use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
    chain::ChainClient,
    config::SyncConfig,
    error::{IndexerError, Result},
    metrics::SyncMetrics,
    state::InternalState,
    store::IndexStore,
};

/// Callback invoked with the hash of every block connected by the
/// sequential pipeline
pub type OnNewBlock<'a> = &'a (dyn Fn(&str) + Send + Sync);

/// Result of a successful resync
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResyncOutcome {
    /// The index already matched the remote tip; nothing was changed
    AlreadySynced,
    /// Blocks were connected or disconnected
    Updated,
}

/// Outcome of a single divergence check pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    Synced,
    /// The index changed and must be checked against the current tip again
    Restart,
    Connected,
}

/// Starting point of sequential catch-up, recomputed on every pass
#[derive(Debug, Clone)]
struct SyncState {
    start_height: u32,
    start_hash: String,
}

/// Keeps the index store in sync with the chain client
pub struct SyncWorker {
    chain: Arc<dyn ChainClient>,
    store: Arc<dyn IndexStore>,
    config: SyncConfig,
    shutdown: CancellationToken,
    metrics: SyncMetrics,
    state: Arc<InternalState>,
}

impl SyncWorker {
    /// Create a new sync worker.
    ///
    /// `shutdown` is the external cancellation signal observed by the
    /// parallel pipeline.
    pub fn new(
        chain: Arc<dyn ChainClient>,
        store: Arc<dyn IndexStore>,
        config: SyncConfig,
        shutdown: CancellationToken,
        state: Arc<InternalState>,
    ) -> Self {
        Self {
            chain,
            store,
            config,
            shutdown,
            metrics: SyncMetrics::new(),
            state,
        }
    }

    /// Sync state tracker shared with health reporting
    pub fn state(&self) -> &Arc<InternalState> {
        &self.state
    }

    /// Synchronize the index to the top of the chain.
    ///
    /// `on_new_block` is called for every block connected sequentially, not
    /// for blocks loaded by the parallel pipeline.
    pub async fn resynchronize(&self, on_new_block: Option<OnNewBlock<'_>>) -> Result<ResyncOutcome> {
        let start = Instant::now();
        self.state.started_sync();

        match self.resync_index(on_new_block).await {
            Ok(ResyncOutcome::Updated) => {
                let elapsed = start.elapsed();
                info!(elapsed = ?elapsed, "resync: finished");
                self.metrics.observe_resync_duration(elapsed);
                self.metrics.set_db_size(self.store.database_size_on_disk());
                match self.store.best_block().await {
                    Ok(Some(best)) => self.state.finished_sync(best.height, &best.hash),
                    Ok(None) => self.state.finished_sync(0, ""),
                    Err(e) => error!(error = %e, "resync: cannot read best block"),
                }
                Ok(ResyncOutcome::Updated)
            }
            Ok(ResyncOutcome::AlreadySynced) => {
                self.state.finished_sync_no_change();
                Ok(ResyncOutcome::AlreadySynced)
            }
            Err(e) => {
                self.metrics.inc_resync_error(&e);
                Err(e)
            }
        }
    }

    async fn resync_index(&self, on_new_block: Option<OnNewBlock<'_>>) -> Result<ResyncOutcome> {
        let mut changed = false;
        for _ in 0..self.config.max_resync_passes {
            match self.resync_pass(on_new_block).await? {
                Pass::Synced if changed => return Ok(ResyncOutcome::Updated),
                Pass::Synced => return Ok(ResyncOutcome::AlreadySynced),
                Pass::Restart => changed = true,
                Pass::Connected => return Ok(ResyncOutcome::Updated),
            }
        }

        error!(passes = self.config.max_resync_passes, "resync: did not converge");
        Err(IndexerError::ResyncLimit(self.config.max_resync_passes))
    }

    async fn resync_pass(&self, on_new_block: Option<OnNewBlock<'_>>) -> Result<Pass> {
        let remote_best_hash = self.chain.best_block_hash().await?;
        let local_best = self.store.best_block().await?;

        let start_height = match local_best {
            Some(local) if local.hash == remote_best_hash => {
                info!(height = local.height, hash = %local.hash, "resync: synced");
                return Ok(Pass::Synced);
            }
            Some(local) => {
                // Remote can be at a lower height after its own rollback
                let remote_hash = match self.chain.block_hash(local.height).await {
                    Ok(hash) => Some(hash),
                    Err(e) if e.is_not_found() => None,
                    Err(e) => return Err(e),
                };
                if remote_hash.as_deref() != Some(local.hash.as_str()) {
                    info!(
                        height = local.height,
                        local_hash = %local.hash,
                        remote_hash = remote_hash.as_deref().unwrap_or(""),
                        "resync: local is forked"
                    );
                    self.handle_fork(local.height, &local.hash).await?;
                    return Ok(Pass::Restart);
                }
                info!(height = local.height, "resync: local is behind");
                local.height + 1
            }
            None => {
                let height = self.config.start_height();
                info!(height, "resync: genesis from block");
                height
            }
        };

        let start_hash = self.chain.block_hash(start_height).await?;

        if self.config.workers > 1 {
            let remote_best_height = self.chain.best_block_height().await?;
            if remote_best_height < start_height {
                error!(
                    remote = remote_best_height,
                    start = start_height,
                    "resync: remote best height less than sync start height"
                );
                return Err(IndexerError::RemoteBehind {
                    remote: remote_best_height,
                    start: start_height,
                });
            }
            if remote_best_height - start_height > self.config.chunk {
                info!(
                    lower = start_height,
                    higher = remote_best_height,
                    workers = self.config.workers,
                    "resync: parallel sync of blocks"
                );
                self.connect_blocks_parallel(start_height, remote_best_height).await?;
                return Ok(Pass::Restart);
            }
        }

        self.connect_blocks(
            SyncState {
                start_height,
                start_hash,
            },
            on_new_block,
        )
        .await?;
        Ok(Pass::Connected)
    }
}
