//! Parallel fetch with strictly ordered commit
//!
//! The dispatch loop resolves heights to hashes and feeds a bounded job
//! channel. Fetch workers pull jobs, download blocks in any order and pass
//! them through the [`OrderingGate`] to a single committer task.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{gate::GateClosed, OrderingGate, SyncWorker};
use crate::{
    chain::ChainClient,
    error::{IndexerError, Result},
    metrics::SyncMetrics,
    store::IndexStore,
    types::{Block, HashHeight},
};

impl SyncWorker {
    /// Fetch and commit all blocks in `[lower, higher]` using the configured
    /// number of workers.
    ///
    /// Blocks reach the index store in strictly increasing height order.
    /// Commit failures are logged and do not stop the pipeline; the next
    /// resync notices the index is behind. External cancellation stops the
    /// dispatch and returns [`IndexerError::Interrupted`]; blocks committed
    /// up to that point are kept.
    pub async fn connect_blocks_parallel(&self, lower: u32, higher: u32) -> Result<()> {
        if higher < lower {
            return Ok(());
        }

        let workers = self.config.workers.max(1);
        let (job_tx, job_rx) = mpsc::channel::<HashHeight>(workers);
        let job_rx = Arc::new(Mutex::new(job_rx));
        let (block_tx, block_rx) = mpsc::channel::<Block>(workers);
        let gate = Arc::new(OrderingGate::new(lower));
        let halt = self.shutdown.child_token();

        let committer = tokio::spawn(write_blocks(Arc::clone(&self.store), lower, block_rx));

        let handles: Vec<_> = (0..workers)
            .map(|id| {
                let worker = FetchWorker {
                    id,
                    chain: Arc::clone(&self.chain),
                    jobs: Arc::clone(&job_rx),
                    blocks: block_tx.clone(),
                    gate: Arc::clone(&gate),
                    halt: halt.clone(),
                    retry_delay: self.config.retry_delay(),
                    dry_run: self.config.dry_run,
                    metrics: self.metrics,
                };
                tokio::spawn(worker.run())
            })
            .collect();
        // Workers hold the only job receivers and block senders: dispatch
        // fails once they all exit, the committer stops once they exit
        drop(job_rx);
        drop(block_tx);

        let result = self.dispatch(lower, higher, &job_tx).await;
        drop(job_tx);

        if let Err(e) = &result {
            warn!(error = %e, "parallel sync stopping workers");
            halt.cancel();
            gate.close();
        }

        for joined in join_all(handles).await {
            if let Err(e) = joined {
                error!(error = %e, "fetch worker panicked");
            }
        }
        match committer.await {
            Ok(committed) => info!(lower, higher, committed, "parallel sync finished"),
            Err(e) => error!(error = %e, "block writer panicked"),
        }

        match result {
            // Cancelled after the last job was dispatched
            Ok(()) if halt.is_cancelled() && !self.config.dry_run && gate.next() <= higher as u64 => {
                Err(IndexerError::Interrupted {
                    height: gate.next() as u32,
                })
            }
            other => other,
        }
    }

    async fn dispatch(&self, lower: u32, higher: u32, jobs: &mpsc::Sender<HashHeight>) -> Result<()> {
        let mut height = lower;
        loop {
            if self.shutdown.is_cancelled() {
                info!(height, "parallel sync interrupted");
                return Err(IndexerError::Interrupted { height });
            }

            let resolved = tokio::select! {
                resolved = self.chain.block_hash(height) => resolved,
                _ = self.shutdown.cancelled() => continue,
            };
            let hash = match resolved {
                Ok(hash) => hash,
                Err(e) => {
                    error!(height, error = %e, "get block hash failed, retrying");
                    self.metrics.inc_resync_error(&e);
                    tokio::select! {
                        _ = tokio::time::sleep(self.config.retry_delay()) => {}
                        _ = self.shutdown.cancelled() => {}
                    }
                    continue;
                }
            };

            if height > 0 && height % self.config.progress_interval.max(1) == 0 {
                info!(height, hash = %hash, "connecting block");
            }

            tokio::select! {
                sent = jobs.send(HashHeight { hash, height }) => {
                    if sent.is_err() {
                        return Err(IndexerError::internal("fetch workers exited"));
                    }
                }
                _ = self.shutdown.cancelled() => continue,
            }

            if height == higher {
                return Ok(());
            }
            height += 1;
        }
    }
}

struct FetchWorker {
    id: usize,
    chain: Arc<dyn ChainClient>,
    jobs: Arc<Mutex<mpsc::Receiver<HashHeight>>>,
    blocks: mpsc::Sender<Block>,
    gate: Arc<OrderingGate>,
    halt: CancellationToken,
    retry_delay: Duration,
    dry_run: bool,
    metrics: SyncMetrics,
}

impl FetchWorker {
    async fn run(self) {
        loop {
            let job = self.jobs.lock().await.recv().await;
            let Some(job) = job else { break };

            let Some(block) = self.fetch(&job).await else {
                debug!(worker = self.id, height = job.height, "fetch worker cancelled");
                return;
            };
            if self.dry_run {
                continue;
            }

            let turn = tokio::select! {
                turn = self.gate.await_turn(job.height) => turn,
                _ = self.halt.cancelled() => Err(GateClosed),
            };
            if turn.is_err() {
                debug!(worker = self.id, height = job.height, "fetch worker released from gate");
                return;
            }
            if self.blocks.send(block).await.is_err() {
                error!(worker = self.id, height = job.height, "block writer is gone");
                self.gate.close();
                return;
            }
            self.gate.advance(job.height);
        }
        debug!(worker = self.id, "fetch worker exiting");
    }

    /// Retry with a fixed delay until the block arrives or the pipeline halts
    async fn fetch(&self, job: &HashHeight) -> Option<Block> {
        loop {
            if self.halt.is_cancelled() {
                return None;
            }
            let fetched = tokio::select! {
                fetched = self.chain.block(&job.hash, job.height) => fetched,
                _ = self.halt.cancelled() => return None,
            };
            match fetched {
                Ok(block) => return Some(block),
                Err(e) => {
                    error!(worker = self.id, height = job.height, error = %e, "get block failed, retrying");
                    self.metrics.inc_resync_error(&e);
                    tokio::select! {
                        _ = tokio::time::sleep(self.retry_delay) => {}
                        _ = self.halt.cancelled() => return None,
                    }
                }
            }
        }
    }
}

/// Commit blocks in the order they arrive. Returns the number committed.
async fn write_blocks(store: Arc<dyn IndexStore>, lower: u32, mut blocks: mpsc::Receiver<Block>) -> u64 {
    let mut expected = lower as u64;
    let mut committed = 0;
    while let Some(block) = blocks.recv().await {
        if block.height as u64 != expected {
            warn!(expected, height = block.height, "block writer skipped block");
        }
        match store.connect_block(&block).await {
            Ok(()) => committed += 1,
            Err(e) => error!(height = block.height, hash = %block.hash, error = %e, "connect block failed"),
        }
        expected = block.height as u64 + 1;
    }
    debug!(committed, "block writer exiting");
    committed
}
