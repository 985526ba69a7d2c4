use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

use super::{OnNewBlock, SyncState, SyncWorker};
use crate::{
    chain::ChainClient,
    error::{IndexerError, Result},
    types::Block,
};

impl SyncWorker {
    /// Connect blocks one by one from the start of `state` up to the chain tip.
    ///
    /// A producer task walks the chain by following each block's `next`
    /// hash; blocks are committed here in the order they arrive.
    pub(super) async fn connect_blocks(&self, state: SyncState, on_new_block: Option<OnNewBlock<'_>>) -> Result<()> {
        let (tx, mut rx) = mpsc::channel(self.config.sequential_buffer.max(1));
        let producer = tokio::spawn(fetch_chain(
            Arc::clone(&self.chain),
            state.start_hash,
            state.start_height,
            tx,
        ));

        let result = async {
            let mut last: Option<(u32, String)> = None;
            while let Some(fetched) = rx.recv().await {
                let block = fetched?;
                self.store.connect_block(&block).await?;
                if let Some(callback) = on_new_block {
                    callback(&block.hash);
                }
                if block.height > 0 && block.height % self.config.progress_interval.max(1) == 0 {
                    info!(height = block.height, hash = %block.hash, "connected block");
                }
                last = Some((block.height, block.hash));
            }
            if let Some((height, hash)) = last {
                info!(height, hash = %hash, "resync: synced");
            }
            Ok::<_, IndexerError>(())
        }
        .await;

        // No-op when the producer already reached the tip
        producer.abort();
        result
    }
}

/// Fetch blocks starting at `hash`/`height` until the chain client reports
/// the end of the chain. Some daemons do not return the next hash, so the
/// walk continues by height until "not found".
async fn fetch_chain(
    chain: Arc<dyn ChainClient>,
    mut hash: String,
    mut height: u32,
    out: mpsc::Sender<Result<Block>>,
) {
    loop {
        let block = match chain.block(&hash, height).await {
            Ok(block) => block,
            Err(e) if e.is_not_found() => return,
            Err(e) => {
                let _ = out.send(Err(e)).await;
                return;
            }
        };
        hash = block.next.clone();
        let next_height = block.height.checked_add(1);
        if out.send(Ok(block)).await.is_err() {
            return;
        }
        match next_height {
            Some(next) => height = next,
            None => return,
        }
    }
}
