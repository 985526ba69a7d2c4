use tracing::{info, warn};

use super::SyncWorker;
use crate::{error::Result, types::Block};

impl SyncWorker {
    /// Remove all data belonging to blocks in `[lower, higher]`.
    ///
    /// `hashes` lists the indexed hashes from `higher` down to `lower`. Block
    /// data is fetched from the chain client so each block can be
    /// disconnected individually; if any of them is unavailable the whole
    /// range is disconnected by a full index scan instead.
    pub async fn disconnect_blocks(&self, lower: u32, higher: u32, hashes: &[String]) -> Result<()> {
        if higher < lower {
            return Ok(());
        }
        info!(lower, higher, "sync: disconnecting blocks");

        // Block to addresses mapping can only be undone by a range scan
        if self.chain.keeps_block_addresses() {
            return self.store.disconnect_block_range(lower, higher).await;
        }

        if hashes.len() as u64 != (higher - lower) as u64 + 1 {
            warn!(
                lower,
                higher,
                hashes = hashes.len(),
                "sync: hashes do not cover the range, using full range scan"
            );
            return self.store.disconnect_block_range(lower, higher).await;
        }

        let mut blocks: Vec<Block> = Vec::with_capacity(hashes.len());
        for (height, hash) in (lower..=higher).rev().zip(hashes) {
            match self.chain.block(hash, height).await {
                Ok(block) => blocks.push(block),
                Err(e) => {
                    warn!(height, hash = %hash, error = %e, "sync: cannot get block, using full range scan");
                    return self.store.disconnect_block_range(lower, higher).await;
                }
            }
        }

        for block in &blocks {
            info!(height = block.height, hash = %block.hash, "disconnecting block");
            self.store.disconnect_block(block).await?;
        }
        Ok(())
    }
}
