use tracing::{debug, info};

use super::SyncWorker;
use crate::error::Result;

impl SyncWorker {
    /// Find the blocks above the fork point and disconnect them.
    ///
    /// Walks down from the local best block until the local and remote hashes
    /// agree, the index has no record, or height 0 is reached.
    pub(super) async fn handle_fork(&self, local_best_height: u32, local_best_hash: &str) -> Result<()> {
        let mut hashes = vec![local_best_hash.to_string()];
        let mut lower = local_best_height;

        while lower > 0 {
            let height = lower - 1;
            let local = match self.store.block_hash(height).await? {
                Some(hash) => hash,
                None => break,
            };
            // Remote can be at a lower height after its own rollback
            let remote = match self.chain.block_hash(height).await {
                Ok(hash) => Some(hash),
                Err(e) if e.is_not_found() => None,
                Err(e) => return Err(e),
            };
            if remote.as_deref() == Some(local.as_str()) {
                debug!(height, hash = %local, "fork point found");
                break;
            }
            hashes.push(local);
            lower = height;
        }

        info!(lower, higher = local_best_height, "resync: disconnecting forked blocks");
        self.disconnect_blocks(lower, local_best_height, &hashes).await
    }
}
