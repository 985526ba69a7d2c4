//! Contract of the local index database

use async_trait::async_trait;

use crate::{
    types::{BestBlock, Block},
    Result,
};

/// Persistent block index. Every connect/disconnect is transactional per
/// block; the sync engine never calls the mutating methods concurrently.
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Best indexed block, `None` when the index is empty
    async fn best_block(&self) -> Result<Option<BestBlock>>;

    /// Hash of the indexed block at `height`, `None` when there is no record
    async fn block_hash(&self, height: u32) -> Result<Option<String>>;

    /// Apply a block to the index
    async fn connect_block(&self, block: &Block) -> Result<()>;

    /// Unapply a single block from the index
    async fn disconnect_block(&self, block: &Block) -> Result<()>;

    /// Unapply all blocks in `[lower, higher]` by scanning the index
    async fn disconnect_block_range(&self, lower: u32, higher: u32) -> Result<()>;

    /// Size of the database on disk in bytes
    fn database_size_on_disk(&self) -> u64;
}
