//! Read contract of the remote chain daemon

use async_trait::async_trait;

use crate::{types::Block, Result};

/// Queries answered by the remote full-node daemon.
///
/// Lookups of absent blocks must fail with [`IndexerError::BlockNotFound`]
/// so the sync engine can tell the chain tip (or a remote rollback) apart
/// from a transport failure.
///
/// [`IndexerError::BlockNotFound`]: crate::IndexerError::BlockNotFound
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Hash of the remote best block
    async fn best_block_hash(&self) -> Result<String>;

    /// Height of the remote best block
    async fn best_block_height(&self) -> Result<u32>;

    /// Hash of the canonical block at `height`
    async fn block_hash(&self, height: u32) -> Result<String>;

    /// Full block. The lookup goes by `hash` when it is not empty and by
    /// `height` otherwise.
    async fn block(&self, hash: &str, height: u32) -> Result<Block>;

    /// Whether the chain variant keeps a block to addresses mapping in the
    /// index, which makes per-block disconnect impossible.
    fn keeps_block_addresses(&self) -> bool;
}
