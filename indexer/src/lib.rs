//! # Qenus Indexer
//!
//! Synchronization engine of the block index. Keeps a local indexed
//! database consistent with the canonical chain served by a remote daemon:
//! detects divergence, fetches and commits missing blocks (in parallel for
//! large gaps, sequentially otherwise), and unwinds forked blocks.

pub mod chain;
pub mod config;
pub mod error;
pub mod metrics;
pub mod state;
pub mod store;
pub mod sync;
pub mod types;

// Re-export commonly used types
pub use chain::ChainClient;
pub use crate::config::{IndexerConfig, SyncConfig};
pub use error::{IndexerError, Result};
pub use state::{InternalState, SyncSnapshot};
pub use store::IndexStore;
pub use sync::{OnNewBlock, ResyncOutcome, SyncWorker};
pub use types::*;

/// Current version of the indexer
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
