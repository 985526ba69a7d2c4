//! Error types for the indexer

use thiserror::Error;

/// Result type alias for indexer operations
pub type Result<T> = std::result::Result<T, IndexerError>;

/// Error types surfaced by the chain client, the index store and the sync engine
#[derive(Error, Debug)]
pub enum IndexerError {
    /// Block or hash absent on the queried side. Expected during sync.
    #[error("Block not found")]
    BlockNotFound,

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Parallel sync interrupted at height {height}")]
    Interrupted { height: u32 },

    #[error("Remote best height {remote} is less than sync start height {start}")]
    RemoteBehind { remote: u32, start: u32 },

    #[error("Resync did not converge after {0} passes")]
    ResyncLimit(usize),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IndexerError {
    /// Create a new RPC error
    pub fn rpc<S: Into<String>>(message: S) -> Self {
        Self::Rpc(message.into())
    }

    /// Create a new database error
    pub fn database<S: Into<String>>(message: S) -> Self {
        Self::Database(message.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this is the "block not found" kind
    pub fn is_not_found(&self) -> bool {
        matches!(self, IndexerError::BlockNotFound)
    }

    /// Get the error category for metrics
    pub fn category(&self) -> &'static str {
        match self {
            IndexerError::BlockNotFound => "not_found",
            IndexerError::Rpc(_) => "rpc",
            IndexerError::Database(_) => "database",
            IndexerError::Interrupted { .. } => "interrupted",
            IndexerError::RemoteBehind { .. } => "remote_behind",
            IndexerError::ResyncLimit(_) => "resync_limit",
            IndexerError::Config(_) => "config",
            IndexerError::Internal(_) => "internal",
        }
    }
}
