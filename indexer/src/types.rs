//! Core data types exchanged between the chain client, the sync engine and the index store

use serde::{Deserialize, Serialize};

/// A transaction as delivered by the chain client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction id
    pub txid: String,

    /// Raw transaction payload, hex encoded
    #[serde(default)]
    pub hex: String,
}

/// A full block fetched from the chain client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Block hash
    pub hash: String,

    /// Block height
    pub height: u32,

    /// Hash of the successor block; empty when the daemon does not supply it
    #[serde(default)]
    pub next: String,

    /// Transactions contained in the block
    #[serde(default)]
    pub txs: Vec<Transaction>,
}

impl Block {
    /// Create a block without transactions
    pub fn new<S: Into<String>>(hash: S, height: u32) -> Self {
        Self {
            hash: hash.into(),
            height,
            next: String::new(),
            txs: Vec::new(),
        }
    }

    /// Set the successor hash
    pub fn with_next<S: Into<String>>(mut self, next: S) -> Self {
        self.next = next.into();
        self
    }
}

/// Best block known to a party
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BestBlock {
    pub height: u32,
    pub hash: String,
}

/// Unit of work handed to the fetch workers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashHeight {
    pub hash: String,
    pub height: u32,
}
