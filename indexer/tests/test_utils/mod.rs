//! Test utilities and helpers
//!
//! In-memory chain client and index store doubles.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use qenus_indexer::{
    BestBlock, Block, ChainClient, IndexStore, IndexerError, InternalState, Result, SyncConfig,
    SyncWorker,
};

/// Initialize logging for a test run. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Hash used for the block at `height` on a chain tagged `tag`
pub fn block_hash(tag: &str, height: u32) -> String {
    format!("{}{:08x}", tag, height)
}

/// Blocks `lower..=higher` linked through their `next` hashes
pub fn linked_blocks(tag: &str, lower: u32, higher: u32) -> Vec<Block> {
    (lower..=higher)
        .map(|height| {
            let next = if height < higher { block_hash(tag, height + 1) } else { String::new() };
            Block::new(block_hash(tag, height), height).with_next(next)
        })
        .collect()
}

/// Chain sharing `common` blocks of `base` and continuing with blocks tagged `tag`
pub fn forked_blocks(base: &[Block], common: u32, tag: &str, higher: u32) -> Vec<Block> {
    let mut blocks: Vec<Block> = base.iter().filter(|b| b.height <= common).cloned().collect();
    if let Some(last) = blocks.last_mut() {
        last.next = block_hash(tag, common + 1);
    }
    blocks.extend(linked_blocks(tag, common + 1, higher));
    blocks
}

type Latency = Arc<dyn Fn(u32) -> Duration + Send + Sync>;

#[derive(Default)]
struct ChainData {
    canonical: BTreeMap<u32, Block>,
    known: HashMap<String, Block>,
    failures: HashMap<u32, usize>,
    hash_failures: HashMap<u32, usize>,
    unavailable: HashSet<String>,
    reported_height: Option<u32>,
    block_calls: HashMap<u32, usize>,
}

/// In-memory chain daemon
pub struct MockChain {
    data: Mutex<ChainData>,
    latency: Mutex<Option<Latency>>,
    keeps_addresses: bool,
}

impl MockChain {
    pub fn new(blocks: Vec<Block>) -> Arc<Self> {
        Arc::new(Self::build(blocks, false))
    }

    pub fn with_block_addresses(blocks: Vec<Block>) -> Arc<Self> {
        Arc::new(Self::build(blocks, true))
    }

    fn build(blocks: Vec<Block>, keeps_addresses: bool) -> Self {
        let chain = Self {
            data: Mutex::new(ChainData::default()),
            latency: Mutex::new(None),
            keeps_addresses,
        };
        chain.set_canonical(blocks);
        chain
    }

    /// Replace the canonical chain; previous blocks stay fetchable by hash
    pub fn set_canonical(&self, blocks: Vec<Block>) {
        let mut data = self.data.lock();
        data.canonical.clear();
        for block in blocks {
            data.known.insert(block.hash.clone(), block.clone());
            data.canonical.insert(block.height, block);
        }
    }

    /// Make a stale block fetchable by hash
    pub fn add_known(&self, block: Block) {
        self.data.lock().known.insert(block.hash.clone(), block);
    }

    /// Fail the next `times` block fetches at `height`
    pub fn fail_block(&self, height: u32, times: usize) {
        self.data.lock().failures.insert(height, times);
    }

    /// Fail the next `times` hash lookups at `height`
    pub fn fail_hash(&self, height: u32, times: usize) {
        self.data.lock().hash_failures.insert(height, times);
    }

    /// Fail every fetch of `hash`
    pub fn make_unavailable(&self, hash: &str) {
        self.data.lock().unavailable.insert(hash.to_string());
    }

    /// Report `height` as the best height regardless of the stored chain
    pub fn report_best_height(&self, height: u32) {
        self.data.lock().reported_height = Some(height);
    }

    /// Delay every block fetch by `latency(height)`
    pub fn set_latency<F>(&self, latency: F)
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        *self.latency.lock() = Some(Arc::new(latency));
    }

    /// Number of block fetches attempted at `height`
    pub fn block_calls(&self, height: u32) -> usize {
        self.data.lock().block_calls.get(&height).copied().unwrap_or(0)
    }

    pub fn total_block_calls(&self) -> usize {
        self.data.lock().block_calls.values().sum()
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn best_block_hash(&self) -> Result<String> {
        let data = self.data.lock();
        data.canonical
            .values()
            .next_back()
            .map(|b| b.hash.clone())
            .ok_or(IndexerError::BlockNotFound)
    }

    async fn best_block_height(&self) -> Result<u32> {
        let data = self.data.lock();
        if let Some(height) = data.reported_height {
            return Ok(height);
        }
        data.canonical
            .keys()
            .next_back()
            .copied()
            .ok_or(IndexerError::BlockNotFound)
    }

    async fn block_hash(&self, height: u32) -> Result<String> {
        let mut data = self.data.lock();
        if let Some(remaining) = data.hash_failures.get_mut(&height) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(IndexerError::rpc(format!("transient hash failure at {}", height)));
            }
        }
        data.canonical
            .get(&height)
            .map(|b| b.hash.clone())
            .ok_or(IndexerError::BlockNotFound)
    }

    async fn block(&self, hash: &str, height: u32) -> Result<Block> {
        let latency = self.latency.lock().clone();
        if let Some(latency) = latency {
            tokio::time::sleep(latency(height)).await;
        }

        let mut data = self.data.lock();
        *data.block_calls.entry(height).or_insert(0) += 1;

        if let Some(remaining) = data.failures.get_mut(&height) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(IndexerError::rpc(format!("transient failure at {}", height)));
            }
        }

        if hash.is_empty() {
            return data.canonical.get(&height).cloned().ok_or(IndexerError::BlockNotFound);
        }
        if data.unavailable.contains(hash) {
            return Err(IndexerError::rpc(format!("block {} unavailable", hash)));
        }
        data.known.get(hash).cloned().ok_or(IndexerError::BlockNotFound)
    }

    fn keeps_block_addresses(&self) -> bool {
        self.keeps_addresses
    }
}

/// Mutation observed by the store double
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    Connect(u32),
    Disconnect(u32),
    DisconnectRange(u32, u32),
}

#[derive(Default)]
struct StoreData {
    blocks: BTreeMap<u32, Block>,
    events: Vec<StoreEvent>,
    fail_connect: HashSet<u32>,
    panic_connect: Option<u32>,
}

/// In-memory index store recording every mutation
#[derive(Default)]
pub struct MockStore {
    data: Mutex<StoreData>,
}

impl MockStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Store pre-populated with `blocks`; no events are recorded for them
    pub fn with_blocks(blocks: Vec<Block>) -> Arc<Self> {
        let store = Self::default();
        {
            let mut data = store.data.lock();
            for block in blocks {
                data.blocks.insert(block.height, block);
            }
        }
        Arc::new(store)
    }

    /// Fail the next connect of `height`
    pub fn fail_connect(&self, height: u32) {
        self.data.lock().fail_connect.insert(height);
    }

    /// Panic inside `connect_block` at `height`
    pub fn panic_on_connect(&self, height: u32) {
        self.data.lock().panic_connect = Some(height);
    }

    pub fn events(&self) -> Vec<StoreEvent> {
        self.data.lock().events.clone()
    }

    /// Heights passed to `connect_block`, in call order
    pub fn connected_heights(&self) -> Vec<u32> {
        self.data
            .lock()
            .events
            .iter()
            .filter_map(|e| match e {
                StoreEvent::Connect(height) => Some(*height),
                _ => None,
            })
            .collect()
    }

    pub fn best(&self) -> Option<(u32, String)> {
        self.data
            .lock()
            .blocks
            .values()
            .next_back()
            .map(|b| (b.height, b.hash.clone()))
    }

    pub fn hash_at(&self, height: u32) -> Option<String> {
        self.data.lock().blocks.get(&height).map(|b| b.hash.clone())
    }
}

#[async_trait]
impl IndexStore for MockStore {
    async fn best_block(&self) -> Result<Option<BestBlock>> {
        Ok(self.best().map(|(height, hash)| BestBlock { height, hash }))
    }

    async fn block_hash(&self, height: u32) -> Result<Option<String>> {
        Ok(self.hash_at(height))
    }

    async fn connect_block(&self, block: &Block) -> Result<()> {
        let mut data = self.data.lock();
        if data.panic_connect == Some(block.height) {
            drop(data);
            panic!("index write crashed at block {}", block.height);
        }
        if data.fail_connect.remove(&block.height) {
            return Err(IndexerError::database(format!("cannot write block {}", block.height)));
        }
        data.events.push(StoreEvent::Connect(block.height));
        data.blocks.insert(block.height, block.clone());
        Ok(())
    }

    async fn disconnect_block(&self, block: &Block) -> Result<()> {
        let mut data = self.data.lock();
        data.events.push(StoreEvent::Disconnect(block.height));
        data.blocks.remove(&block.height);
        Ok(())
    }

    async fn disconnect_block_range(&self, lower: u32, higher: u32) -> Result<()> {
        let mut data = self.data.lock();
        data.events.push(StoreEvent::DisconnectRange(lower, higher));
        data.blocks.retain(|height, _| *height < lower || *height > higher);
        Ok(())
    }

    fn database_size_on_disk(&self) -> u64 {
        self.data.lock().blocks.len() as u64 * 1024
    }
}

/// Config with fast retries for tests
pub fn test_config(workers: usize, chunk: u32) -> SyncConfig {
    SyncConfig {
        workers,
        chunk,
        retry_delay_ms: 10,
        ..SyncConfig::default()
    }
}

pub fn sync_worker(chain: Arc<MockChain>, store: Arc<MockStore>, config: SyncConfig) -> SyncWorker {
    sync_worker_with_shutdown(chain, store, config, CancellationToken::new())
}

pub fn sync_worker_with_shutdown(
    chain: Arc<MockChain>,
    store: Arc<MockStore>,
    config: SyncConfig,
    shutdown: CancellationToken,
) -> SyncWorker {
    SyncWorker::new(chain, store, config, shutdown, Arc::new(InternalState::new()))
}
