//! Hand-rolled recording mocks for the ports, used by unit and
//! integration tests. Each mock records calls behind `Arc<Mutex<_>>`
//! and serves scripted responses configured through `with_*` builders.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use crate::domain::chain::Chain;
use crate::domain::event::RawTransfer;
use crate::ports::explorer::{ExplorerApi, ExplorerError};
use crate::ports::price::PriceSource;

/// Build a native transfer for test scenarios
pub fn raw_transfer(tx_hash: &str, from: &str, to: &str, amount: f64, block: u64) -> RawTransfer {
    RawTransfer {
        tx_hash: tx_hash.to_string(),
        from: from.to_string(),
        to: to.to_string(),
        symbol: "ETH".to_string(),
        asset_id: "ethereum".to_string(),
        amount,
        block_number: block,
        timestamp: Utc.timestamp_opt(1_756_000_000, 0).unwrap(),
    }
}

/// Scriptable explorer: a head sequence (last value repeats), per-block
/// transfer payloads and injectable per-block failures.
#[derive(Default)]
pub struct MockExplorer {
    heads: Mutex<VecDeque<u64>>,
    last_head: Mutex<u64>,
    blocks: Mutex<HashMap<u64, Vec<RawTransfer>>>,
    token_ranges: Mutex<HashMap<u64, Vec<RawTransfer>>>,
    failing_blocks: Mutex<HashSet<u64>>,
    fail_all: Mutex<bool>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockExplorer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Head values returned in order; the last one repeats
    pub fn with_heads(self, heads: &[u64]) -> Self {
        *self.heads.lock().unwrap() = heads.iter().copied().collect();
        if let Some(last) = heads.last() {
            *self.last_head.lock().unwrap() = *last;
        }
        self
    }

    /// Native transfers served for one block
    pub fn with_block(self, number: u64, transfers: Vec<RawTransfer>) -> Self {
        self.blocks.lock().unwrap().insert(number, transfers);
        self
    }

    /// Token transfers served for a single-block range starting here
    pub fn with_token_transfers(self, from_block: u64, transfers: Vec<RawTransfer>) -> Self {
        self.token_ranges
            .lock()
            .unwrap()
            .insert(from_block, transfers);
        self
    }

    /// Make one block fail on every fetch
    pub fn with_failing_block(self, number: u64) -> Self {
        self.failing_blocks.lock().unwrap().insert(number);
        self
    }

    /// Make every call fail until `set_healthy` is called
    pub fn with_all_failing(self) -> Self {
        *self.fail_all.lock().unwrap() = true;
        self
    }

    pub fn set_healthy(&self) {
        *self.fail_all.lock().unwrap() = false;
    }

    /// All recorded calls, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Total upstream calls recorded
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn check_fail_all(&self) -> Result<(), ExplorerError> {
        if *self.fail_all.lock().unwrap() {
            Err(ExplorerError::Http("injected failure".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ExplorerApi for MockExplorer {
    async fn latest_block_number(&self) -> Result<u64, ExplorerError> {
        self.calls.lock().unwrap().push("head".to_string());
        self.check_fail_all()?;
        let mut heads = self.heads.lock().unwrap();
        match heads.pop_front() {
            Some(head) => {
                *self.last_head.lock().unwrap() = head;
                Ok(head)
            }
            None => Ok(*self.last_head.lock().unwrap()),
        }
    }

    async fn block_with_transfers(&self, number: u64) -> Result<Vec<RawTransfer>, ExplorerError> {
        self.calls.lock().unwrap().push(format!("block:{}", number));
        self.check_fail_all()?;
        if self.failing_blocks.lock().unwrap().contains(&number) {
            return Err(ExplorerError::Provider(format!(
                "block {} unavailable",
                number
            )));
        }
        Ok(self
            .blocks
            .lock()
            .unwrap()
            .get(&number)
            .cloned()
            .unwrap_or_default())
    }

    async fn token_transfers(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RawTransfer>, ExplorerError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("tokens:{}-{}", from_block, to_block));
        self.check_fail_all()?;
        if self.failing_blocks.lock().unwrap().contains(&from_block) {
            return Err(ExplorerError::Provider(format!(
                "range {}-{} unavailable",
                from_block, to_block
            )));
        }
        Ok(self
            .token_ranges
            .lock()
            .unwrap()
            .get(&from_block)
            .cloned()
            .unwrap_or_default())
    }
}

/// Price oracle serving a fixed asset-id → USD map; unknown assets are 0.0
#[derive(Debug, Default)]
pub struct MockPriceSource {
    prices: HashMap<String, f64>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockPriceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(mut self, asset_id: &str, usd: f64) -> Self {
        self.prices.insert(asset_id.to_string(), usd);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PriceSource for MockPriceSource {
    async fn get_price(&self, asset_id: &str) -> f64 {
        self.calls.lock().unwrap().push(asset_id.to_string());
        self.prices.get(asset_id).copied().unwrap_or(0.0)
    }
}

/// Sink whose inserts always fail, for drop-and-log path tests
#[derive(Debug, Default)]
pub struct FailingSink {
    insert_attempts: std::sync::atomic::AtomicUsize,
}

impl FailingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many inserts were attempted and rejected
    pub fn insert_attempts(&self) -> usize {
        self.insert_attempts
            .load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl crate::ports::store::EventSink for FailingSink {
    async fn insert(
        &self,
        _event: &crate::domain::event::WhaleEvent,
    ) -> Result<(), crate::ports::store::StoreError> {
        self.insert_attempts
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Err(crate::ports::store::StoreError::InsertFailed(
            "injected insert failure".to_string(),
        ))
    }

    async fn exists(
        &self,
        _tx_hash: &str,
        _chain: Chain,
    ) -> Result<bool, crate::ports::store::StoreError> {
        Ok(false)
    }
}
