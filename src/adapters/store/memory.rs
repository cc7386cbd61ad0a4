//! In-Memory Event Store
//!
//! `EventSink` implementation backed by a map keyed on `(chain, tx_hash)`.
//! Honors the store contract that duplicate identities upsert rather than
//! error. Used for local runs and as the store double in tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::chain::Chain;
use crate::domain::event::WhaleEvent;
use crate::ports::store::{EventSink, StoreError};

#[derive(Debug, Default)]
pub struct MemoryEventStore {
    events: Mutex<HashMap<(Chain, String), WhaleEvent>>,
    exists_calls: AtomicUsize,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored events
    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().unwrap().is_empty()
    }

    /// Snapshot of every stored event
    pub fn all(&self) -> Vec<WhaleEvent> {
        self.events.lock().unwrap().values().cloned().collect()
    }

    /// One stored event by identity
    pub fn get(&self, tx_hash: &str, chain: Chain) -> Option<WhaleEvent> {
        self.events
            .lock()
            .unwrap()
            .get(&(chain, tx_hash.to_string()))
            .cloned()
    }

    /// How many times `exists` has been called, for dedup-path tests
    pub fn exists_calls(&self) -> usize {
        self.exists_calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl EventSink for MemoryEventStore {
    async fn insert(&self, event: &WhaleEvent) -> Result<(), StoreError> {
        let key = (event.chain, event.tx_hash.clone());
        // Identity-keyed upsert: a duplicate insert overwrites in place,
        // it never duplicates and never errors
        self.events.lock().unwrap().insert(key, event.clone());
        Ok(())
    }

    async fn exists(&self, tx_hash: &str, chain: Chain) -> Result<bool, StoreError> {
        self.exists_calls.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .events
            .lock()
            .unwrap()
            .contains_key(&(chain, tx_hash.to_string())))
    }
}

/// Event builders shared by store and dedup tests
pub mod tests_support {
    use chrono::{TimeZone, Utc};

    use crate::domain::chain::Chain;
    use crate::domain::event::{Attribution, WhaleEvent};

    pub fn sample_event(tx_hash: &str, chain: Chain) -> WhaleEvent {
        WhaleEvent {
            chain,
            tx_hash: tx_hash.to_string(),
            from_address: "0xfrom".to_string(),
            to_address: "0xto".to_string(),
            symbol: "ETH".to_string(),
            amount: 800.0,
            usd_value: 2_400_000.0,
            from: Attribution::unknown(),
            to: Attribution::unknown(),
            cross_border: false,
            is_backfill: false,
            source_block: 19_000_000,
            timestamp: Utc.timestamp_opt(1_756_000_000, 0).unwrap(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::tests_support::sample_event;
    use super::*;

    #[tokio::test]
    async fn test_insert_and_exists() {
        let store = MemoryEventStore::new();
        let event = sample_event("0xa", Chain::Ethereum);

        assert!(!store.exists("0xa", Chain::Ethereum).await.unwrap());
        store.insert(&event).await.unwrap();
        assert!(store.exists("0xa", Chain::Ethereum).await.unwrap());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_idempotent() {
        let store = MemoryEventStore::new();
        let event = sample_event("0xa", Chain::Ethereum);

        store.insert(&event).await.unwrap();
        store.insert(&event).await.unwrap();
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_identity_includes_chain() {
        let store = MemoryEventStore::new();
        store
            .insert(&sample_event("0xa", Chain::Ethereum))
            .await
            .unwrap();
        store.insert(&sample_event("0xa", Chain::Bsc)).await.unwrap();

        // Same hash on different chains are distinct events
        assert_eq!(store.len(), 2);
        assert!(store.exists("0xa", Chain::Bsc).await.unwrap());
        assert!(!store.exists("0xa", Chain::Polygon).await.unwrap());
    }

    #[tokio::test]
    async fn test_dedup_via_exists_check_yields_one_event() {
        let store = MemoryEventStore::new();
        let event = sample_event("0xa", Chain::Ethereum);

        // First delivery
        if !store.exists("0xa", Chain::Ethereum).await.unwrap() {
            store.insert(&event).await.unwrap();
        }
        // Second delivery short-circuits on the existence check
        if !store.exists("0xa", Chain::Ethereum).await.unwrap() {
            store.insert(&event).await.unwrap();
        }
        assert_eq!(store.len(), 1);
    }
}
