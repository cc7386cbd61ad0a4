//! Duplicate Delivery Guard
//!
//! Two-tier existence check run after classification and immediately
//! before persistence. Tier one is a bounded, age-expiring local seen-set
//! that short-circuits the common case; tier two is the authoritative
//! `exists` check against the durable store. Native and token collectors
//! on one chain can still race past both tiers - the store's
//! identity-keyed upsert is the correctness backstop for that.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::domain::chain::Chain;
use crate::ports::store::{EventSink, StoreError};

/// Bounded TTL set of recently seen event identities
#[derive(Debug)]
pub struct SeenCache {
    entries: HashMap<(Chain, String), Instant>,
    ttl: Duration,
    max_entries: usize,
}

impl SeenCache {
    pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);
    pub const DEFAULT_MAX_ENTRIES: usize = 50_000;

    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            max_entries,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(Self::DEFAULT_TTL, Self::DEFAULT_MAX_ENTRIES)
    }

    /// Whether this identity was seen within the TTL
    pub fn contains(&self, tx_hash: &str, chain: Chain) -> bool {
        self.entries
            .get(&(chain, tx_hash.to_string()))
            .map_or(false, |at| at.elapsed() < self.ttl)
    }

    /// Record an identity, evicting expired entries first and the oldest
    /// entry if the cache is still full.
    pub fn insert(&mut self, tx_hash: &str, chain: Chain) {
        if self.entries.len() >= self.max_entries {
            self.cleanup();
        }
        if self.entries.len() >= self.max_entries {
            self.remove_oldest();
        }
        self.entries
            .insert((chain, tx_hash.to_string()), Instant::now());
    }

    /// Drop expired entries
    pub fn cleanup(&mut self) {
        let ttl = self.ttl;
        self.entries.retain(|_, at| at.elapsed() < ttl);
    }

    fn remove_oldest(&mut self) {
        if let Some(oldest) = self
            .entries
            .iter()
            .min_by_key(|(_, at)| **at)
            .map(|(key, _)| key.clone())
        {
            self.entries.remove(&oldest);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Store-backed dedup check with the seen-cache fast path
pub struct DedupGuard {
    cache: Mutex<SeenCache>,
    store: Arc<dyn EventSink>,
}

impl DedupGuard {
    pub fn new(store: Arc<dyn EventSink>, cache: SeenCache) -> Self {
        Self {
            cache: Mutex::new(cache),
            store,
        }
    }

    pub fn with_defaults(store: Arc<dyn EventSink>) -> Self {
        Self::new(store, SeenCache::with_defaults())
    }

    /// True when the identity is already known, locally or in the store.
    /// A store hit is copied into the cache so the next check stays local.
    pub async fn is_duplicate(&self, tx_hash: &str, chain: Chain) -> Result<bool, StoreError> {
        if self.cache.lock().await.contains(tx_hash, chain) {
            return Ok(true);
        }
        if self.store.exists(tx_hash, chain).await? {
            self.cache.lock().await.insert(tx_hash, chain);
            return Ok(true);
        }
        Ok(false)
    }

    /// Record an identity after its event was persisted
    pub async fn mark_seen(&self, tx_hash: &str, chain: Chain) {
        self.cache.lock().await.insert(tx_hash, chain);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::store::MemoryEventStore;

    #[test]
    fn test_seen_cache_insert_and_contains() {
        let mut cache = SeenCache::with_defaults();
        cache.insert("0xa", Chain::Ethereum);
        assert!(cache.contains("0xa", Chain::Ethereum));
        assert!(!cache.contains("0xa", Chain::Bsc));
        assert!(!cache.contains("0xb", Chain::Ethereum));
    }

    #[test]
    fn test_seen_cache_expiry() {
        let mut cache = SeenCache::new(Duration::from_millis(10), 100);
        cache.insert("0xa", Chain::Ethereum);
        assert!(cache.contains("0xa", Chain::Ethereum));

        std::thread::sleep(Duration::from_millis(20));
        assert!(!cache.contains("0xa", Chain::Ethereum));

        cache.cleanup();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_seen_cache_bounded() {
        let mut cache = SeenCache::new(Duration::from_secs(60), 3);
        for i in 0..5 {
            cache.insert(&format!("0x{}", i), Chain::Ethereum);
        }
        assert!(cache.len() <= 3);
    }

    #[tokio::test]
    async fn test_dedup_fresh_identity() {
        let store = Arc::new(MemoryEventStore::new());
        let guard = DedupGuard::with_defaults(store);
        assert!(!guard.is_duplicate("0xa", Chain::Ethereum).await.unwrap());
    }

    #[tokio::test]
    async fn test_dedup_after_mark_seen() {
        let store = Arc::new(MemoryEventStore::new());
        let guard = DedupGuard::with_defaults(store.clone());

        guard.mark_seen("0xa", Chain::Ethereum).await;
        assert!(guard.is_duplicate("0xa", Chain::Ethereum).await.unwrap());
        // Cache hits never touch the store
        assert_eq!(store.exists_calls(), 0);
    }

    #[tokio::test]
    async fn test_dedup_store_hit_populates_cache() {
        let store = Arc::new(MemoryEventStore::new());
        store
            .insert(&crate::adapters::store::tests_support::sample_event(
                "0xa",
                Chain::Ethereum,
            ))
            .await
            .unwrap();

        let guard = DedupGuard::with_defaults(store.clone());
        assert!(guard.is_duplicate("0xa", Chain::Ethereum).await.unwrap());
        assert_eq!(store.exists_calls(), 1);

        // Second check is served from the cache
        assert!(guard.is_duplicate("0xa", Chain::Ethereum).await.unwrap());
        assert_eq!(store.exists_calls(), 1);
    }
}
