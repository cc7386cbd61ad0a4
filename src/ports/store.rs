//! Durable Event Store Port
//!
//! Insert and existence-check against the external store. The store
//! treats `(chain, tx_hash)` as a uniqueness key for idempotent writes;
//! that upsert is the correctness backstop for at-least-once delivery.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::chain::Chain;
use crate::domain::event::WhaleEvent;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("insert failed: {0}")]
    InsertFailed(String),
}

#[async_trait]
pub trait EventSink: Send + Sync {
    /// Persist a classified event. Duplicate identities must not error.
    async fn insert(&self, event: &WhaleEvent) -> Result<(), StoreError>;

    /// Whether an event with this identity is already stored
    async fn exists(&self, tx_hash: &str, chain: Chain) -> Result<bool, StoreError>;
}
