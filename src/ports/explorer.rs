//! Explorer API Port
//!
//! Trait seam for the per-chain block explorer HTTP API. A failure is any
//! non-2xx status, malformed JSON, or a provider-reported error field in
//! an otherwise successful response.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::event::RawTransfer;

#[derive(Debug, Error)]
pub enum ExplorerError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("response parsing error: {0}")]
    Parse(String),

    #[error("request timed out")]
    Timeout,
}

/// Chain explorer read operations used by collectors.
/// Each method costs one unit of the daily call budget.
#[async_trait]
pub trait ExplorerApi: Send + Sync {
    /// Current chain head block number
    async fn latest_block_number(&self) -> Result<u64, ExplorerError>;

    /// Native-coin value transfers contained in one block
    async fn block_with_transfers(&self, number: u64) -> Result<Vec<RawTransfer>, ExplorerError>;

    /// Token transfers over an inclusive block range
    async fn token_transfers(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RawTransfer>, ExplorerError>;
}
