//! Transfer and Whale Event Types
//!
//! `RawTransfer` is what a block or token-transfer listing yields before
//! classification. `WhaleEvent` is the immutable classified result handed
//! to the durable store. Identity is `(chain, tx_hash)`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::chain::Chain;

/// A transfer extracted from a fetched block, before classification
#[derive(Debug, Clone, PartialEq)]
pub struct RawTransfer {
    pub tx_hash: String,
    pub from: String,
    pub to: String,
    /// Ticker as reported by the chain or token contract
    pub symbol: String,
    /// Price oracle asset id for USD resolution
    pub asset_id: String,
    /// Amount in whole coin/token units
    pub amount: f64,
    pub block_number: u64,
    pub timestamp: DateTime<Utc>,
}

/// Exchange attribution for one side of a transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribution {
    /// Exchange name, empty when the address is unmapped
    pub exchange: String,
    pub country: String,
    pub city: String,
}

impl Attribution {
    pub const UNKNOWN_LOCATION: &'static str = "Unknown";

    /// Attribution for an address absent from the exchange directory
    pub fn unknown() -> Self {
        Self {
            exchange: String::new(),
            country: Self::UNKNOWN_LOCATION.to_string(),
            city: Self::UNKNOWN_LOCATION.to_string(),
        }
    }
}

/// A classified whale transfer, immutable once built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhaleEvent {
    pub chain: Chain,
    pub tx_hash: String,
    pub from_address: String,
    pub to_address: String,
    pub symbol: String,
    /// Amount in native coin/token units
    pub amount: f64,
    pub usd_value: f64,
    pub from: Attribution,
    pub to: Attribution,
    /// True when origin and destination resolve to different countries.
    /// Two Unknown sides compare equal and are not cross-border.
    pub cross_border: bool,
    /// True when the event was found by the backfill path
    pub is_backfill: bool,
    pub source_block: u64,
    pub timestamp: DateTime<Utc>,
}

impl WhaleEvent {
    /// Identity key used by the store for idempotent writes
    pub fn identity(&self) -> (Chain, &str) {
        (self.chain, &self.tx_hash)
    }
}
