//! Event Classifier
//!
//! Turns a raw transfer into a `WhaleEvent` or discards it: resolves the
//! USD value through the price oracle, applies the per-symbol threshold
//! (inclusive), attributes both sides against the exchange directory and
//! sets the cross-border flag.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::chain::Chain;
use crate::domain::event::{RawTransfer, WhaleEvent};
use crate::domain::exchanges;
use crate::ports::price::PriceSource;

/// Default whale threshold applied to symbols without an explicit entry
pub const DEFAULT_USD_THRESHOLD: f64 = 1_000_000.0;

pub struct EventClassifier {
    prices: Arc<dyn PriceSource>,
    /// Per-symbol USD thresholds; symbols absent here use the default
    thresholds: HashMap<String, f64>,
    default_threshold: f64,
}

impl EventClassifier {
    pub fn new(
        prices: Arc<dyn PriceSource>,
        thresholds: HashMap<String, f64>,
        default_threshold: f64,
    ) -> Self {
        Self {
            prices,
            thresholds,
            default_threshold,
        }
    }

    /// Threshold for a symbol
    pub fn threshold_for(&self, symbol: &str) -> f64 {
        self.thresholds
            .get(symbol)
            .copied()
            .unwrap_or(self.default_threshold)
    }

    /// Classify a transfer. Returns None for sub-threshold transfers and
    /// for assets the oracle cannot price (price 0.0 never qualifies).
    /// A value exactly at the threshold is included.
    pub async fn classify(
        &self,
        raw: &RawTransfer,
        chain: Chain,
        is_backfill: bool,
    ) -> Option<WhaleEvent> {
        let price = self.prices.get_price(&raw.asset_id).await;
        let usd_value = raw.amount * price;
        let threshold = self.threshold_for(&raw.symbol);
        if usd_value < threshold {
            return None;
        }

        let from = exchanges::attribute(&raw.from, chain);
        let to = exchanges::attribute(&raw.to, chain);
        // Two Unknown countries compare equal: not cross-border
        let cross_border = from.country != to.country;

        Some(WhaleEvent {
            chain,
            tx_hash: raw.tx_hash.clone(),
            from_address: raw.from.clone(),
            to_address: raw.to.clone(),
            symbol: raw.symbol.clone(),
            amount: raw.amount,
            usd_value,
            from,
            to,
            cross_border,
            is_backfill,
            source_block: raw.block_number,
            timestamp: raw.timestamp,
        })
    }
}
