//! Price Oracle Port
//!
//! Read-only USD price lookup. The oracle refreshes on its own interval;
//! an unknown asset resolves to 0.0 and the classifier discards the
//! transfer (a zero-valued transfer never meets a whale threshold).

use async_trait::async_trait;

#[async_trait]
pub trait PriceSource: Send + Sync {
    /// USD price for an asset id, 0.0 when unknown
    async fn get_price(&self, asset_id: &str) -> f64;
}
