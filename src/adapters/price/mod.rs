//! Price Oracle Adapter
//!
//! `PriceSource` backed by a CoinGecko-style simple-price endpoint with a
//! TTL cache, so classification of a burst of transfers in one block does
//! not fan out into one oracle call per transfer. On refresh failure the
//! stale value keeps serving; an asset that has never resolved is 0.0
//! and the classifier discards its transfers.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::Mutex;

use crate::ports::price::PriceSource;

#[derive(Debug, Clone)]
pub struct PriceFeedConfig {
    /// Simple-price endpoint base URL
    pub api_url: String,
    /// How long a fetched price keeps serving before a refresh
    pub refresh_interval: Duration,
    pub timeout: Duration,
}

impl Default for PriceFeedConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.coingecko.com/api/v3/simple/price".to_string(),
            refresh_interval: Duration::from_secs(60),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct CachedPrice {
    usd: f64,
    fetched_at: Instant,
}

/// Interval-refreshed USD price feed
pub struct CachedPriceFeed {
    config: PriceFeedConfig,
    http: Client,
    cache: Mutex<HashMap<String, CachedPrice>>,
}

impl CachedPriceFeed {
    pub fn new(config: PriceFeedConfig) -> Self {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_default();
        Self {
            config,
            http,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(PriceFeedConfig::default())
    }

    /// Seed a price directly, bypassing the HTTP fetch. Used by tests
    /// and by deployments that pin prices in config.
    pub async fn prime(&self, asset_id: &str, usd: f64) {
        self.cache.lock().await.insert(
            asset_id.to_string(),
            CachedPrice {
                usd,
                fetched_at: Instant::now(),
            },
        );
    }

    async fn fetch(&self, asset_id: &str) -> Option<f64> {
        let response = self
            .http
            .get(&self.config.api_url)
            .query(&[("ids", asset_id), ("vs_currencies", "usd")])
            .send()
            .await
            .ok()?;
        if !response.status().is_success() {
            tracing::warn!(asset_id, status = %response.status(), "price fetch failed");
            return None;
        }
        let body: HashMap<String, HashMap<String, f64>> = response.json().await.ok()?;
        body.get(asset_id).and_then(|m| m.get("usd")).copied()
    }
}

#[async_trait]
impl PriceSource for CachedPriceFeed {
    async fn get_price(&self, asset_id: &str) -> f64 {
        let stale = {
            let cache = self.cache.lock().await;
            match cache.get(asset_id) {
                Some(entry) if entry.fetched_at.elapsed() < self.config.refresh_interval => {
                    return entry.usd;
                }
                Some(entry) => Some(entry.usd),
                None => None,
            }
        };

        match self.fetch(asset_id).await {
            Some(usd) => {
                self.prime(asset_id, usd).await;
                usd
            }
            None => {
                if let Some(usd) = stale {
                    tracing::warn!(asset_id, "price refresh failed, serving stale value");
                    usd
                } else {
                    0.0
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_feed(refresh: Duration) -> CachedPriceFeed {
        CachedPriceFeed::new(PriceFeedConfig {
            // Refused immediately, keeps the failure path fast
            api_url: "http://127.0.0.1:1/simple/price".to_string(),
            refresh_interval: refresh,
            timeout: Duration::from_millis(200),
        })
    }

    #[tokio::test]
    async fn test_fresh_cache_serves_without_fetch() {
        let feed = unreachable_feed(Duration::from_secs(60));
        feed.prime("ethereum", 3000.0).await;
        assert_eq!(feed.get_price("ethereum").await, 3000.0);
    }

    #[tokio::test]
    async fn test_stale_value_served_on_refresh_failure() {
        let feed = unreachable_feed(Duration::from_millis(1));
        feed.prime("ethereum", 3000.0).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        // Refresh fails against the unreachable endpoint; stale wins
        assert_eq!(feed.get_price("ethereum").await, 3000.0);
    }

    #[tokio::test]
    async fn test_unknown_asset_is_zero() {
        let feed = unreachable_feed(Duration::from_secs(60));
        assert_eq!(feed.get_price("nonexistent-coin").await, 0.0);
    }
}
