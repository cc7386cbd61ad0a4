//! Collector Manager
//!
//! Owns the collector registry and the per-chain gates shared by the
//! collectors hitting one upstream API. Built explicitly and passed
//! where needed; there is no global registry. Start and stop are
//! idempotent by name, and a missing credential disables one chain's
//! collectors without touching the rest of the fleet.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use crate::adapters::explorer::{ExplorerClient, ExplorerConfig};
use crate::application::collector::{ChainCollector, CollectorConfig, CollectorError};
use crate::config::Config;
use crate::domain::chain::{AssetClass, Chain};
use crate::domain::circuit_breaker::CircuitBreaker;
use crate::domain::classifier::EventClassifier;
use crate::domain::rate_limiter::AdaptiveRateLimiter;
use crate::ports::price::PriceSource;
use crate::ports::store::EventSink;

/// Registry and lifecycle for the collector fleet
pub struct CollectorManager {
    config: Config,
    store: Arc<dyn EventSink>,
    classifier: Arc<EventClassifier>,
    collectors: RwLock<HashMap<String, Arc<ChainCollector>>>,
}

impl CollectorManager {
    pub fn new(config: Config, store: Arc<dyn EventSink>, prices: Arc<dyn PriceSource>) -> Self {
        let classifier = Arc::new(EventClassifier::new(
            prices,
            config.thresholds.symbols.clone(),
            config.thresholds.default_usd,
        ));
        Self {
            config,
            store,
            classifier,
            collectors: RwLock::new(HashMap::new()),
        }
    }

    /// Add a collector to the registry without starting it. Replaces an
    /// existing entry of the same name.
    pub async fn register(&self, collector: Arc<ChainCollector>) {
        let name = collector.name().to_string();
        self.collectors.write().await.insert(name, collector);
    }

    pub async fn collector(&self, name: &str) -> Option<Arc<ChainCollector>> {
        self.collectors.read().await.get(name).cloned()
    }

    /// Registered collector names, sorted for stable output
    pub async fn collector_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collectors.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn running_count(&self) -> usize {
        let collectors: Vec<Arc<ChainCollector>> =
            self.collectors.read().await.values().cloned().collect();
        let mut count = 0;
        for collector in collectors {
            if collector.is_running().await {
                count += 1;
            }
        }
        count
    }

    /// Start one registered collector. A second start on a running
    /// collector is a logged no-op inside the collector itself.
    pub async fn start_collector(&self, name: &str) {
        match self.collector(name).await {
            Some(collector) => collector.start().await,
            None => tracing::warn!(collector = name, "unknown collector, start ignored"),
        }
    }

    /// Stop one collector; absent names are a no-op
    pub async fn stop_collector(&self, name: &str) {
        match self.collector(name).await {
            Some(collector) => collector.stop().await,
            None => tracing::debug!(collector = name, "unknown collector, stop ignored"),
        }
    }

    /// Build and start native and token collectors for every enabled
    /// chain with a resolvable credential. One rate limiter and one
    /// circuit breaker per chain, shared by both of its collectors.
    pub async fn init_from_config(&self) -> usize {
        let mut started = 0;
        for &chain in Chain::ALL {
            let section = self.config.chain_section(chain);
            if !section.enabled {
                tracing::debug!(%chain, "chain disabled in config");
                continue;
            }

            let api_key = match section.resolve_api_key(chain) {
                Some(key) => key,
                None => {
                    tracing::error!(
                        %chain,
                        env = chain.descriptor().credential_env,
                        "{}",
                        CollectorError::MissingCredential(
                            chain.descriptor().credential_env.to_string()
                        )
                    );
                    continue;
                }
            };

            let explorer = match self.build_explorer(chain, api_key, &section.api_url) {
                Ok(client) => Arc::new(client),
                Err(err) => {
                    tracing::error!(%chain, error = %err, "explorer client construction failed");
                    continue;
                }
            };

            let limiter = Arc::new(AdaptiveRateLimiter::with_defaults());
            let breaker = Arc::new(CircuitBreaker::with_defaults());

            for class in [AssetClass::Native, AssetClass::Token] {
                let collector = Arc::new(ChainCollector::new(
                    self.collector_config(chain, class, &section.poll_interval_secs),
                    explorer.clone(),
                    Arc::clone(&self.classifier),
                    Arc::clone(&self.store),
                    Arc::clone(&limiter),
                    Arc::clone(&breaker),
                ));
                let name = collector.name().to_string();
                self.register(collector).await;
                self.start_collector(&name).await;
                started += 1;
            }
        }
        tracing::info!(started, "collector fleet initialized");
        started
    }

    /// `init_from_config` under the name outward callers expect
    pub async fn start_all(&self) -> usize {
        self.init_from_config().await
    }

    /// Stop every registered collector. Individual stops cannot take
    /// the rest of the fleet down.
    pub async fn stop_all(&self) {
        let names = self.collector_names().await;
        for name in &names {
            self.stop_collector(name).await;
        }
        tracing::info!(stopped = names.len(), "collector fleet stopped");
    }

    fn build_explorer(
        &self,
        chain: Chain,
        api_key: String,
        api_url_override: &Option<String>,
    ) -> Result<ExplorerClient, crate::ports::explorer::ExplorerError> {
        let descriptor = chain.descriptor();
        match api_url_override {
            Some(api_url) => ExplorerClient::new(
                ExplorerConfig {
                    api_url: api_url.clone(),
                    api_key,
                    timeout: Duration::from_secs(30),
                },
                descriptor.native_symbol.to_string(),
                descriptor.native_asset_id.to_string(),
            ),
            None => ExplorerClient::for_chain(descriptor, api_key),
        }
    }

    fn collector_config(
        &self,
        chain: Chain,
        class: AssetClass,
        poll_override: &Option<u64>,
    ) -> CollectorConfig {
        let mut cc = CollectorConfig::for_chain(chain, class);
        if let Some(secs) = poll_override {
            cc.poll_interval = Duration::from_secs(*secs);
        }
        cc.batch_size = self.config.collector.batch_size;
        cc.max_block_retries = self.config.collector.max_block_retries;
        cc.retry_base_delay = Duration::from_millis(self.config.collector.retry_base_delay_ms);
        cc.drain_timeout = Duration::from_secs(self.config.collector.drain_timeout_secs);
        cc.daily_call_limit = self.config.budget.daily_limit;
        cc.safety_buffer = self.config.budget.safety_buffer;
        cc.backfill_enabled = self.config.backfill.enabled;
        cc.intensive_hour = self.config.backfill.intensive_hour;
        cc.backfill_target_block = self.config.backfill.target_block;
        cc.intensive_call_delay =
            Duration::from_millis(self.config.backfill.intensive_call_delay_ms);
        cc
    }
}
