//! End-to-end collector fleet tests against scripted mocks: spawned
//! poll loops, classification, dedup and persistence working together.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use whalewatch::adapters::store::MemoryEventStore;
use whalewatch::application::{ChainCollector, CollectorConfig, CollectorManager};
use whalewatch::config::Config;
use whalewatch::domain::chain::{AssetClass, Chain};
use whalewatch::domain::circuit_breaker::CircuitBreaker;
use whalewatch::domain::classifier::EventClassifier;
use whalewatch::domain::event::RawTransfer;
use whalewatch::domain::rate_limiter::{AdaptiveRateLimiter, RateLimiterConfig};
use whalewatch::ports::mocks::{raw_transfer, MockExplorer, MockPriceSource};

const BINANCE_ETH: &str = "0x3f5ce5fbfe3e9af3971dd833d26ba9b5c936f0be";
const COINBASE_ETH: &str = "0x71660c4005ba85c37ccec55d0c4493e66fe775d3";

fn fast_config(chain: Chain, class: AssetClass) -> CollectorConfig {
    let mut config = CollectorConfig::for_chain(chain, class);
    config.poll_interval = Duration::from_millis(20);
    config.safety_margin = 2;
    config.backfill_enabled = false;
    config.max_block_retries = 2;
    config.retry_base_delay = Duration::from_millis(1);
    config.drain_timeout = Duration::from_secs(2);
    config
}

fn classifier() -> Arc<EventClassifier> {
    let prices = Arc::new(
        MockPriceSource::new()
            .with_price("ethereum", 2000.0)
            .with_price("tether", 1.0),
    );
    Arc::new(EventClassifier::new(prices, HashMap::new(), 1_000_000.0))
}

fn unthrottled() -> Arc<AdaptiveRateLimiter> {
    Arc::new(AdaptiveRateLimiter::new(RateLimiterConfig {
        initial_rate: 1_000.0,
        max_rate: 1_000.0,
        ..Default::default()
    }))
}

fn collector(
    config: CollectorConfig,
    explorer: Arc<MockExplorer>,
    store: Arc<MemoryEventStore>,
) -> Arc<ChainCollector> {
    Arc::new(ChainCollector::new(
        config,
        explorer,
        classifier(),
        store,
        unthrottled(),
        Arc::new(CircuitBreaker::with_defaults()),
    ))
}

/// 1000 ETH at the mocked $2000 is a $2M transfer
fn whale(tx: &str, block: u64) -> RawTransfer {
    raw_transfer(tx, BINANCE_ETH, COINBASE_ETH, 1000.0, block)
}

#[tokio::test]
async fn test_live_detection_end_to_end() {
    let explorer = Arc::new(
        MockExplorer::new()
            .with_heads(&[105, 107])
            .with_block(104, vec![whale("0xaaa", 104)])
            .with_block(105, vec![raw_transfer("0xsmall", "0x1", "0x2", 1.0, 105)])
            .with_block(107, vec![whale("0xbbb", 107)]),
    );
    let store = Arc::new(MemoryEventStore::new());
    let collector = collector(
        fast_config(Chain::Ethereum, AssetClass::Native),
        explorer.clone(),
        store.clone(),
    );

    collector.start().await;
    tokio::time::sleep(Duration::from_millis(300)).await;
    collector.stop().await;

    // Both whales landed, the small transfer did not
    assert_eq!(store.len(), 2);
    assert_eq!(collector.live_block().await, Some(107));

    let event = store.get("0xaaa", Chain::Ethereum).unwrap();
    assert_eq!(event.from.exchange, "Binance");
    assert_eq!(event.to.exchange, "Coinbase");
    assert!(event.cross_border);
    assert!(!event.is_backfill);

    // Every upstream call was accounted, one budget unit each
    assert_eq!(
        collector.calls_used_today().await,
        explorer.call_count() as u64
    );
}

#[tokio::test]
async fn test_native_and_token_collectors_share_one_store() {
    let tx = "0xshared";
    let native_explorer = Arc::new(
        MockExplorer::new()
            .with_heads(&[105])
            .with_block(104, vec![whale(tx, 104)])
            .with_block(105, vec![whale(tx, 105)]),
    );
    let token_explorer = Arc::new(
        MockExplorer::new()
            .with_heads(&[105])
            .with_token_transfers(104, vec![whale(tx, 104)])
            .with_token_transfers(105, vec![]),
    );
    let store = Arc::new(MemoryEventStore::new());

    let native = collector(
        fast_config(Chain::Ethereum, AssetClass::Native),
        native_explorer,
        store.clone(),
    );
    let token = collector(
        fast_config(Chain::Ethereum, AssetClass::Token),
        token_explorer,
        store.clone(),
    );

    native.start().await;
    token.start().await;
    tokio::time::sleep(Duration::from_millis(300)).await;
    native.stop().await;
    token.stop().await;

    // The same identity arrived three times across two collectors and
    // was stored exactly once
    assert_eq!(store.len(), 1);
    assert!(store.get(tx, Chain::Ethereum).is_some());
}

#[tokio::test]
async fn test_failing_block_does_not_stall_the_loop() {
    let explorer = Arc::new(
        MockExplorer::new()
            .with_heads(&[105])
            .with_failing_block(104)
            .with_block(105, vec![whale("0xok", 105)]),
    );
    let store = Arc::new(MemoryEventStore::new());
    let collector = collector(
        fast_config(Chain::Ethereum, AssetClass::Native),
        explorer,
        store.clone(),
    );

    collector.start().await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    collector.stop().await;

    assert_eq!(collector.live_block().await, Some(105));
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_manager_fleet_lifecycle() {
    let mut config = Config::default();
    config.collector.drain_timeout_secs = 1;
    let manager = CollectorManager::new(
        config,
        Arc::new(MemoryEventStore::new()),
        Arc::new(MockPriceSource::new()),
    );

    let explorer = Arc::new(MockExplorer::new().with_heads(&[100]));
    let store = Arc::new(MemoryEventStore::new());
    manager
        .register(collector(
            fast_config(Chain::Ethereum, AssetClass::Native),
            explorer.clone(),
            store.clone(),
        ))
        .await;
    manager
        .register(collector(
            fast_config(Chain::Bsc, AssetClass::Native),
            Arc::new(MockExplorer::new().with_heads(&[50])),
            store,
        ))
        .await;

    manager.start_collector("ethereum-native").await;
    manager.start_collector("bsc-native").await;
    assert_eq!(manager.running_count().await, 2);

    // Restarting a running collector changes nothing
    manager.start_collector("ethereum-native").await;
    assert_eq!(manager.running_count().await, 2);

    manager.stop_collector("bsc-native").await;
    assert_eq!(manager.running_count().await, 1);

    manager.stop_all().await;
    assert_eq!(manager.running_count().await, 0);
}
