//! Chain Collector
//!
//! One poll loop per chain and asset class. Each tick rolls the daily
//! budget if the UTC day changed, fetches the chain head, drains the
//! live block range, and spends leftover budget on backfill. Every
//! upstream call passes through the shared circuit breaker and adaptive
//! rate limiter and costs exactly one budget unit. Errors never escape
//! the loop; a block that keeps failing is skipped with a warning.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Timelike, Utc};
use thiserror::Error;
use tokio::sync::{Mutex, Notify, RwLock};
use tokio::task::JoinHandle;

use crate::domain::budget::ApiBudget;
use crate::domain::chain::{AssetClass, Chain};
use crate::domain::circuit_breaker::{CircuitBreaker, CircuitBreakerError};
use crate::domain::classifier::EventClassifier;
use crate::domain::cursor::ChainCursor;
use crate::domain::dedup::DedupGuard;
use crate::domain::event::RawTransfer;
use crate::domain::rate_limiter::AdaptiveRateLimiter;
use crate::ports::explorer::{ExplorerApi, ExplorerError};
use crate::ports::store::{EventSink, StoreError};

/// Outside the intensive hour, backfill runs only while this fraction
/// of the daily budget is still unspent.
const BACKFILL_IDLE_FRACTION: f64 = 0.8;

#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("explorer call failed: {0}")]
    Explorer(#[from] ExplorerError),

    #[error(transparent)]
    CircuitOpen(#[from] CircuitBreakerError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("credential env var {0} is not set")]
    MissingCredential(String),
}

/// Runtime parameters for one collector
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub chain: Chain,
    pub asset_class: AssetClass,
    pub poll_interval: Duration,
    /// Blocks held back from head before the live cursor starts
    pub safety_margin: u64,
    /// Blocks the backfill cursor is seeded behind head on first use
    pub batch_size: u64,
    pub daily_call_limit: u64,
    /// Calls withheld from backfill so live detection never starves
    pub safety_buffer: u64,
    pub backfill_enabled: bool,
    /// UTC hour during which backfill may spend the whole available budget
    pub intensive_hour: u32,
    /// Historical depth the backfill works down to (exclusive)
    pub backfill_target_block: u64,
    /// Pacing delay between calls inside an intensive session
    pub intensive_call_delay: Duration,
    pub max_block_retries: u32,
    pub retry_base_delay: Duration,
    /// How long `stop` waits for the loop to drain before aborting it
    pub drain_timeout: Duration,
}

impl CollectorConfig {
    pub fn for_chain(chain: Chain, asset_class: AssetClass) -> Self {
        let descriptor = chain.descriptor();
        Self {
            chain,
            asset_class,
            poll_interval: descriptor.default_poll_interval,
            safety_margin: descriptor.safety_margin,
            batch_size: 50,
            daily_call_limit: 100_000,
            safety_buffer: 2_000,
            backfill_enabled: true,
            intensive_hour: 3,
            backfill_target_block: 0,
            intensive_call_delay: Duration::from_millis(250),
            max_block_retries: 3,
            retry_base_delay: Duration::from_millis(500),
            drain_timeout: Duration::from_secs(10),
        }
    }
}

/// Poll-loop collector for one chain and asset class
pub struct ChainCollector {
    name: String,
    config: CollectorConfig,
    explorer: Arc<dyn ExplorerApi>,
    classifier: Arc<EventClassifier>,
    dedup: DedupGuard,
    store: Arc<dyn EventSink>,
    limiter: Arc<AdaptiveRateLimiter>,
    breaker: Arc<CircuitBreaker>,
    running: Arc<RwLock<bool>>,
    shutdown: Notify,
    cursor: Mutex<Option<ChainCursor>>,
    budget: Mutex<ApiBudget>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ChainCollector {
    pub fn new(
        config: CollectorConfig,
        explorer: Arc<dyn ExplorerApi>,
        classifier: Arc<EventClassifier>,
        store: Arc<dyn EventSink>,
        limiter: Arc<AdaptiveRateLimiter>,
        breaker: Arc<CircuitBreaker>,
    ) -> Self {
        let name = format!("{}-{}", config.chain, config.asset_class);
        let budget = ApiBudget::new(
            config.daily_call_limit,
            config.safety_buffer,
            Utc::now().date_naive(),
        );
        Self {
            name,
            explorer,
            classifier,
            dedup: DedupGuard::with_defaults(Arc::clone(&store)),
            store,
            limiter,
            breaker,
            running: Arc::new(RwLock::new(false)),
            shutdown: Notify::new(),
            cursor: Mutex::new(None),
            budget: Mutex::new(budget),
            handle: Mutex::new(None),
            config,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Last live block fully processed, None before the first tick
    pub async fn live_block(&self) -> Option<u64> {
        self.cursor.lock().await.as_ref().map(|c| c.live_block())
    }

    /// Whether the backfill cursor has not yet reached its target
    pub async fn backfill_active(&self) -> bool {
        self.cursor
            .lock()
            .await
            .as_ref()
            .map_or(self.config.backfill_enabled, |c| c.backfill_enabled())
    }

    pub async fn calls_used_today(&self) -> u64 {
        self.budget.lock().await.calls_used_today()
    }

    /// Spawn the poll loop. A second start on a running collector is a
    /// logged no-op. Cursor and budget state survive a stop/start cycle.
    pub async fn start(self: &Arc<Self>) {
        {
            let mut running = self.running.write().await;
            if *running {
                tracing::warn!(collector = %self.name, "already running, start ignored");
                return;
            }
            *running = true;
        }

        let this = Arc::clone(self);
        let handle = tokio::spawn(async move { this.run_loop().await });
        *self.handle.lock().await = Some(handle);

        tracing::info!(
            collector = %self.name,
            chain = %self.config.chain,
            class = %self.config.asset_class,
            poll_interval = ?self.config.poll_interval,
            "collector started"
        );
    }

    /// Signal the loop to end after its current tick and wait out a
    /// bounded drain. The task is aborted only past the deadline.
    pub async fn stop(&self) {
        {
            let mut running = self.running.write().await;
            if !*running {
                tracing::debug!(collector = %self.name, "not running, stop ignored");
                return;
            }
            *running = false;
        }
        self.shutdown.notify_waiters();

        let handle = self.handle.lock().await.take();
        if let Some(mut handle) = handle {
            match tokio::time::timeout(self.config.drain_timeout, &mut handle).await {
                Ok(_) => tracing::info!(collector = %self.name, "collector stopped"),
                Err(_) => {
                    tracing::warn!(collector = %self.name, "drain timed out, aborting task");
                    handle.abort();
                }
            }
        }
    }

    async fn run_loop(self: Arc<Self>) {
        while *self.running.read().await {
            self.tick().await;
            if !*self.running.read().await {
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval) => {}
                _ = self.shutdown.notified() => break,
            }
        }
        tracing::info!(collector = %self.name, "collector loop exited");
    }

    /// One poll cycle: budget rollover, head fetch, live range, backfill
    async fn tick(&self) {
        self.budget.lock().await.maybe_reset(Utc::now().date_naive());

        let head = match self.guarded(|| self.explorer.latest_block_number()).await {
            Ok(head) => head,
            Err(err) => {
                tracing::warn!(collector = %self.name, error = %err, "head fetch failed, skipping tick");
                return;
            }
        };

        self.ensure_cursor(head).await;
        self.live_pass(head).await;

        if self.config.backfill_enabled {
            self.backfill_pass(head, Utc::now().hour()).await;
        }
    }

    /// Seed the cursor from the first observed head
    async fn ensure_cursor(&self, head: u64) {
        let mut cursor = self.cursor.lock().await;
        if cursor.is_none() {
            let seeded = ChainCursor::new(
                self.config.chain,
                head,
                self.config.safety_margin,
                self.config.backfill_target_block,
            );
            tracing::info!(
                collector = %self.name,
                head,
                live = seeded.live_block(),
                "cursor initialized"
            );
            *cursor = Some(seeded);
        }
    }

    /// Process every block in `(live_block, head]`. The live path is
    /// never budget-gated; a block whose retries are exhausted is
    /// skipped so the cursor stays gap-free going forward.
    async fn live_pass(&self, head: u64) {
        let start = match self.cursor.lock().await.as_ref() {
            Some(cursor) => cursor.live_block(),
            None => return,
        };

        for block in (start + 1)..=head {
            if !*self.running.read().await {
                return;
            }
            match self.fetch_block_with_retry(block).await {
                Ok(transfers) => self.process_transfers(&transfers, false).await,
                Err(err) => {
                    tracing::warn!(
                        collector = %self.name,
                        block,
                        error = %err,
                        "live block skipped after exhausted retries"
                    );
                }
            }
            if let Some(cursor) = self.cursor.lock().await.as_mut() {
                cursor.advance_live(block);
            }
        }
    }

    /// Intensive hour: paced session over the whole backfill allowance.
    /// Any other hour: a single block, and only while most of the daily
    /// budget is still unspent.
    async fn backfill_pass(&self, head: u64, hour: u32) {
        if hour == self.config.intensive_hour {
            self.backfill_session(head, hour).await;
        } else {
            let fraction = self.budget.lock().await.remaining_fraction();
            if fraction > BACKFILL_IDLE_FRACTION {
                self.backfill_one(head).await;
            }
        }
    }

    /// Spend the backfill allowance until it runs out, the hour rolls
    /// over, a stop is requested, the circuit opens, or the target is
    /// reached.
    async fn backfill_session(&self, head: u64, hour: u32) {
        let available = self.budget.lock().await.backfill_available();
        tracing::info!(
            collector = %self.name,
            available,
            "intensive backfill session started"
        );
        loop {
            if !*self.running.read().await {
                return;
            }
            if Utc::now().hour() != hour {
                tracing::info!(collector = %self.name, "intensive window closed");
                return;
            }
            if self.budget.lock().await.backfill_available() == 0 {
                tracing::info!(collector = %self.name, "backfill allowance exhausted");
                return;
            }
            if !self.backfill_one(head).await {
                return;
            }
            tokio::time::sleep(self.config.intensive_call_delay).await;
        }
    }

    /// Fetch and process one historical block. Returns false once the
    /// cursor is disabled (terminal for this collector) or the circuit
    /// is open; an open circuit leaves the cursor in place so the block
    /// is attempted again in a later session.
    async fn backfill_one(&self, head: u64) -> bool {
        let block = {
            let mut cursor = self.cursor.lock().await;
            let Some(cursor) = cursor.as_mut() else {
                return false;
            };
            match cursor.next_backfill_block(head, self.config.batch_size) {
                Some(block) => block,
                None => {
                    tracing::info!(collector = %self.name, "backfill target reached, disabled");
                    return false;
                }
            }
        };

        match self.fetch_block_with_retry(block).await {
            Ok(transfers) => self.process_transfers(&transfers, true).await,
            Err(err @ CollectorError::CircuitOpen(_)) => {
                tracing::warn!(
                    collector = %self.name,
                    block,
                    error = %err,
                    "circuit open, ending backfill until the upstream recovers"
                );
                return false;
            }
            Err(err) => {
                tracing::warn!(
                    collector = %self.name,
                    block,
                    error = %err,
                    "backfill block skipped after exhausted retries"
                );
            }
        }
        if let Some(cursor) = self.cursor.lock().await.as_mut() {
            cursor.descend_backfill();
        }
        true
    }

    /// Fetch the transfers of one block for this collector's asset
    /// class, with bounded exponential-backoff retry. An open circuit
    /// means no attempt will succeed until the cooldown, so it ends the
    /// retry immediately.
    async fn fetch_block_with_retry(&self, block: u64) -> Result<Vec<RawTransfer>, CollectorError> {
        let mut delay = self.config.retry_base_delay;
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.fetch_transfers(block).await {
                Ok(transfers) => return Ok(transfers),
                Err(err @ CollectorError::CircuitOpen(_)) => return Err(err),
                Err(err) => {
                    if attempt >= self.config.max_block_retries {
                        return Err(err);
                    }
                    tracing::warn!(
                        collector = %self.name,
                        block,
                        attempt,
                        error = %err,
                        "block fetch failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        }
    }

    async fn fetch_transfers(&self, block: u64) -> Result<Vec<RawTransfer>, CollectorError> {
        match self.config.asset_class {
            AssetClass::Native => self.guarded(|| self.explorer.block_with_transfers(block)).await,
            AssetClass::Token => self.guarded(|| self.explorer.token_transfers(block, block)).await,
        }
    }

    /// Gate one upstream call through the circuit breaker and rate
    /// limiter, account one budget unit, and feed the outcome back.
    /// A circuit-open rejection never reaches the network and costs
    /// nothing.
    async fn guarded<T, F, Fut>(&self, call: F) -> Result<T, CollectorError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, ExplorerError>>,
    {
        self.breaker.try_acquire().await?;
        self.limiter.acquire().await;
        self.budget.lock().await.record_call();

        let started = Instant::now();
        match call().await {
            Ok(value) => {
                self.limiter.record_success(started.elapsed()).await;
                self.breaker.record_success().await;
                Ok(value)
            }
            Err(err) => {
                self.limiter.record_error().await;
                self.breaker.record_failure().await;
                Err(err.into())
            }
        }
    }

    /// Classify, dedup and persist a batch of transfers. A failed store
    /// existence check falls through to the insert, whose identity-keyed
    /// upsert absorbs any duplicate. A failed insert drops the event.
    async fn process_transfers(&self, transfers: &[RawTransfer], is_backfill: bool) {
        for raw in transfers {
            let Some(event) = self
                .classifier
                .classify(raw, self.config.chain, is_backfill)
                .await
            else {
                continue;
            };

            match self.dedup.is_duplicate(&event.tx_hash, event.chain).await {
                Ok(true) => continue,
                Ok(false) => {}
                Err(err) => {
                    tracing::warn!(
                        collector = %self.name,
                        tx = %event.tx_hash,
                        error = %err,
                        "dedup check failed, inserting anyway"
                    );
                }
            }

            if let Err(err) = self.store.insert(&event).await {
                tracing::warn!(
                    collector = %self.name,
                    tx = %event.tx_hash,
                    error = %err,
                    "event insert failed, dropping"
                );
                continue;
            }
            self.dedup.mark_seen(&event.tx_hash, event.chain).await;

            tracing::info!(
                collector = %self.name,
                tx = %event.tx_hash,
                symbol = %event.symbol,
                usd = event.usd_value,
                cross_border = event.cross_border,
                backfill = event.is_backfill,
                "whale transfer detected"
            );
        }
    }
}
