//! Chain Cursor
//!
//! Tracks the two block positions a collector advances: the live cursor
//! (monotonically non-decreasing, chasing head) and the backfill cursor
//! (monotonically decreasing toward a configured historical target).

use super::chain::Chain;

/// Per-collector block position state
#[derive(Debug, Clone)]
pub struct ChainCursor {
    pub chain: Chain,
    /// Last live block fully processed
    live_block: u64,
    /// Next historical block to backfill, None until first use
    backfill_block: Option<u64>,
    /// Backfill stops permanently once the target is reached
    backfill_enabled: bool,
    /// Historical depth the backfill works down to (exclusive)
    target_block: u64,
}

impl ChainCursor {
    /// Create a cursor with the live position at `head - safety_margin`
    pub fn new(chain: Chain, head: u64, safety_margin: u64, target_block: u64) -> Self {
        Self {
            chain,
            live_block: head.saturating_sub(safety_margin),
            backfill_block: None,
            backfill_enabled: true,
            target_block,
        }
    }

    pub fn live_block(&self) -> u64 {
        self.live_block
    }

    pub fn backfill_enabled(&self) -> bool {
        self.backfill_enabled
    }

    pub fn target_block(&self) -> u64 {
        self.target_block
    }

    /// Advance the live cursor. Moves forward only; a stale head is ignored.
    pub fn advance_live(&mut self, block: u64) {
        if block > self.live_block {
            self.live_block = block;
        }
    }

    /// Next historical block to fetch, lazily initialized to
    /// `head - batch_size` on first use. Returns None when backfill is
    /// disabled or the target has been reached.
    pub fn next_backfill_block(&mut self, head: u64, batch_size: u64) -> Option<u64> {
        if !self.backfill_enabled {
            return None;
        }
        let block = *self
            .backfill_block
            .get_or_insert_with(|| head.saturating_sub(batch_size));
        if block <= self.target_block {
            self.backfill_enabled = false;
            return None;
        }
        Some(block)
    }

    /// Record a processed backfill block and step the cursor down.
    /// Disables backfill permanently once the target is reached.
    pub fn descend_backfill(&mut self) {
        if let Some(block) = self.backfill_block {
            let next = block.saturating_sub(1);
            self.backfill_block = Some(next);
            if next <= self.target_block {
                self.backfill_enabled = false;
            }
        }
    }
}
