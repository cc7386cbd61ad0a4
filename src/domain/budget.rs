//! Daily API Call Budget
//!
//! Shared accounting for the constrained daily explorer call allowance.
//! Every upstream call costs exactly one unit whether it serves the live
//! or the backfill path; the counter resets once per UTC calendar day.

use chrono::NaiveDate;

/// Daily call budget with a safety buffer reserved for live detection
#[derive(Debug, Clone)]
pub struct ApiBudget {
    calls_used_today: u64,
    daily_limit: u64,
    /// Calls withheld from backfill so the live path never starves
    safety_buffer: u64,
    last_reset_day: NaiveDate,
}

impl ApiBudget {
    pub fn new(daily_limit: u64, safety_buffer: u64, today: NaiveDate) -> Self {
        Self {
            calls_used_today: 0,
            daily_limit,
            safety_buffer,
            last_reset_day: today,
        }
    }

    pub fn calls_used_today(&self) -> u64 {
        self.calls_used_today
    }

    pub fn daily_limit(&self) -> u64 {
        self.daily_limit
    }

    /// Reset the counter when the calendar day has rolled over.
    /// Returns true when a reset happened.
    pub fn maybe_reset(&mut self, today: NaiveDate) -> bool {
        if today > self.last_reset_day {
            tracing::info!(
                used = self.calls_used_today,
                limit = self.daily_limit,
                "daily API budget reset"
            );
            self.calls_used_today = 0;
            self.last_reset_day = today;
            true
        } else {
            false
        }
    }

    /// Account one upstream call, live or backfill alike
    pub fn record_call(&mut self) {
        self.calls_used_today += 1;
    }

    /// Calls the backfill path may spend right now: remaining budget
    /// minus the safety buffer, never negative.
    pub fn backfill_available(&self) -> u64 {
        self.daily_limit
            .saturating_sub(self.calls_used_today)
            .saturating_sub(self.safety_buffer)
    }

    /// Fraction of the daily limit still unspent
    pub fn remaining_fraction(&self) -> f64 {
        if self.daily_limit == 0 {
            return 0.0;
        }
        self.daily_limit.saturating_sub(self.calls_used_today) as f64 / self.daily_limit as f64
    }
}
