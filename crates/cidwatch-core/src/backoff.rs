//! Reconnect backoff.
//!
//! - [`BackoffConfig`]: floor and ceiling of the delay
//! - [`calculate_backoff_delay`]: `min(ceiling, floor * 2^attempt)`
//! - [`Backoff`]: the stateful counter the reconnect loop drives
//!
//! There is no jitter: the stream has exactly one subscriber per process, so
//! there is no herd to spread out.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Default first delay in milliseconds.
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 1000;
/// Default delay ceiling in milliseconds.
pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;

/// Backoff bounds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackoffConfig {
    /// Delay before the first retry, and the value a reset returns to.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Ceiling the doubling never exceeds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_initial_delay_ms() -> u64 {
    DEFAULT_INITIAL_DELAY_MS
}
fn default_max_delay_ms() -> u64 {
    DEFAULT_MAX_DELAY_MS
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: DEFAULT_INITIAL_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Delay calculation
// ─────────────────────────────────────────────────────────────────────────────

/// Exponential delay for a zero-based attempt index, capped at `max_delay_ms`.
#[must_use]
pub fn calculate_backoff_delay(attempt: u32, initial_delay_ms: u64, max_delay_ms: u64) -> u64 {
    initial_delay_ms
        .saturating_mul(1u64 << attempt.min(31))
        .min(max_delay_ms)
}

// ─────────────────────────────────────────────────────────────────────────────
// Stateful counter
// ─────────────────────────────────────────────────────────────────────────────

/// Consecutive-failure counter.
///
/// The reconnect loop reads [`Backoff::current`] before sleeping, then calls
/// [`Backoff::advance`]. A successful subscribe calls [`Backoff::reset`], so
/// the next failure waits the floor again.
#[derive(Clone, Debug)]
pub struct Backoff {
    config: BackoffConfig,
    attempt: u32,
}

impl Backoff {
    /// Start at the floor.
    pub fn new(config: BackoffConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// Delay to wait before the upcoming retry.
    pub fn current(&self) -> Duration {
        Duration::from_millis(calculate_backoff_delay(
            self.attempt,
            self.config.initial_delay_ms,
            self.config.max_delay_ms,
        ))
    }

    /// Record a failure: the next delay doubles, up to the ceiling.
    pub fn advance(&mut self) {
        self.attempt = self.attempt.saturating_add(1);
    }

    /// Back to the floor.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Number of consecutive failures recorded since the last reset.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(BackoffConfig::default())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
