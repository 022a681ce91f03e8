//! Retry backoff policy for the dispatcher.

use std::time::Duration;

use rand::Rng;

/// Exponential backoff with jitter.
///
/// Delay for attempt `n` (1-based) is `base * 2^(n-1)` capped at `cap`,
/// then jittered by ±`jitter` (a fraction of the delay). Defaults follow
/// the dispatch contract: 60s base, factor 2, 900s cap, ±25%.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub base: Duration,
    pub cap: Duration,
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(60),
            cap: Duration::from_secs(900),
            jitter: 0.25,
        }
    }
}

impl RetryPolicy {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self { base, cap, jitter: 0.25 }
    }

    /// Deterministic delay for an attempt, before jitter.
    pub fn raw_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let factor = 1u64 << exponent;
        let raw = self.base.saturating_mul(factor as u32);
        raw.min(self.cap)
    }

    /// Jittered delay for an attempt (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let raw = self.raw_delay(attempt);
        if self.jitter <= 0.0 {
            return raw;
        }
        let spread = raw.as_secs_f64() * self.jitter;
        let offset = rand::thread_rng().gen_range(-spread..=spread);
        Duration::from_secs_f64((raw.as_secs_f64() + offset).max(0.0))
    }
}
