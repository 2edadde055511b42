//! Backoff Controller
//!
//! `delay(n) = base * 2^n + uniform(0, jitter)`. The random source is a
//! parameter so callers can seed it.

use crate::config::RetryPolicy;
use rand::Rng;
use std::time::Duration;

/// Exponential backoff with additive uniform jitter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffController {
    base: Duration,
    jitter: Duration,
}

impl BackoffController {
    /// Create a controller from a base delay and a jitter unit
    pub fn new(base: Duration, jitter: Duration) -> Self {
        Self { base, jitter }
    }

    /// Create a controller from a retry policy
    pub fn from_policy(policy: &RetryPolicy) -> Self {
        Self::new(policy.base_delay(), policy.jitter())
    }

    /// Deterministic part of the delay: `base * 2^attempt`, saturating
    pub fn floor(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor)
    }

    /// Delay before the attempt after `attempt`.
    ///
    /// Always in `[floor(attempt), floor(attempt) + jitter)`; with a zero
    /// jitter unit it is exactly `floor(attempt)`.
    pub fn delay<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let floor = self.floor(attempt);
        let jitter_nanos = u64::try_from(self.jitter.as_nanos()).unwrap_or(u64::MAX);
        if jitter_nanos == 0 {
            return floor;
        }
        let extra = rng.gen_range(0..jitter_nanos);
        floor.saturating_add(Duration::from_nanos(extra))
    }
}
