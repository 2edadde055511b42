//! Rate limiting implementation
//!
//! Uses the governor crate for token bucket rate limiting. Quotas are
//! expressed as "N requests per period" so services with sub-1/s budgets
//! (or the store's ~3/s average) can be described exactly.

use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as Governor};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for rate limiting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimiterConfig {
    /// Requests allowed per `per`
    pub max_requests: u32,
    /// Replenishment period for `max_requests`
    pub per: Duration,
    /// Burst size (max tokens in bucket)
    pub burst: u32,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self::per_second(10)
    }
}

impl RateLimiterConfig {
    /// Create a new rate limiter config
    pub fn new(max_requests: u32, per: Duration, burst: u32) -> Self {
        Self {
            max_requests,
            per,
            burst,
        }
    }

    /// `n` requests per second with a burst of `n`
    pub fn per_second(n: u32) -> Self {
        Self::new(n, Duration::from_secs(1), n)
    }

    /// Document store budget: an average of three requests per second
    pub fn document_store() -> Self {
        Self::per_second(3)
    }

    /// Interval between replenished tokens
    pub fn replenish_interval(&self) -> Duration {
        let n = self.max_requests.max(1);
        let interval = self.per / n;
        if interval.is_zero() {
            Duration::from_nanos(1)
        } else {
            interval
        }
    }
}

/// Token bucket rate limiter
#[derive(Clone)]
pub struct RateLimiter {
    limiter: Arc<Governor<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>>,
}

impl RateLimiter {
    /// Create a new rate limiter with the given config
    pub fn new(config: &RateLimiterConfig) -> Self {
        let burst = NonZeroU32::new(config.burst).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::with_period(config.replenish_interval())
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
            .allow_burst(burst);

        Self {
            limiter: Arc::new(Governor::direct(quota)),
        }
    }

    /// Wait until a request can be made
    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }

    /// Try to acquire a permit, returning immediately
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(&RateLimiterConfig::default())
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter").finish()
    }
}
