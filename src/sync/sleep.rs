//! Suspension points

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Why the pipeline is pausing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SleepReason {
    /// Fixed delay before every transformation call
    Throttle,
    /// Backoff after a rate-limited transformation
    Backoff,
    /// Pause between successive append calls to the store
    AppendPause,
}

/// Something that can wait
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Suspend for `duration`
    async fn sleep(&self, reason: SleepReason, duration: Duration);
}

/// Sleeps on the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, reason: SleepReason, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        debug!(?reason, ?duration, "sleeping");
        tokio::time::sleep(duration).await;
    }
}
