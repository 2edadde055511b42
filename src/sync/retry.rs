//! Transform-and-Retry Driver
//!
//! Every call is preceded by the fixed throttle delay. Only rate-limit
//! failures are retried, with exponential backoff; any other error degrades
//! the item immediately. The driver never fails: exhausted or terminal
//! errors become failure artifacts.

use super::backoff::BackoffController;
use super::sleep::{SleepReason, Sleeper};
use crate::config::RetryPolicy;
use crate::connector::Transformer;
use crate::types::{Artifact, Item};
use rand::Rng;
use serde::Serialize;
use tracing::{debug, warn};

/// How a transformation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverOutcome {
    /// The connector produced output
    Succeeded,
    /// Still rate limited after every allowed retry
    DegradedRateLimit,
    /// A non-retryable error
    DegradedError,
}

/// Artifact plus what it took to get it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformReport {
    /// Resulting artifact
    pub artifact: Artifact,
    /// Connector calls made
    pub attempts: u32,
    /// Backoff sleeps taken
    pub backoff_sleeps: u32,
    /// Final state
    pub outcome: DriverOutcome,
}

/// Drives one item through the transformation connector
pub struct TransformDriver<'a> {
    transformer: &'a dyn Transformer,
    sleeper: &'a dyn Sleeper,
    backoff: BackoffController,
    policy: RetryPolicy,
}

impl<'a> TransformDriver<'a> {
    /// Create a driver
    pub fn new(
        transformer: &'a dyn Transformer,
        sleeper: &'a dyn Sleeper,
        policy: &RetryPolicy,
    ) -> Self {
        Self {
            transformer,
            sleeper,
            backoff: BackoffController::from_policy(policy),
            policy: policy.clone(),
        }
    }

    /// Transform `item`, retrying rate-limit failures.
    ///
    /// A connector that is rate limited `max_attempts` times and then
    /// succeeds yields a success after exactly `max_attempts` backoff sleeps.
    pub async fn transform<R>(&self, item: &Item, rng: &mut R) -> TransformReport
    where
        R: Rng + Send + ?Sized,
    {
        let mut attempt: u32 = 0;
        let mut calls: u32 = 0;

        loop {
            self.sleeper
                .sleep(SleepReason::Throttle, self.policy.throttle())
                .await;
            calls += 1;

            match self.transformer.transform(item).await {
                Ok(output) => {
                    debug!(id = %item.id, attempts = calls, "Transformation succeeded");
                    return TransformReport {
                        artifact: Artifact::success(output.summary, output.content),
                        attempts: calls,
                        backoff_sleeps: attempt,
                        outcome: DriverOutcome::Succeeded,
                    };
                }
                Err(e) if e.is_rate_limited() && attempt < self.policy.max_attempts => {
                    let delay = self.backoff.delay(attempt, rng);
                    warn!(
                        id = %item.id,
                        attempt = attempt + 1,
                        max_attempts = self.policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Rate limited, backing off"
                    );
                    self.sleeper.sleep(SleepReason::Backoff, delay).await;
                    attempt += 1;
                }
                Err(e) if e.is_rate_limited() => {
                    warn!(id = %item.id, attempts = calls, "Rate limit persisted, giving up for this run");
                    return TransformReport {
                        artifact: Artifact::rate_limited(&e),
                        attempts: calls,
                        backoff_sleeps: attempt,
                        outcome: DriverOutcome::DegradedRateLimit,
                    };
                }
                Err(e) => {
                    warn!(id = %item.id, error = %e, "Transformation failed");
                    return TransformReport {
                        artifact: Artifact::failed(&e),
                        attempts: calls,
                        backoff_sleeps: attempt,
                        outcome: DriverOutcome::DegradedError,
                    };
                }
            }
        }
    }
}
