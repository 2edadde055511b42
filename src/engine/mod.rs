//! Execution engine module
//!
//! One pipeline run, strictly sequential:
//! reconcile → discover → schedule → (transform → persist) per unit.
//!
//! # Overview
//!
//! The engine module provides:
//! - `Pipeline` - Owns the connectors and drives a run
//! - `RunReport` / `RunSummary` - What a run did, returned as data
//! - `Plan` - The work a run would do, for dry runs

mod types;

pub use types::{Discovered, ItemOutcome, Plan, RunReport, RunSummary, UnitState};

use crate::config::PipelineConfig;
use crate::connector::{Discovery, DocumentStore, Transformer};
use crate::sync::{
    schedule, Ledger, PersistOutcome, PersistenceWriter, ReconcileReport, Sleeper,
    StateReconciler, TokioSleeper, TransformDriver,
};
use crate::types::WorkUnit;
use chrono::{NaiveDate, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Discover-transform-persist pipeline
pub struct Pipeline {
    config: PipelineConfig,
    discovery: Arc<dyn Discovery>,
    transformer: Arc<dyn Transformer>,
    store: Arc<dyn DocumentStore>,
    sleeper: Arc<dyn Sleeper>,
    rng: StdRng,
    run_date: NaiveDate,
}

impl Pipeline {
    /// Create a pipeline sleeping on the tokio timer with an entropy-seeded
    /// jitter source
    pub fn new(
        config: PipelineConfig,
        discovery: Arc<dyn Discovery>,
        transformer: Arc<dyn Transformer>,
        store: Arc<dyn DocumentStore>,
    ) -> Self {
        Self {
            config,
            discovery,
            transformer,
            store,
            sleeper: Arc::new(TokioSleeper),
            rng: StdRng::from_entropy(),
            run_date: Utc::now().date_naive(),
        }
    }

    /// Replace the sleeper
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Seed the backoff jitter source
    #[must_use]
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Date used when an item's publish date cannot be parsed
    #[must_use]
    pub fn with_run_date(mut self, date: NaiveDate) -> Self {
        self.run_date = date;
        self
    }

    /// Override the per-run cap
    #[must_use]
    pub fn with_max_items(mut self, max_items: Option<usize>) -> Self {
        if max_items.is_some() {
            self.config.max_items_per_run = max_items;
        }
        self
    }

    /// Get the configuration
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Rebuild processed/failed state from the store
    pub async fn reconcile(&self) -> ReconcileReport {
        StateReconciler::new(self.store.as_ref()).reconcile().await
    }

    /// Ask every source for its newest items; failing sources are skipped
    pub async fn discover(&self) -> Discovered {
        let limit = self.config.discovery.per_source_limit;
        let mut discovered = Discovered::default();

        for source in &self.config.sources {
            match self.discovery.list_recent(source, limit).await {
                Ok(items) => {
                    if items.is_empty() {
                        info!(source = %source, "No items found for source");
                    } else {
                        info!(source = %source, count = items.len(), "Discovered items");
                    }
                    discovered.sources_ok += 1;
                    discovered.items.extend(items);
                }
                Err(e) => {
                    warn!(source = %source, connector = self.discovery.name(), "Discovery failed, skipping source: {e}");
                    discovered.sources_failed.push(source.clone());
                }
            }
        }
        discovered
    }

    /// Reconcile, discover and schedule without transforming or writing
    pub async fn plan(&self) -> Plan {
        let reconcile = self.reconcile().await;
        let discovered = self.discover().await;
        let discovered_count = discovered.items.len();

        let mut units = schedule(discovered.items, &reconcile.ledger);
        let deferred = match self.config.max_items_per_run {
            Some(max) if units.len() > max => {
                let deferred = units.len() - max;
                units.truncate(max);
                info!(deferred, max, "Per-run cap reached, deferring remaining work");
                deferred
            }
            _ => 0,
        };

        Plan {
            reconcile,
            discovered: discovered_count,
            sources_failed: discovered.sources_failed,
            units,
            deferred,
        }
    }

    /// Run the pipeline once.
    ///
    /// No single item or source aborts the run; everything that went wrong
    /// is in the returned report.
    pub async fn run(&mut self) -> RunReport {
        let started = Instant::now();
        let plan = self.plan().await;

        let mut summary = RunSummary {
            discovered: plan.discovered,
            sources_failed: plan.sources_failed.len(),
            scheduled: plan.units.len(),
            retries: plan.units.iter().filter(|u| u.is_retry).count(),
            deferred: plan.deferred,
            reconcile_complete: plan.reconcile.complete,
            schema_suspect: plan.reconcile.schema_suspect,
            ..RunSummary::default()
        };
        info!(
            scheduled = summary.scheduled,
            retries = summary.retries,
            "Starting run"
        );

        let (outcomes, ledger) = self.process(plan.units, plan.reconcile.ledger).await;
        for outcome in &outcomes {
            summary.record(outcome);
        }
        summary.processed_total = ledger.processed_count();
        summary.still_failing = ledger.failed_count();
        summary.duration_ms = started.elapsed().as_millis() as u64;

        info!(
            persisted = summary.persisted(),
            skipped = summary.skipped_rate_limit,
            failed = summary.failed,
            still_failing = summary.still_failing,
            "Run complete"
        );

        RunReport {
            summary,
            outcomes,
            ledger,
        }
    }

    /// Transform and persist units in order, committing each to the ledger
    /// before moving on.
    pub async fn process(
        &mut self,
        units: Vec<WorkUnit>,
        mut ledger: Ledger,
    ) -> (Vec<ItemOutcome>, Ledger) {
        let driver = TransformDriver::new(
            self.transformer.as_ref(),
            self.sleeper.as_ref(),
            &self.config.retry,
        );
        let writer = PersistenceWriter::new(
            self.store.as_ref(),
            self.sleeper.as_ref(),
            &self.config,
            self.run_date,
        );
        let total = units.len();
        let mut outcomes = Vec::with_capacity(total);

        for (index, unit) in units.into_iter().enumerate() {
            if !ledger.needs_work(&unit) {
                info!(id = %unit.id(), "Already handled earlier in this run");
                outcomes.push(ItemOutcome {
                    id: unit.id().to_string(),
                    is_retry: unit.is_retry,
                    attempts: 0,
                    transform: None,
                    state: UnitState::AlreadyProcessed,
                });
                continue;
            }

            info!(
                id = %unit.id(),
                title = %unit.item.title,
                retry = unit.is_retry,
                "Processing {}/{}",
                index + 1,
                total
            );
            let report = driver.transform(&unit.item, &mut self.rng).await;
            let status = report.artifact.status;

            let state = match writer.persist(&unit, &report.artifact).await {
                Ok(PersistOutcome::Committed {
                    reference, created, ..
                }) => {
                    ledger.commit(unit.id(), &reference, status);
                    UnitState::Persisted {
                        reference,
                        created,
                        degraded: status.is_failure(),
                    }
                }
                Ok(PersistOutcome::SkippedRateLimit) => UnitState::SkippedRateLimit,
                Err(e) => {
                    error!(id = %unit.id(), "Failed to write to store: {e}");
                    UnitState::Failed {
                        error: e.to_string(),
                    }
                }
            };

            outcomes.push(ItemOutcome {
                id: unit.id().to_string(),
                is_retry: unit.is_retry,
                attempts: report.attempts,
                transform: Some(report.outcome),
                state,
            });
        }

        (outcomes, ledger)
    }
}
