//! Engine types
//!
//! Per-item outcomes and run-level summaries returned by the pipeline.

use crate::sync::{DriverOutcome, Ledger, ReconcileReport};
use crate::types::WorkUnit;
use serde::Serialize;
use std::fmt;

/// Terminal state of one work unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum UnitState {
    /// The artifact was written to the store
    Persisted {
        /// Store reference of the record
        reference: String,
        /// Whether the record was newly created
        created: bool,
        /// Whether the written artifact records a failure
        degraded: bool,
    },
    /// Rate limited until attempts ran out; nothing was written
    SkippedRateLimit,
    /// The store write itself failed
    Failed {
        /// Error message
        error: String,
    },
    /// An earlier unit in this run already took care of the item
    AlreadyProcessed,
}

/// What happened to one work unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemOutcome {
    /// Item identifier
    pub id: String,
    /// Whether this was a retry of a failed record
    pub is_retry: bool,
    /// Transformation calls made
    pub attempts: u32,
    /// How transformation ended, if it ran
    pub transform: Option<DriverOutcome>,
    /// Final state
    pub state: UnitState,
}

/// Discovery results for one run
#[derive(Debug, Clone, Default)]
pub struct Discovered {
    /// Items across all sources, in source order
    pub items: Vec<crate::types::Item>,
    /// Sources that answered
    pub sources_ok: usize,
    /// Sources that errored and were skipped
    pub sources_failed: Vec<String>,
}

/// The work a run would do, without doing it
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    /// State read from the store
    pub reconcile: ReconcileReport,
    /// Items discovered this run
    pub discovered: usize,
    /// Sources that errored and were skipped
    pub sources_failed: Vec<String>,
    /// Ordered work list
    pub units: Vec<WorkUnit>,
    /// Units beyond the per-run cap, left for a later run
    pub deferred: usize,
}

/// Counts for the run-end summary
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Items discovered across sources
    pub discovered: usize,
    /// Sources skipped because discovery failed
    pub sources_failed: usize,
    /// Work units scheduled
    pub scheduled: usize,
    /// Scheduled units that were retries
    pub retries: usize,
    /// Units left for a later run by the per-run cap
    pub deferred: usize,
    /// Records created
    pub created: usize,
    /// Records updated in place
    pub updated: usize,
    /// Persisted units whose artifact records a failure
    pub degraded: usize,
    /// Units not written because of rate limiting
    pub skipped_rate_limit: usize,
    /// Units whose store write failed
    pub failed: usize,
    /// Identifiers in the store at the end of the run
    pub processed_total: usize,
    /// Identifiers still marked failed at the end of the run
    pub still_failing: usize,
    /// Whether reconciliation read every page
    pub reconcile_complete: bool,
    /// Whether the store schema looked wrong
    pub schema_suspect: bool,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
}

impl RunSummary {
    /// Units whose artifact made it into the store
    pub fn persisted(&self) -> usize {
        self.created + self.updated
    }

    /// Count one unit outcome
    pub fn record(&mut self, outcome: &ItemOutcome) {
        match &outcome.state {
            UnitState::Persisted {
                created, degraded, ..
            } => {
                if *created {
                    self.created += 1;
                } else {
                    self.updated += 1;
                }
                if *degraded {
                    self.degraded += 1;
                }
            }
            UnitState::SkippedRateLimit => self.skipped_rate_limit += 1,
            UnitState::Failed { .. } => self.failed += 1,
            UnitState::AlreadyProcessed => {}
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Discovered {} items ({} sources failed), scheduled {} ({} retries, {} deferred)",
            self.discovered, self.sources_failed, self.scheduled, self.retries, self.deferred
        )?;
        writeln!(
            f,
            "Persisted {} ({} created, {} updated, {} recorded as failed)",
            self.persisted(),
            self.created,
            self.updated,
            self.degraded
        )?;
        writeln!(
            f,
            "Skipped {} rate limited, {} store write failures",
            self.skipped_rate_limit, self.failed
        )?;
        write!(
            f,
            "Store now holds {} items, {} still failing",
            self.processed_total, self.still_failing
        )?;
        if !self.reconcile_complete {
            write!(f, "\nWarning: store state was only partially read")?;
        }
        if self.schema_suspect {
            write!(f, "\nWarning: store records did not match the configured properties")?;
        }
        Ok(())
    }
}

/// Everything a run produced
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Run-end counts
    pub summary: RunSummary,
    /// Per-unit outcomes in processing order
    pub outcomes: Vec<ItemOutcome>,
    /// State after the last commit
    pub ledger: Ledger,
}
