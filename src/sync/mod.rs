//! Synchronization and retry engine
//!
//! The building blocks of one pipeline run, leaf-first:
//! - `backoff` - exponential backoff with injected jitter
//! - `fragment` - lossless text fragmentation and write batching
//! - `reconcile` - rebuilds processed/failed state from the store
//! - `schedule` - merges discovery with reconciled state into work units
//! - `retry` - drives one transformation with throttle and backoff
//! - `persist` - writes an artifact as a new or updated record
//!
//! Suspension points go through [`Sleeper`] so tests can observe them
//! without waiting.

mod backoff;
mod fragment;
mod persist;
mod reconcile;
mod retry;
mod schedule;
mod sleep;

pub use backoff::BackoffController;
pub use fragment::{batch, fragment, truncate_summary, Batches};
pub use persist::{PersistOutcome, PersistenceWriter};
pub use reconcile::{Ledger, ReconcileReport, StateReconciler};
pub use retry::{DriverOutcome, TransformDriver, TransformReport};
pub use schedule::schedule;
pub use sleep::{SleepReason, Sleeper, TokioSleeper};
