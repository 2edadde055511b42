//! State Reconciler
//!
//! There is no local state file: what has been processed is whatever the
//! destination store says. Reconciling pages through every record once per
//! run and decodes each record's status text into success or failure.

use crate::connector::DocumentStore;
use crate::types::{ArtifactStatus, StoreRecord, WorkUnit};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

// ============================================================================
// Ledger
// ============================================================================

/// Processed and failed identifiers for one run.
///
/// Owned by the run and threaded through scheduling and commits; it only
/// changes after a work unit has fully committed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Ledger {
    processed: BTreeSet<String>,
    failed: BTreeMap<String, String>,
}

impl Ledger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one store record in; records without an identifier are ignored
    pub fn observe(&mut self, record: &StoreRecord) -> bool {
        let Some(id) = record.identifier.as_deref() else {
            return false;
        };
        self.processed.insert(id.to_string());
        let status = ArtifactStatus::decode(record.status_text.as_deref().unwrap_or_default());
        if status.is_failure() {
            self.failed.insert(id.to_string(), record.reference.clone());
        }
        true
    }

    /// Record a committed work unit
    pub fn commit(&mut self, id: &str, reference: &str, status: ArtifactStatus) {
        self.processed.insert(id.to_string());
        if status.is_failure() {
            self.failed.insert(id.to_string(), reference.to_string());
        } else {
            self.failed.remove(id);
        }
    }

    /// Whether a unit still has work to do given commits made so far.
    ///
    /// A new item is done once any record exists; a retry is done once its
    /// record no longer reads as failed.
    pub fn needs_work(&self, unit: &WorkUnit) -> bool {
        if unit.is_retry {
            self.is_failed(unit.id())
        } else {
            !self.is_processed(unit.id())
        }
    }

    /// Whether a record exists for `id`
    pub fn is_processed(&self, id: &str) -> bool {
        self.processed.contains(id)
    }

    /// Whether the record for `id` is marked failed
    pub fn is_failed(&self, id: &str) -> bool {
        self.failed.contains_key(id)
    }

    /// Store reference of a failed record
    pub fn failed_reference(&self, id: &str) -> Option<&str> {
        self.failed.get(id).map(String::as_str)
    }

    /// Failed identifiers with their store references, ordered by identifier
    pub fn failed(&self) -> impl Iterator<Item = (&str, &str)> {
        self.failed.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// All processed identifiers
    pub fn processed(&self) -> impl Iterator<Item = &str> {
        self.processed.iter().map(String::as_str)
    }

    /// Number of processed identifiers
    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }

    /// Number of failed identifiers
    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }
}

// ============================================================================
// Reconciler
// ============================================================================

/// Result of reconciling against the store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Reconstructed state
    pub ledger: Ledger,
    /// Pages read
    pub pages: usize,
    /// Records seen across all pages
    pub records_seen: usize,
    /// Records skipped because no identifier could be extracted
    pub skipped_records: usize,
    /// Records with no status field at all
    pub records_without_status: usize,
    /// False when the store failed before the last page
    pub complete: bool,
    /// True when the store looks populated but the schema yields nothing
    pub schema_suspect: bool,
}

/// Rebuilds processed/failed state from the destination store
pub struct StateReconciler<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> StateReconciler<'a> {
    /// Create a reconciler over a store
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    /// Page through the whole store.
    ///
    /// Never fails: if the store errors, what was read so far is returned
    /// with `complete = false`, and the run treats the rest as unprocessed.
    pub async fn reconcile(&self) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        let mut cursor: Option<String> = None;

        loop {
            let page = match self.store.query(cursor.as_deref()).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(
                        pages_read = report.pages,
                        "Store query failed, continuing with partial state: {e}"
                    );
                    return self.finish(report);
                }
            };
            report.pages += 1;
            if page.malformed > 0 {
                warn!(
                    count = page.malformed,
                    page = report.pages,
                    "Skipping undecodable store entries"
                );
                report.records_seen += page.malformed;
                report.skipped_records += page.malformed;
            }

            for record in &page.records {
                report.records_seen += 1;
                if record.status_text.is_none() {
                    report.records_without_status += 1;
                }
                if !report.ledger.observe(record) {
                    debug!(reference = %record.reference, "Skipping record without identifier");
                    report.skipped_records += 1;
                }
            }

            if !page.has_more {
                report.complete = true;
                break;
            }
            match page.next_cursor {
                Some(next) if cursor.as_deref() != Some(next.as_str()) => cursor = Some(next),
                Some(_) => {
                    warn!("Store returned the same cursor twice, stopping pagination");
                    break;
                }
                None => {
                    warn!("Store reported more pages without a cursor, stopping pagination");
                    break;
                }
            }
        }

        self.finish(report)
    }

    fn finish(&self, mut report: ReconcileReport) -> ReconcileReport {
        let identified = report.records_seen - report.skipped_records;
        if report.records_seen > 0
            && (identified == 0 || report.records_without_status == report.records_seen)
        {
            report.schema_suspect = true;
            warn!(
                records = report.records_seen,
                skipped = report.skipped_records,
                without_status = report.records_without_status,
                "Store records are missing the identifier or status property; \
                 check the configured property names"
            );
        }
        info!(
            processed = report.ledger.processed_count(),
            failed = report.ledger.failed_count(),
            pages = report.pages,
            complete = report.complete,
            "Reconciled state from store"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryStore;
    use proptest::prelude::*;

    fn record(id: Option<&str>, status: Option<&str>, reference: &str) -> StoreRecord {
        StoreRecord {
            reference: reference.to_string(),
            identifier: id.map(ToString::to_string),
            status_text: status.map(ToString::to_string),
        }
    }

    #[test]
    fn test_ledger_observe_and_commit() {
        let mut ledger = Ledger::new();
        assert!(ledger.observe(&record(Some("a"), Some("fine"), "p-a")));
        assert!(ledger.observe(&record(Some("b"), Some("Error: boom"), "p-b")));
        assert!(!ledger.observe(&record(None, Some("Error"), "p-x")));

        assert!(ledger.is_processed("a"));
        assert!(!ledger.is_failed("a"));
        assert_eq!(ledger.failed_reference("b"), Some("p-b"));

        ledger.commit("b", "p-b", ArtifactStatus::Success);
        assert!(!ledger.is_failed("b"));
        ledger.commit("c", "p-c", ArtifactStatus::OtherError);
        assert_eq!(ledger.failed_reference("c"), Some("p-c"));
        assert_eq!(ledger.processed_count(), 3);
    }

    #[test]
    fn test_needs_work() {
        use crate::types::Item;

        let mut ledger = Ledger::new();
        let fresh = WorkUnit::new(Item::placeholder("n"));
        let retry = WorkUnit::retry(Item::placeholder("r"), "p-r");
        ledger.commit("r", "p-r", ArtifactStatus::OtherError);
        assert!(ledger.needs_work(&fresh));
        assert!(ledger.needs_work(&retry));

        ledger.commit("n", "p-n", ArtifactStatus::OtherError);
        ledger.commit("r", "p-r", ArtifactStatus::Success);
        assert!(!ledger.needs_work(&fresh));
        assert!(!ledger.needs_work(&retry));
    }

    #[tokio::test]
    async fn test_reconcile_across_pages() {
        let store = MemoryStore::with_page_size(2);
        store.seed("v1", "Nice summary", &["body"]);
        store.seed("v2", "Transcription failed.", &[]);
        store.seed("v3", "Rate limit exceeded.", &[]);
        store.seed("v4", "All good", &["x", "y"]);
        store.seed_raw(None, Some("Error: orphan"));

        let report = StateReconciler::new(&store).reconcile().await;
        assert_eq!(report.pages, 3);
        assert!(report.complete);
        assert_eq!(report.records_seen, 5);
        assert_eq!(report.skipped_records, 1);
        assert_eq!(report.ledger.processed_count(), 4);
        let failed: Vec<&str> = report.ledger.failed().map(|(id, _)| id).collect();
        assert_eq!(failed, vec!["v2", "v3"]);
        assert!(!report.schema_suspect);
    }

    #[tokio::test]
    async fn test_store_unavailable_keeps_partial_state() {
        let store = MemoryStore::with_page_size(1);
        store.seed("v1", "ok", &[]);
        store.seed("v2", "Error: x", &[]);
        store.seed("v3", "ok", &[]);
        store.fail_queries_after(2);

        let report = StateReconciler::new(&store).reconcile().await;
        assert!(!report.complete);
        assert_eq!(report.pages, 2);
        assert_eq!(report.ledger.processed_count(), 2);
        assert!(report.ledger.is_failed("v2"));
    }

    #[tokio::test]
    async fn test_store_down_from_start_is_empty() {
        let store = MemoryStore::new();
        store.fail_queries_after(0);
        let report = StateReconciler::new(&store).reconcile().await;
        assert_eq!(report.ledger, Ledger::new());
        assert!(!report.complete);
    }

    #[tokio::test]
    async fn test_undecodable_entries_do_not_stop_paging() {
        let store = MemoryStore::with_page_size(1);
        store.seed("v1", "ok", &[]);
        store.seed("v2", "Error: x", &[]);
        store.malformed_per_page(1);

        let report = StateReconciler::new(&store).reconcile().await;
        assert!(report.complete);
        assert_eq!(report.pages, 2);
        assert_eq!(report.records_seen, 4);
        assert_eq!(report.skipped_records, 2);
        assert_eq!(report.ledger.processed_count(), 2);
        assert!(report.ledger.is_failed("v2"));
    }

    #[tokio::test]
    async fn test_schema_mismatch_is_flagged() {
        let store = MemoryStore::new();
        store.seed_raw(None, None);
        store.seed_raw(None, None);
        let report = StateReconciler::new(&store).reconcile().await;
        assert!(report.schema_suspect);
        assert_eq!(report.ledger.processed_count(), 0);
    }

    proptest! {
        #[test]
        fn reconcile_is_independent_of_page_size(
            statuses in proptest::collection::vec(any::<bool>(), 0..40),
            page_size in 1usize..12,
        ) {
            let store = MemoryStore::with_page_size(page_size);
            for (i, failed) in statuses.iter().enumerate() {
                let text = if *failed { "Error: nope" } else { "summary" };
                store.seed(&format!("id-{i}"), text, &[]);
            }
            let expected_failed = statuses.iter().filter(|f| **f).count();

            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let report = runtime.block_on(StateReconciler::new(&store).reconcile());

            prop_assert_eq!(report.ledger.failed_count(), expected_failed);
            prop_assert_eq!(report.ledger.processed_count(), statuses.len());
            prop_assert!(report.complete);
        }
    }
}
