//! Work scheduling
//!
//! Merges this run's discovery results with the reconciled ledger. Failed
//! records are retried first, then new items in discovery order.

use super::reconcile::Ledger;
use crate::types::{Item, WorkUnit};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Build the ordered work list for one run.
///
/// Discovered items are deduplicated by identifier, keeping the first
/// occurrence. Every failed identifier becomes a retry unit, using the
/// discovered metadata when this run saw the item again and placeholder
/// metadata otherwise. Items already in the store are skipped.
pub fn schedule(discovered: Vec<Item>, ledger: &Ledger) -> Vec<WorkUnit> {
    let mut seen = HashSet::new();
    let mut fresh = Vec::new();
    let mut known: HashMap<String, Item> = HashMap::new();

    for item in discovered {
        if !seen.insert(item.id.clone()) {
            debug!(id = %item.id, "Dropping duplicate discovery result");
            continue;
        }
        if ledger.is_failed(&item.id) {
            known.insert(item.id.clone(), item);
        } else if ledger.is_processed(&item.id) {
            debug!(id = %item.id, "Already processed");
        } else {
            fresh.push(item);
        }
    }

    let mut units: Vec<WorkUnit> = ledger
        .failed()
        .map(|(id, reference)| {
            let item = known
                .remove(id)
                .unwrap_or_else(|| Item::placeholder(id));
            WorkUnit::retry(item, reference)
        })
        .collect();
    units.extend(fresh.into_iter().map(WorkUnit::new));
    units
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ArtifactStatus, StoreRecord};
    use pretty_assertions::assert_eq;

    fn item(id: &str) -> Item {
        Item::new(id, format!("title {id}"), "chan", "2024-01-01T00:00:00Z")
    }

    fn ledger(records: &[(&str, &str)]) -> Ledger {
        let mut ledger = Ledger::new();
        for (id, status) in records {
            ledger.observe(&StoreRecord {
                reference: format!("page-{id}"),
                identifier: Some((*id).to_string()),
                status_text: Some((*status).to_string()),
            });
        }
        ledger
    }

    fn ids(units: &[WorkUnit]) -> Vec<&str> {
        units.iter().map(WorkUnit::id).collect()
    }

    #[test]
    fn test_duplicates_keep_first_occurrence() {
        let mut first = item("A");
        first.title = "first".to_string();
        let mut dup = item("A");
        dup.title = "second".to_string();

        let units = schedule(vec![first, item("B"), dup], &Ledger::new());
        assert_eq!(ids(&units), vec!["A", "B"]);
        assert_eq!(units[0].item.title, "first");
        assert!(units.iter().all(|u| !u.is_retry));
    }

    #[test]
    fn test_retries_come_first_with_placeholder_metadata() {
        let ledger = ledger(&[("X", "Transcription failed."), ("Z", "fine")]);
        let units = schedule(vec![item("Y"), item("Z")], &ledger);

        assert_eq!(ids(&units), vec!["X", "Y"]);
        assert!(units[0].is_retry);
        assert_eq!(units[0].store_reference.as_deref(), Some("page-X"));
        assert_eq!(units[0].item, Item::placeholder("X"));
        assert!(!units[1].is_retry);
    }

    #[test]
    fn test_rediscovered_failure_keeps_real_metadata() {
        let ledger = ledger(&[("X", "Rate limit exceeded.")]);
        let units = schedule(vec![item("X")], &ledger);

        assert_eq!(units.len(), 1);
        assert!(units[0].is_retry);
        assert_eq!(units[0].item.title, "title X");
    }

    #[test]
    fn test_nothing_to_do() {
        let mut ledger = ledger(&[("A", "ok")]);
        ledger.commit("B", "page-B", ArtifactStatus::Success);
        assert!(schedule(vec![item("A"), item("B")], &ledger).is_empty());
        assert!(schedule(Vec::new(), &Ledger::new()).is_empty());
    }
}
