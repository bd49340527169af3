//! Idempotent ingestion.
//!
//! [`ingest`] runs an explicit two-phase protocol against a [`Store`]:
//!
//! 1. **Read**: one bulk [`Store::list_ids`] call.
//! 2. **Write**: filter out ids already present (and repeats inside the
//!    batch), then one batched [`Store::insert`] of what is left.
//!
//! The two phases are not atomic. Two ingestors racing on overlapping
//! records can both decide an id is new and both insert it; stores whose
//! [`Store::idempotent_insert`] is `true` absorb that as an upsert of
//! identical content. Stores that would keep a duplicate must be fed through
//! an external per-collection lock.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::error::Result;
use crate::models::Record;
use crate::store::Store;

/// Outcome of one [`ingest`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Records handed to `ingest`.
    pub received: usize,
    /// Records written by this call.
    pub inserted: usize,
    /// Records skipped because the store already held their id.
    pub already_present: usize,
    /// Records skipped because an earlier record in the same batch had
    /// the same id.
    pub duplicate_in_batch: usize,
}

/// Insert every record whose id the store does not hold yet.
///
/// Returns a report whose `inserted` field is the number of records written.
/// If the store is unreachable the call fails with `StoreUnavailable` and
/// nothing is inserted.
pub async fn ingest<S: Store + ?Sized>(store: &S, records: &[Record]) -> Result<IngestReport> {
    let existing = store.list_ids().await?;

    let mut report = IngestReport {
        received: records.len(),
        ..IngestReport::default()
    };

    let mut batch_ids: HashSet<&str> = HashSet::new();
    let mut fresh: Vec<Record> = Vec::new();
    for record in records {
        if existing.contains(&record.id) {
            report.already_present += 1;
        } else if !batch_ids.insert(record.id.as_str()) {
            report.duplicate_in_batch += 1;
        } else {
            fresh.push(record.clone());
        }
    }

    if fresh.is_empty() {
        if records.is_empty() {
            debug!(store = store.name(), "nothing to ingest");
        } else {
            info!(
                store = store.name(),
                received = report.received,
                "store already holds every record"
            );
        }
        return Ok(report);
    }

    store.insert(&fresh).await?;
    report.inserted = fresh.len();

    info!(
        store = store.name(),
        received = report.received,
        inserted = report.inserted,
        already_present = report.already_present,
        duplicate_in_batch = report.duplicate_in_batch,
        "ingested records"
    );

    Ok(report)
}
