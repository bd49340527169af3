//! Ingestion pipeline orchestration.
//!
//! Coordinates one ingest run: connector → normalization → idempotent
//! insert. Malformed source items are skipped with a warning; the rest of
//! the batch still goes in.
//!
//! Stores whose insert is not an idempotent upsert are fed through an
//! [`IngestGate`], which serializes ingestion per collection so that two
//! concurrent runs cannot both insert the same id.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use anyhow::{bail, Result};
use tracing::{info, warn};

use ragchat_core::ingest::{ingest, IngestReport};
use ragchat_core::models::{ExtractBatch, Record};
use ragchat_core::normalize::normalize_all;
use ragchat_core::store::Store;

use crate::config::Config;
use crate::connector_fs;
use crate::connector_git;
use crate::faq;
use crate::sqlite_store::SqliteStore;

/// Connector names accepted by `ragchat ingest`.
pub const CONNECTORS: &[&str] = &["faq", "docs", "commits"];

/// Per-collection async locks for stores without idempotent insert.
#[derive(Default)]
pub struct IngestGate {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl IngestGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide gate shared by every ingest run.
    pub fn global() -> &'static IngestGate {
        static GATE: OnceLock<IngestGate> = OnceLock::new();
        GATE.get_or_init(IngestGate::new)
    }

    fn lock_for(&self, collection: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(collection.to_string())
            .or_default()
            .clone()
    }
}

/// Ingest `records`, holding the collection's gate when the store cannot
/// absorb duplicate inserts by itself.
pub async fn ingest_exclusive<S: Store + ?Sized>(
    gate: &IngestGate,
    store: &S,
    records: &[Record],
) -> ragchat_core::Result<IngestReport> {
    if store.idempotent_insert() {
        return ingest(store, records).await;
    }

    let lock = gate.lock_for(store.name());
    let _guard = lock.lock().await;
    ingest(store, records).await
}

/// Run a connector and return its extracted items.
pub fn extract(config: &Config, connector: &str) -> Result<ExtractBatch> {
    let batch = match connector {
        "faq" => faq::scan_faq(config.connectors.faq.as_ref())?,
        "docs" => {
            let docs = config
                .connectors
                .docs
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("Docs connector not configured"))?;
            connector_fs::scan_docs(docs, config.chunking.max_tokens)?
        }
        "commits" => {
            let git = config
                .connectors
                .git
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("Git connector not configured"))?;
            connector_git::scan_commits(git)?
        }
        _ => bail!(
            "Unknown connector: '{}'. Available: {}",
            connector,
            CONNECTORS.join(", ")
        ),
    };

    for err in &batch.skipped {
        warn!(connector, error = %err, "skipped source item");
    }
    Ok(batch)
}

/// Normalize a batch and ingest it into `store`.
pub async fn ingest_batch<S: Store + ?Sized>(store: &S, batch: &ExtractBatch) -> Result<IngestReport> {
    let records = normalize_all(&batch.items);
    let report = ingest_exclusive(IngestGate::global(), store, &records).await?;
    Ok(report)
}

pub async fn run_ingest(config: &Config, connector: &str, dry_run: bool) -> Result<()> {
    let batch = extract(config, connector)?;

    if dry_run {
        println!("ingest {} (dry-run)", connector);
        println!("  items found: {}", batch.items.len());
        println!("  skipped: {}", batch.skipped.len());
        return Ok(());
    }

    let store = SqliteStore::open(config).await?;
    let report = ingest_batch(&store, &batch).await?;

    info!(
        connector,
        collection = store.collection(),
        inserted = report.inserted,
        "ingest finished"
    );

    println!("ingest {}", connector);
    println!("  extracted: {} items", batch.items.len());
    println!("  skipped: {}", batch.skipped.len());
    println!("  inserted: {}", report.inserted);
    println!("  already present: {}", report.already_present);
    if report.duplicate_in_batch > 0 {
        println!("  duplicates in batch: {}", report.duplicate_in_batch);
    }
    println!("  total records: {}", store.count().await?);
    println!("ok");

    store.pool().close().await;
    Ok(())
}
