//! In-memory [`Store`] implementation for tests and throwaway sessions.
//!
//! Records live in insertion order behind a `std::sync::RwLock`. Queries are
//! scored with Okapi BM25 over [`terms`]; only records sharing at least one
//! term with the query are returned. Ties keep insertion order.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{RagError, Result};
use crate::models::Record;

use super::{terms, QueryResponse, RawHit, Store};

const BM25_K1: f64 = 1.2;
const BM25_B: f64 = 0.75;

struct StoredRecord {
    record: Record,
    term_freq: HashMap<String, usize>,
    len: usize,
}

impl StoredRecord {
    fn new(record: Record) -> Self {
        let tokens = terms(&record.text);
        let mut term_freq = HashMap::new();
        for t in &tokens {
            *term_freq.entry(t.clone()).or_insert(0) += 1;
        }
        Self {
            record,
            term_freq,
            len: tokens.len(),
        }
    }
}

#[derive(Default)]
struct Inner {
    records: Vec<StoredRecord>,
    positions: HashMap<String, usize>,
}

/// In-memory store; insert is an idempotent upsert keyed by id.
pub struct InMemoryStore {
    name: String,
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::named("memory")
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Snapshot of the stored records in insertion order.
    pub fn records(&self) -> Result<Vec<Record>> {
        let inner = self.inner.read().map_err(|_| poisoned())?;
        Ok(inner.records.iter().map(|s| s.record.clone()).collect())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> RagError {
    RagError::StoreUnavailable("in-memory store lock poisoned".to_string())
}

#[async_trait]
impl Store for InMemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_ids(&self) -> Result<HashSet<String>> {
        let inner = self.inner.read().map_err(|_| poisoned())?;
        Ok(inner.positions.keys().cloned().collect())
    }

    async fn exists(&self, id: &str) -> Result<bool> {
        let inner = self.inner.read().map_err(|_| poisoned())?;
        Ok(inner.positions.contains_key(id))
    }

    async fn insert(&self, batch: &[Record]) -> Result<()> {
        let mut inner = self.inner.write().map_err(|_| poisoned())?;
        for record in batch {
            let stored = StoredRecord::new(record.clone());
            match inner.positions.get(&record.id).copied() {
                // Last write wins, position is kept.
                Some(pos) => inner.records[pos] = stored,
                None => {
                    let pos = inner.records.len();
                    inner.positions.insert(record.id.clone(), pos);
                    inner.records.push(stored);
                }
            }
        }
        Ok(())
    }

    async fn query(&self, text: &str, k: usize) -> Result<QueryResponse> {
        let inner = self.inner.read().map_err(|_| poisoned())?;

        let mut query_terms = terms(text);
        let mut seen = HashSet::new();
        query_terms.retain(|t| seen.insert(t.clone()));

        if query_terms.is_empty() || inner.records.is_empty() || k == 0 {
            return Ok(QueryResponse::Flat(Vec::new()));
        }

        let n = inner.records.len() as f64;
        let avg_len = inner.records.iter().map(|s| s.len).sum::<usize>() as f64 / n;

        let idf: Vec<f64> = query_terms
            .iter()
            .map(|t| {
                let df = inner
                    .records
                    .iter()
                    .filter(|s| s.term_freq.contains_key(t))
                    .count() as f64;
                (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
            })
            .collect();

        let mut scored: Vec<(f64, &StoredRecord)> = inner
            .records
            .iter()
            .filter_map(|s| {
                let len_norm = if avg_len > 0.0 {
                    s.len as f64 / avg_len
                } else {
                    1.0
                };
                let score: f64 = query_terms
                    .iter()
                    .zip(idf.iter())
                    .map(|(t, idf)| {
                        let tf = s.term_freq.get(t).copied().unwrap_or(0) as f64;
                        idf * tf * (BM25_K1 + 1.0)
                            / (tf + BM25_K1 * (1.0 - BM25_B + BM25_B * len_norm))
                    })
                    .sum();
                (score > 0.0).then_some((score, s))
            })
            .collect();

        // Stable: equal scores keep insertion order.
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(k);

        Ok(QueryResponse::Flat(
            scored
                .into_iter()
                .map(|(score, s)| RawHit {
                    id: s.record.id.clone(),
                    text: Some(s.record.text.clone()),
                    metadata: Some(s.record.metadata.clone()),
                    score: Some(score),
                })
                .collect(),
        ))
    }

    async fn count(&self) -> Result<usize> {
        let inner = self.inner.read().map_err(|_| poisoned())?;
        Ok(inner.records.len())
    }
}
