//! Storage abstraction for ragchat.
//!
//! The [`Store`] trait is the only thing the ingestion and retrieval engines
//! know about a backend. It says nothing about how similarity is computed:
//! dense embeddings, sparse term matching, or a hybrid all fit behind
//! [`Store::query`].
//!
//! Implementations must be `Send + Sync` so that several sessions can share
//! one store through an `Arc<dyn Store>`.

pub mod memory;

use std::collections::HashSet;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Metadata, Record};

/// One hit as reported by a backend, before normalization.
///
/// Backends differ in which fields they fill in, so everything but the id
/// is optional.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawHit {
    pub id: String,
    pub text: Option<String>,
    pub metadata: Option<Metadata>,
    /// Similarity, higher is better.
    pub score: Option<f64>,
}

impl RawHit {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

/// The shapes a backend query result comes back in.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResponse {
    /// The backend answered with no payload at all (null / `None`).
    Missing,
    /// A single ranked list.
    Flat(Vec<RawHit>),
    /// One ranked list per query text, as batch-query backends return.
    /// Only the first list belongs to a single-text query.
    Batched(Vec<Vec<RawHit>>),
}

/// Abstract similarity store.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`list_ids`](Store::list_ids) | Bulk read of every stored id |
/// | [`exists`](Store::exists) | Single-id membership check |
/// | [`insert`](Store::insert) | All-or-nothing batch insert |
/// | [`query`](Store::query) | Top-k similarity query |
/// | [`count`](Store::count) | Number of stored records |
///
/// Every failure to reach the backend is reported as
/// [`RagError::StoreUnavailable`](crate::RagError::StoreUnavailable).
#[async_trait]
pub trait Store: Send + Sync {
    /// Stable name of the backing collection, e.g. `"sqlite:knowledge"`.
    ///
    /// Used to scope ingestion locks and in log output.
    fn name(&self) -> &str;

    /// Whether inserting an id that already exists overwrites it in place.
    ///
    /// Stores that return `false` would keep a second copy, so concurrent
    /// ingestion into them must be serialized by the caller.
    fn idempotent_insert(&self) -> bool {
        true
    }

    async fn list_ids(&self) -> Result<HashSet<String>>;

    async fn exists(&self, id: &str) -> Result<bool> {
        Ok(self.list_ids().await?.contains(id))
    }

    /// Insert a batch of records. Either the whole batch is stored or
    /// none of it is.
    async fn insert(&self, batch: &[Record]) -> Result<()>;

    /// Return at most `k` hits ordered by decreasing similarity to `text`.
    async fn query(&self, text: &str, k: usize) -> Result<QueryResponse>;

    async fn count(&self) -> Result<usize>;
}

/// Lowercased alphanumeric terms of `text`, in order of appearance.
///
/// Shared by the term-matching backends so that the in-memory and SQLite
/// stores agree on what a "word" is.
pub fn terms(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}
