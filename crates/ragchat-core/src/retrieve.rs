//! Top-k retrieval and result normalization.
//!
//! Backends answer a query in one of several shapes (see [`QueryResponse`]).
//! [`retrieve`] turns every shape into one ranked `Vec<Match>`:
//!
//! - `Missing` becomes an empty list.
//! - `Batched` contributes only its first list.
//! - Missing text or metadata becomes an empty value.
//! - A repeated id keeps its first occurrence.
//! - If any hit carries a score, hits are stably sorted by score
//!   descending; otherwise backend order is kept.
//! - The list is truncated to `k` and `rank` is assigned by position.

use std::collections::HashSet;

use tracing::debug;

use crate::error::{RagError, Result};
use crate::models::Match;
use crate::store::{QueryResponse, RawHit, Store};

/// Query the store for the `k` records most similar to `query`.
///
/// An empty result is `Ok(vec![])`. A blank query returns an empty list
/// without calling the store.
pub async fn retrieve<S: Store + ?Sized>(store: &S, query: &str, k: usize) -> Result<Vec<Match>> {
    if k == 0 {
        return Err(RagError::InvalidArgument(
            "k must be at least 1".to_string(),
        ));
    }
    if query.trim().is_empty() {
        return Ok(Vec::new());
    }

    let response = store.query(query, k).await?;
    let matches = normalize_response(response, k);

    debug!(
        store = store.name(),
        k,
        found = matches.len(),
        top = matches.first().map(|m| m.id.as_str()).unwrap_or(""),
        "retrieved matches"
    );

    Ok(matches)
}

/// Like [`retrieve`], but an empty result is [`RagError::NoRelevantData`].
pub async fn retrieve_relevant<S: Store + ?Sized>(
    store: &S,
    query: &str,
    k: usize,
) -> Result<Vec<Match>> {
    let matches = retrieve(store, query, k).await?;
    if matches.is_empty() {
        return Err(RagError::NoRelevantData);
    }
    Ok(matches)
}

/// Collapse any backend response shape into at most `k` ranked matches.
pub fn normalize_response(response: QueryResponse, k: usize) -> Vec<Match> {
    let hits = match response {
        QueryResponse::Missing => Vec::new(),
        QueryResponse::Flat(hits) => hits,
        QueryResponse::Batched(lists) => lists.into_iter().next().unwrap_or_default(),
    };

    let mut seen = HashSet::new();
    let mut hits: Vec<RawHit> = hits
        .into_iter()
        .filter(|h| seen.insert(h.id.clone()))
        .map(|mut h| {
            // NaN or infinite scores carry no ranking information.
            h.score = h.score.filter(|s| s.is_finite());
            h
        })
        .collect();

    if hits.iter().any(|h| h.score.is_some()) {
        // Unscored hits sort after every scored one.
        hits.sort_by(|a, b| {
            let a = a.score.unwrap_or(f64::NEG_INFINITY);
            let b = b.score.unwrap_or(f64::NEG_INFINITY);
            b.total_cmp(&a)
        });
    }

    hits.truncate(k);

    hits.into_iter()
        .enumerate()
        .map(|(rank, h)| Match {
            id: h.id,
            text: h.text.unwrap_or_default(),
            metadata: h.metadata.unwrap_or_default(),
            rank,
            score: h.score,
        })
        .collect()
}
