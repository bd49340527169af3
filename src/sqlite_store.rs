//! SQLite-backed [`Store`] implementation.
//!
//! Records live in the `records` table, unique on `(collection, id)`, with a
//! parallel `records_fts` FTS5 index over their text. Several collections
//! can share one database file.
//!
//! - `insert` upserts a whole batch in one transaction, so it is both
//!   idempotent and all-or-nothing.
//! - `query` ranks with FTS5 `bm25()`, negated so that higher is better,
//!   with insertion order breaking ties.

use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use ragchat_core::models::{Metadata, Record};
use ragchat_core::store::{terms, QueryResponse, RawHit, Store};
use ragchat_core::{RagError, Result};

use crate::config::Config;
use crate::{db, migrate};

/// SQLite implementation of the [`Store`] trait for one collection.
pub struct SqliteStore {
    pool: SqlitePool,
    collection: String,
    name: String,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool, collection: impl Into<String>) -> Self {
        let collection = collection.into();
        Self {
            name: format!("sqlite:{}", collection),
            pool,
            collection,
        }
    }

    /// Connect to the configured database, create the schema if needed,
    /// and open the configured collection.
    pub async fn open(config: &Config) -> anyhow::Result<Self> {
        let pool = db::connect(config).await?;
        migrate::apply(&pool).await?;
        Ok(Self::new(pool, config.store.collection.clone()))
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Build an FTS5 MATCH expression that ORs together the query's terms.
///
/// Every term is quoted so that FTS5 operators in user input are matched
/// literally. Returns `None` when the query has no searchable terms.
pub fn fts_query(text: &str) -> Option<String> {
    let mut seen = HashSet::new();
    let quoted: Vec<String> = terms(text)
        .into_iter()
        .filter(|t| seen.insert(t.clone()))
        .map(|t| format!("\"{}\"", t))
        .collect();
    if quoted.is_empty() {
        None
    } else {
        Some(quoted.join(" OR "))
    }
}

#[async_trait]
impl Store for SqliteStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_ids(&self) -> Result<HashSet<String>> {
        let ids: Vec<String> = sqlx::query_scalar("SELECT id FROM records WHERE collection = ?")
            .bind(&self.collection)
            .fetch_all(&self.pool)
            .await
            .map_err(RagError::store)?;
        Ok(ids.into_iter().collect())
    }

    async fn exists(&self, id: &str) -> Result<bool> {
        sqlx::query_scalar("SELECT COUNT(*) > 0 FROM records WHERE collection = ? AND id = ?")
            .bind(&self.collection)
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(RagError::store)
    }

    async fn insert(&self, batch: &[Record]) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await.map_err(RagError::store)?;

        for record in batch {
            let metadata_json = serde_json::to_string(&record.metadata).map_err(RagError::store)?;
            let kind = record.metadata.get("kind").cloned();

            let seq: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO records (collection, id, text, metadata_json, kind, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(collection, id) DO UPDATE SET
                    text = excluded.text,
                    metadata_json = excluded.metadata_json,
                    kind = excluded.kind,
                    updated_at = excluded.updated_at
                RETURNING seq
                "#,
            )
            .bind(&self.collection)
            .bind(&record.id)
            .bind(&record.text)
            .bind(&metadata_json)
            .bind(kind)
            .bind(now)
            .bind(now)
            .fetch_one(&mut *tx)
            .await
            .map_err(RagError::store)?;

            sqlx::query("DELETE FROM records_fts WHERE seq = ?")
                .bind(seq)
                .execute(&mut *tx)
                .await
                .map_err(RagError::store)?;

            sqlx::query("INSERT INTO records_fts (seq, collection, text) VALUES (?, ?, ?)")
                .bind(seq)
                .bind(&self.collection)
                .bind(&record.text)
                .execute(&mut *tx)
                .await
                .map_err(RagError::store)?;
        }

        tx.commit().await.map_err(RagError::store)?;
        Ok(())
    }

    async fn query(&self, text: &str, k: usize) -> Result<QueryResponse> {
        let Some(match_expr) = fts_query(text) else {
            return Ok(QueryResponse::Flat(Vec::new()));
        };

        let rows = sqlx::query(
            r#"
            SELECT r.id, r.text, r.metadata_json, hits.score
            FROM (
                SELECT seq, bm25(records_fts) AS score
                FROM records_fts
                WHERE records_fts MATCH ? AND collection = ?
            ) AS hits
            JOIN records r ON r.seq = hits.seq
            ORDER BY hits.score ASC, r.seq ASC
            LIMIT ?
            "#,
        )
        .bind(&match_expr)
        .bind(&self.collection)
        .bind(k as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(RagError::store)?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in &rows {
            let metadata_json: String = row.get("metadata_json");
            let metadata: Metadata = serde_json::from_str(&metadata_json).map_err(|e| {
                RagError::StoreUnavailable(format!("corrupt metadata for record: {}", e))
            })?;
            let score: f64 = row.get("score");
            hits.push(RawHit {
                id: row.get("id"),
                text: Some(row.get("text")),
                metadata: Some(metadata),
                score: Some(-score), // negate so higher = better
            });
        }

        Ok(QueryResponse::Flat(hits))
    }

    async fn count(&self) -> Result<usize> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM records WHERE collection = ?")
            .bind(&self.collection)
            .fetch_one(&self.pool)
            .await
            .map_err(RagError::store)?;
        Ok(n as usize)
    }
}
