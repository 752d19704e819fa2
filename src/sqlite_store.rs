//! SQLite-backed [`KnowledgeStore`].
//!
//! Chunks are stored in the `chunks` table keyed by their deterministic id
//! and mirrored into the `chunks_fts` FTS5 index for keyword search. A batch
//! is written in one transaction; when a document re-chunks into fewer
//! pieces than before, the stale tail chunks are removed in the same
//! transaction.

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use sqlx::{Row, SqlitePool};

use docsync_core::models::Chunk;
use docsync_core::store::{KnowledgeStore, UpsertOutcome};

pub struct SqliteKnowledgeStore {
    pool: SqlitePool,
}

/// A keyword search hit.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub chunk_id: String,
    pub source_name: String,
    pub chunk_index: i64,
    pub chunk_count: i64,
    pub document_id: Option<String>,
    pub document_name: Option<String>,
    pub score: f64,
    pub snippet: String,
}

impl SqliteKnowledgeStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn chunk_count(&self) -> Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    pub async fn source_count(&self) -> Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(DISTINCT source_name) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    /// FTS5 keyword search, best matches first.
    pub async fn search(&self, query: &str, limit: i64) -> Result<Vec<SearchHit>> {
        let rows = sqlx::query(
            r#"
            SELECT f.chunk_id, f.source_name, f.rank,
                   snippet(chunks_fts, 2, '>>>', '<<<', '...', 24) AS snippet,
                   c.chunk_index, c.chunk_count, c.provenance_json
            FROM chunks_fts f
            JOIN chunks c ON c.id = f.chunk_id
            WHERE chunks_fts MATCH ?
            ORDER BY f.rank
            LIMIT ?
            "#,
        )
        .bind(query)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let hits = rows
            .iter()
            .map(|row| {
                let rank: f64 = row.get("rank");
                let provenance_json: String = row.get("provenance_json");
                let provenance: BTreeMap<String, String> =
                    serde_json::from_str(&provenance_json).unwrap_or_default();
                SearchHit {
                    chunk_id: row.get("chunk_id"),
                    source_name: row.get("source_name"),
                    chunk_index: row.get("chunk_index"),
                    chunk_count: row.get("chunk_count"),
                    document_id: provenance.get("document_id").cloned(),
                    document_name: provenance.get("document_name").cloned(),
                    score: -rank, // negate so higher = better
                    snippet: row.get("snippet"),
                }
            })
            .collect();

        Ok(hits)
    }
}

#[async_trait]
impl KnowledgeStore for SqliteKnowledgeStore {
    async fn upsert(&self, chunks: &[Chunk]) -> Result<UpsertOutcome> {
        if chunks.is_empty() {
            return Ok(UpsertOutcome::rejected("no chunks to upsert"));
        }

        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        for chunk in chunks {
            let provenance_json = serde_json::to_string(&chunk.provenance)?;
            sqlx::query(
                r#"
                INSERT INTO chunks (id, source_name, chunk_index, chunk_count, start_offset,
                                    end_offset, text, hash, provenance_json, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    chunk_count = excluded.chunk_count,
                    start_offset = excluded.start_offset,
                    end_offset = excluded.end_offset,
                    text = excluded.text,
                    hash = excluded.hash,
                    provenance_json = excluded.provenance_json,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&chunk.id)
            .bind(&chunk.source_name)
            .bind(chunk.chunk_index)
            .bind(chunk.chunk_count)
            .bind(chunk.start_offset as i64)
            .bind(chunk.end_offset as i64)
            .bind(&chunk.content)
            .bind(&chunk.hash)
            .bind(&provenance_json)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            sqlx::query("DELETE FROM chunks_fts WHERE chunk_id = ?")
                .bind(&chunk.id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("INSERT INTO chunks_fts (chunk_id, source_name, text) VALUES (?, ?, ?)")
                .bind(&chunk.id)
                .bind(&chunk.source_name)
                .bind(&chunk.content)
                .execute(&mut *tx)
                .await?;
        }

        // Drop chunks left over from a longer previous version
        let mut counts: BTreeMap<&str, i64> = BTreeMap::new();
        for chunk in chunks {
            counts.insert(&chunk.source_name, chunk.chunk_count);
        }
        for (source_name, count) in counts {
            sqlx::query(
                "DELETE FROM chunks_fts WHERE chunk_id IN \
                 (SELECT id FROM chunks WHERE source_name = ? AND chunk_index >= ?)",
            )
            .bind(source_name)
            .bind(count)
            .execute(&mut *tx)
            .await?;
            sqlx::query("DELETE FROM chunks WHERE source_name = ? AND chunk_index >= ?")
                .bind(source_name)
                .bind(count)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(UpsertOutcome::accepted(chunks.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsync_core::chunk::ChunkingProcessor;

    async fn store() -> SqliteKnowledgeStore {
        SqliteKnowledgeStore::new(crate::db::in_memory().await.unwrap())
    }

    fn chunks(name: &str, text: &str, size: usize) -> Vec<Chunk> {
        let mut meta = BTreeMap::new();
        meta.insert("document_id".to_string(), format!("id-{}", name));
        ChunkingProcessor::new(size, 0)
            .process(text, name, &meta)
            .unwrap()
    }

    #[tokio::test]
    async fn repeated_upsert_does_not_duplicate() {
        let store = store().await;
        let batch = chunks("brief.txt", "alpha beta gamma delta epsilon zeta eta theta", 12);
        assert!(store.upsert(&batch).await.unwrap().success);
        assert!(store.upsert(&batch).await.unwrap().success);
        assert_eq!(store.chunk_count().await.unwrap(), batch.len() as i64);

        let fts_rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks_fts")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(fts_rows, batch.len() as i64);
    }

    #[tokio::test]
    async fn shrinking_document_drops_stale_tail() {
        let store = store().await;
        let long = chunks("memo.txt", "one two three four five six seven eight nine ten", 10);
        store.upsert(&long).await.unwrap();
        let short = chunks("memo.txt", "one two", 10);
        assert_eq!(short.len(), 1);
        store.upsert(&short).await.unwrap();

        assert_eq!(store.chunk_count().await.unwrap(), 1);
        let hits = store.search("nine", 10).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn search_returns_provenance_document_id() {
        let store = store().await;
        store
            .upsert(&chunks("lease.txt", "The tenant shall pay rent monthly.", 1000))
            .await
            .unwrap();
        store
            .upsert(&chunks("nda.txt", "Confidential information must not be disclosed.", 1000))
            .await
            .unwrap();

        let hits = store.search("rent", 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].source_name, "lease.txt");
        assert_eq!(hits[0].document_id.as_deref(), Some("id-lease.txt"));
        assert_eq!(store.source_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn empty_batch_is_rejected() {
        let store = store().await;
        let outcome = store.upsert(&[]).await.unwrap();
        assert!(!outcome.success);
    }
}
