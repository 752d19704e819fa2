//! Database schema.
//!
//! | Table | Contents |
//! |-------|----------|
//! | `chunks` | One row per chunk, keyed by the deterministic chunk id |
//! | `chunks_fts` | FTS5 index over chunk text |
//! | `sync_documents` | Synced entries (SQLite state backend) |
//! | `sync_failures` | Last batch's failures, in order (SQLite state backend) |
//! | `sync_meta` | `last_sync` and other scalar state |

use anyhow::{Context, Result};
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

const TABLES: &[(&str, &str)] = &[
    (
        "chunks",
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            id TEXT PRIMARY KEY,
            source_name TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            chunk_count INTEGER NOT NULL,
            start_offset INTEGER NOT NULL,
            end_offset INTEGER NOT NULL,
            text TEXT NOT NULL,
            hash TEXT NOT NULL,
            provenance_json TEXT NOT NULL DEFAULT '{}',
            updated_at INTEGER NOT NULL,
            UNIQUE(source_name, chunk_index)
        )
        "#,
    ),
    (
        "sync_documents",
        r#"
        CREATE TABLE IF NOT EXISTS sync_documents (
            document_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            modified_fingerprint TEXT NOT NULL,
            last_sync_time TEXT NOT NULL
        )
        "#,
    ),
    (
        "sync_failures",
        r#"
        CREATE TABLE IF NOT EXISTS sync_failures (
            position INTEGER PRIMARY KEY,
            document_id TEXT NOT NULL,
            name TEXT NOT NULL,
            error_message TEXT NOT NULL
        )
        "#,
    ),
    (
        "sync_meta",
        "CREATE TABLE IF NOT EXISTS sync_meta (key TEXT PRIMARY KEY, value TEXT)",
    ),
    (
        "idx_chunks_source_name",
        "CREATE INDEX IF NOT EXISTS idx_chunks_source_name ON chunks(source_name)",
    ),
];

/// Create the database file and schema. Safe to run repeatedly.
pub async fn init_database(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    run_migrations(&pool).await?;
    pool.close().await;
    Ok(())
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    for (name, ddl) in TABLES {
        sqlx::query(ddl)
            .execute(pool)
            .await
            .with_context(|| format!("Failed to create {}", name))?;
    }

    // CREATE VIRTUAL TABLE has no IF NOT EXISTS for fts5 on older SQLite
    let fts_exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = 'chunks_fts'",
    )
    .fetch_one(pool)
    .await?;
    if !fts_exists {
        sqlx::query(
            "CREATE VIRTUAL TABLE chunks_fts USING fts5(chunk_id UNINDEXED, source_name UNINDEXED, text)",
        )
        .execute(pool)
        .await
        .context("Failed to create chunks_fts (is FTS5 compiled in?)")?;
    }

    Ok(())
}
