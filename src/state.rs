//! Durable [`StateRepository`] backends.
//!
//! - [`JsonFileStateRepository`]: the state aggregate as pretty-printed JSON
//!   in a single file. Commits write a sibling temp file and rename it over
//!   the target, so readers never observe a half-written state.
//! - [`SqliteStateRepository`]: the same aggregate in the `sync_documents`,
//!   `sync_failures` and `sync_meta` tables, replaced in one transaction.
//!
//! Neither backend serializes whole invocations; see [`SyncLock`] for that.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use docsync_core::models::{FailureEntry, SyncState, SyncedEntry};
use docsync_core::store::StateRepository;

pub struct JsonFileStateRepository {
    path: PathBuf,
}

impl JsonFileStateRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl StateRepository for JsonFileStateRepository {
    async fn load(&self) -> Result<SyncState> {
        if !self.path.exists() {
            return Ok(SyncState::default());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read state file {}", self.path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse state file {}", self.path.display()))
    }

    async fn commit(&self, state: &SyncState) -> Result<()> {
        let dir = match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => parent.to_path_buf(),
            None => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let json = serde_json::to_string_pretty(state)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)
            .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
        tmp.write_all(json.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)
            .with_context(|| format!("Failed to write state file {}", self.path.display()))?;
        Ok(())
    }
}

pub struct SqliteStateRepository {
    pool: SqlitePool,
}

impl SqliteStateRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn parse_ts(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)
        .with_context(|| format!("Invalid timestamp in sync state: {}", value))?
        .with_timezone(&Utc))
}

#[async_trait]
impl StateRepository for SqliteStateRepository {
    async fn load(&self) -> Result<SyncState> {
        let last_sync: Option<String> =
            sqlx::query_scalar("SELECT value FROM sync_meta WHERE key = 'last_sync'")
                .fetch_optional(&self.pool)
                .await?
                .flatten();

        let rows = sqlx::query(
            "SELECT document_id, name, modified_fingerprint, last_sync_time FROM sync_documents",
        )
        .fetch_all(&self.pool)
        .await?;
        let mut synced_documents = BTreeMap::new();
        for row in &rows {
            let document_id: String = row.get("document_id");
            let entry = SyncedEntry {
                document_id: document_id.clone(),
                name: row.get("name"),
                modified_fingerprint: parse_ts(row.get("modified_fingerprint"))?,
                last_sync_time: parse_ts(row.get("last_sync_time"))?,
            };
            synced_documents.insert(document_id, entry);
        }

        let failed_documents = sqlx::query(
            "SELECT document_id, name, error_message FROM sync_failures ORDER BY position",
        )
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(|row| FailureEntry {
            document_id: row.get("document_id"),
            name: row.get("name"),
            error_message: row.get("error_message"),
        })
        .collect();

        Ok(SyncState {
            last_sync: last_sync.as_deref().map(parse_ts).transpose()?,
            synced_documents,
            failed_documents,
        })
    }

    async fn commit(&self, state: &SyncState) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM sync_documents")
            .execute(&mut *tx)
            .await?;
        for entry in state.synced_documents.values() {
            sqlx::query(
                "INSERT INTO sync_documents (document_id, name, modified_fingerprint, last_sync_time) \
                 VALUES (?, ?, ?, ?)",
            )
            .bind(&entry.document_id)
            .bind(&entry.name)
            .bind(entry.modified_fingerprint.to_rfc3339())
            .bind(entry.last_sync_time.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("DELETE FROM sync_failures")
            .execute(&mut *tx)
            .await?;
        for (position, failure) in state.failed_documents.iter().enumerate() {
            sqlx::query(
                "INSERT INTO sync_failures (position, document_id, name, error_message) \
                 VALUES (?, ?, ?, ?)",
            )
            .bind(position as i64)
            .bind(&failure.document_id)
            .bind(&failure.name)
            .bind(&failure.error_message)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            r#"
            INSERT INTO sync_meta (key, value) VALUES ('last_sync', ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(state.last_sync.map(|t| t.to_rfc3339()))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}

/// Exclusive marker file held for the duration of one sync invocation.
///
/// Two invocations against the same state would otherwise race on the final
/// commit. The file is removed on drop; a crash leaves it behind and it must
/// be deleted by hand.
#[derive(Debug)]
pub struct SyncLock {
    path: PathBuf,
}

impl SyncLock {
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                writeln!(file, "{}", std::process::id())?;
                Ok(Self { path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => bail!(
                "another sync appears to be running (lock file {} exists); \
                 remove it if no sync is in progress",
                path.display()
            ),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to create lock file {}", path.display())),
        }
    }
}

impl Drop for SyncLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use docsync_core::models::DocumentRecord;
    use tempfile::TempDir;

    fn sample_state() -> SyncState {
        let t1 = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();
        let mut state = SyncState {
            last_sync: Some(Utc.with_ymd_and_hms(2024, 6, 2, 7, 30, 0).unwrap()),
            ..SyncState::default()
        };
        for id in ["A", "B"] {
            let doc = DocumentRecord {
                id: id.to_string(),
                name: format!("{}.pdf", id.to_lowercase()),
                modified: t1,
                author: String::new(),
                workspace: String::new(),
            };
            state.record_synced(&doc, t1);
        }
        state.failed_documents.push(FailureEntry {
            document_id: "C".to_string(),
            name: "c.docx".to_string(),
            error_message: "failed to download c.docx: 404".to_string(),
        });
        state
    }

    #[tokio::test]
    async fn json_missing_file_loads_default() {
        let tmp = TempDir::new().unwrap();
        let repo = JsonFileStateRepository::new(tmp.path().join("state.json"));
        assert_eq!(repo.load().await.unwrap(), SyncState::default());
    }

    #[tokio::test]
    async fn json_commit_then_load() {
        let tmp = TempDir::new().unwrap();
        let repo = JsonFileStateRepository::new(tmp.path().join("nested").join("state.json"));
        let state = sample_state();
        repo.commit(&state).await.unwrap();
        assert_eq!(repo.load().await.unwrap(), state);

        let raw = std::fs::read_to_string(repo.path()).unwrap();
        assert!(raw.contains("\"synced_documents\""));
        assert!(raw.contains("\"modified_fingerprint\""));
        let leftovers = std::fs::read_dir(tmp.path().join("nested")).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[tokio::test]
    async fn json_corrupt_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state.json");
        std::fs::write(&path, "{ not json").unwrap();
        let repo = JsonFileStateRepository::new(&path);
        assert!(repo.load().await.is_err());
    }

    #[tokio::test]
    async fn sqlite_commit_replaces_everything() {
        let repo = SqliteStateRepository::new(crate::db::in_memory().await.unwrap());

        assert_eq!(repo.load().await.unwrap(), SyncState::default());

        let state = sample_state();
        repo.commit(&state).await.unwrap();
        assert_eq!(repo.load().await.unwrap(), state);

        let mut next = state.clone();
        next.synced_documents.remove("B");
        next.failed_documents.clear();
        repo.commit(&next).await.unwrap();
        assert_eq!(repo.load().await.unwrap(), next);
    }

    #[test]
    fn lock_is_exclusive_and_released_on_drop() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("sync.lock");
        let lock = SyncLock::acquire(&path).unwrap();
        assert!(SyncLock::acquire(&path).is_err());
        drop(lock);
        assert!(!path.exists());
        assert!(SyncLock::acquire(&path).is_ok());
    }
}
