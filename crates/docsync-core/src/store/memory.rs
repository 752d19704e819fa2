//! In-memory [`KnowledgeStore`] and [`StateRepository`] implementations
//! for tests and dry runs.
//!
//! Both use `std::sync::RwLock` for thread safety.

use std::collections::BTreeMap;
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::{Chunk, SyncState};

use super::{KnowledgeStore, StateRepository, UpsertOutcome};

/// Chunk store keyed by chunk id.
#[derive(Default)]
pub struct InMemoryKnowledgeStore {
    chunks: RwLock<BTreeMap<String, Chunk>>,
    reject_sources: RwLock<Vec<String>>,
    upsert_calls: RwLock<usize>,
}

impl InMemoryKnowledgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every future batch whose chunks come from `source_name`.
    pub fn reject_source(&self, source_name: &str) {
        self.reject_sources
            .write()
            .unwrap()
            .push(source_name.to_string());
    }

    pub fn len(&self) -> usize {
        self.chunks.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of `upsert` calls received, accepted or not.
    pub fn upsert_calls(&self) -> usize {
        *self.upsert_calls.read().unwrap()
    }

    /// Stored chunks for `source_name`, ordered by index.
    pub fn chunks_for(&self, source_name: &str) -> Vec<Chunk> {
        let mut chunks: Vec<Chunk> = self
            .chunks
            .read()
            .unwrap()
            .values()
            .filter(|c| c.source_name == source_name)
            .cloned()
            .collect();
        chunks.sort_by_key(|c| c.chunk_index);
        chunks
    }
}

#[async_trait]
impl KnowledgeStore for InMemoryKnowledgeStore {
    async fn upsert(&self, chunks: &[Chunk]) -> Result<UpsertOutcome> {
        *self.upsert_calls.write().unwrap() += 1;

        let rejected = self.reject_sources.read().unwrap();
        if let Some(c) = chunks.iter().find(|c| rejected.contains(&c.source_name)) {
            return Ok(UpsertOutcome::rejected(format!(
                "source '{}' rejected",
                c.source_name
            )));
        }

        let mut stored = self.chunks.write().unwrap();
        for c in chunks {
            stored.insert(c.id.clone(), c.clone());
        }
        Ok(UpsertOutcome::accepted(chunks.len()))
    }
}

/// State repository holding a single [`SyncState`] value.
#[derive(Default)]
pub struct InMemoryStateRepository {
    state: RwLock<Option<SyncState>>,
    fail_commits: RwLock<bool>,
    commits: RwLock<usize>,
}

impl InMemoryStateRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: SyncState) -> Self {
        Self {
            state: RwLock::new(Some(state)),
            ..Self::default()
        }
    }

    /// Make every following `commit` fail, leaving the stored state untouched.
    pub fn fail_commits(&self, fail: bool) {
        *self.fail_commits.write().unwrap() = fail;
    }

    /// Number of successful commits.
    pub fn commits(&self) -> usize {
        *self.commits.read().unwrap()
    }

    pub fn snapshot(&self) -> SyncState {
        self.state.read().unwrap().clone().unwrap_or_default()
    }
}

#[async_trait]
impl StateRepository for InMemoryStateRepository {
    async fn load(&self) -> Result<SyncState> {
        Ok(self.snapshot())
    }

    async fn commit(&self, state: &SyncState) -> Result<()> {
        if *self.fail_commits.read().unwrap() {
            return Err(anyhow!("state repository is read-only"));
        }
        *self.state.write().unwrap() = Some(state.clone());
        *self.commits.write().unwrap() += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkingProcessor;

    fn chunks(name: &str, text: &str) -> Vec<Chunk> {
        ChunkingProcessor::new(10, 2)
            .process(text, name, &BTreeMap::new())
            .unwrap()
    }

    #[tokio::test]
    async fn upsert_is_idempotent() {
        let store = InMemoryKnowledgeStore::new();
        let batch = chunks("a.txt", "several words of text to chunk");
        store.upsert(&batch).await.unwrap();
        store.upsert(&batch).await.unwrap();
        assert_eq!(store.len(), batch.len());
        assert_eq!(store.upsert_calls(), 2);
    }

    #[tokio::test]
    async fn rejected_source_stores_nothing() {
        let store = InMemoryKnowledgeStore::new();
        store.reject_source("bad.txt");
        let outcome = store.upsert(&chunks("bad.txt", "text")).await.unwrap();
        assert!(!outcome.success);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn failed_commit_keeps_previous_state() {
        let repo = InMemoryStateRepository::new();
        assert_eq!(repo.load().await.unwrap(), SyncState::default());

        let mut state = SyncState::default();
        state.last_sync = Some(chrono::Utc::now());
        repo.commit(&state).await.unwrap();

        repo.fail_commits(true);
        let mut next = state.clone();
        next.last_sync = None;
        assert!(repo.commit(&next).await.is_err());
        assert_eq!(repo.load().await.unwrap(), state);
        assert_eq!(repo.commits(), 1);
    }
}
