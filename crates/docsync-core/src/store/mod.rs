//! Storage abstractions used by the sync engine.
//!
//! [`KnowledgeStore`] is the idempotent upsert target for chunks.
//! [`StateRepository`] owns the persisted [`SyncState`]: it is read once
//! and committed once per sync batch.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::models::{Chunk, SyncState};

/// Result of submitting a chunk batch to a [`KnowledgeStore`].
///
/// A store may reject a batch without an I/O error (e.g. a validation
/// failure); that is reported as `success == false` with a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpsertOutcome {
    pub success: bool,
    pub message: String,
}

impl UpsertOutcome {
    pub fn accepted(count: usize) -> Self {
        Self {
            success: true,
            message: format!("{} chunks upserted", count),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Target index for document chunks.
///
/// Upserts are keyed by [`Chunk::id`], so submitting the same chunk twice
/// overwrites rather than duplicates.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    async fn upsert(&self, chunks: &[Chunk]) -> Result<UpsertOutcome>;
}

/// Durable home of the [`SyncState`] aggregate.
#[async_trait]
pub trait StateRepository: Send + Sync {
    /// Load the current state, or an empty default when none exists yet.
    async fn load(&self) -> Result<SyncState>;

    /// Replace the stored state with `state` as a single atomic write.
    async fn commit(&self, state: &SyncState) -> Result<()>;
}
