//! Error taxonomy for sync runs.
//!
//! [`DocumentError`]s are caught at the per-document boundary and recorded
//! as failure entries; they never reach the caller of a sync. Only
//! [`SyncError`]s abort an invocation.

use thiserror::Error;

use crate::extract::ExtractError;

/// Why a single document could not be indexed.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("unsupported document type: {0}")]
    UnsupportedFormat(String),

    #[error("failed to download {name}: {reason}")]
    Download { name: String, reason: String },

    #[error("failed to extract text from {name}: {source}")]
    Extraction {
        name: String,
        #[source]
        source: ExtractError,
    },

    #[error("no text could be extracted from {0}")]
    NoExtractableText(String),

    #[error("failed to add {name} to knowledge base: {reason}")]
    StoreUpsert { name: String, reason: String },
}

/// Invocation-level failure of a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("document discovery failed: {0:#}")]
    Discovery(anyhow::Error),

    #[error("failed to load sync state: {0:#}")]
    StateLoad(anyhow::Error),

    /// The batch's chunks are already in the knowledge store; the next run
    /// re-attempts these documents, which upsert idempotence makes safe.
    #[error("failed to persist sync state: {0:#}")]
    StatePersistence(anyhow::Error),
}
