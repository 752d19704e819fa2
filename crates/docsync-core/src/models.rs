//! Core data models used throughout docsync.
//!
//! [`DocumentRecord`] is what a remote source returns for a document;
//! [`Chunk`] is what the chunking processor hands to the knowledge store;
//! [`SyncState`] is the aggregate persisted between sync runs.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata for a document as reported by the remote source.
///
/// Immutable per fetch. Only its fingerprint (`modified`) is ever persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    pub name: String,
    pub modified: DateTime<Utc>,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub workspace: String,
}

/// A bounded slice of a document's extracted text.
///
/// `start_offset` / `end_offset` are character offsets into the text the
/// chunk was cut from (end exclusive).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Deterministic id derived from `(source_name, chunk_index)`.
    pub id: String,
    pub content: String,
    pub source_name: String,
    pub chunk_index: i64,
    pub chunk_count: i64,
    pub start_offset: usize,
    pub end_offset: usize,
    /// SHA-256 of `content`, lowercase hex.
    pub hash: String,
    pub provenance: BTreeMap<String, String>,
}

/// Last successful sync of one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncedEntry {
    pub document_id: String,
    pub name: String,
    pub modified_fingerprint: DateTime<Utc>,
    pub last_sync_time: DateTime<Utc>,
}

/// A document that failed during the most recent batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureEntry {
    pub document_id: String,
    pub name: String,
    pub error_message: String,
}

/// Persisted sync state, loaded at the start and committed at the end of
/// every batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    pub last_sync: Option<DateTime<Utc>>,
    #[serde(default)]
    pub synced_documents: BTreeMap<String, SyncedEntry>,
    #[serde(default)]
    pub failed_documents: Vec<FailureEntry>,
}

impl SyncState {
    /// Fingerprint recorded for `document_id` by its last successful sync.
    pub fn fingerprint(&self, document_id: &str) -> Option<DateTime<Utc>> {
        self.synced_documents
            .get(document_id)
            .map(|e| e.modified_fingerprint)
    }

    /// Record a successful sync, overwriting any previous entry.
    pub fn record_synced(&mut self, doc: &DocumentRecord, synced_at: DateTime<Utc>) {
        self.synced_documents.insert(
            doc.id.clone(),
            SyncedEntry {
                document_id: doc.id.clone(),
                name: doc.name.clone(),
                modified_fingerprint: doc.modified,
                last_sync_time: synced_at,
            },
        );
    }
}
