//! # docsync
//!
//! Keeps a local, searchable knowledge index in step with a remote
//! document-management system.
//!
//! Each sync run discovers documents on the remote source, skips the ones
//! whose type is unsupported or whose modification timestamp has not
//! advanced since they were last indexed, and pushes everything else
//! through download, text extraction and chunking into the knowledge store.
//! One failing document never blocks the rest of the batch, and the sync
//! state is committed once at the end of the run.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌─────────────────────┐   ┌───────────────┐
//! │ RemoteSource │──▶│     SyncEngine      │──▶│ KnowledgeStore│
//! │ NetDocuments │   │ evaluate → download │   │ SQLite + FTS5 │
//! │  / directory │   │ extract → chunk     │   └───────────────┘
//! └──────────────┘   └──────────┬──────────┘
//!                               ▼
//!                     ┌──────────────────┐
//!                     │ StateRepository  │
//!                     │ JSON file/SQLite │
//!                     └──────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`sync`] | The sync engine |
//! | [`traits`] | Remote source and extractor interfaces |
//! | [`connector_netdocs`] | NetDocuments REST source |
//! | [`connector_fs`] | Local directory source |
//! | [`extract`] | PDF / DOCX / TXT text extraction |
//! | [`sqlite_store`] | SQLite knowledge store with keyword search |
//! | [`state`] | Sync state repositories and the sync lock |
//! | [`activity`] | Append-only activity log |
//! | [`progress`] | Progress reporting on stderr |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sources`] | Builds the configured source, stores and engine |
//! | [`sync_cmd`], [`stats`], [`search`] | CLI command handlers |
//!
//! The data model, chunking processor, eligibility policy and storage
//! traits live in the `docsync-core` crate.

pub mod activity;
pub mod config;
pub mod connector_fs;
pub mod connector_netdocs;
pub mod db;
pub mod error;
pub mod extract;
pub mod migrate;
pub mod progress;
pub mod search;
pub mod sources;
pub mod sqlite_store;
pub mod state;
pub mod stats;
pub mod sync;
pub mod sync_cmd;
pub mod traits;
