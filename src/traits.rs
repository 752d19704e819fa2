//! Collaborator interfaces consumed by the sync engine.
//!
//! ```text
//! ┌──────────────┐  search / download  ┌────────────┐  chunks  ┌────────────────┐
//! │ RemoteSource │ ──────────────────▶ │ SyncEngine │ ───────▶ │ KnowledgeStore │
//! └──────────────┘                     └─────┬──────┘          └────────────────┘
//!                               extract text │ load / commit
//!                          ┌─────────────────┴──┬────────────────────┐
//!                          ▼                    ▼                    │
//!                   ┌───────────────┐   ┌─────────────────┐          │
//!                   │ TextExtractor │   │ StateRepository │ ◀────────┘
//!                   └───────────────┘   └─────────────────┘
//! ```
//!
//! [`KnowledgeStore`](docsync_core::store::KnowledgeStore) and
//! [`StateRepository`](docsync_core::store::StateRepository) live in the
//! core crate; the traits here need filesystem types.

use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use tempfile::TempPath;

use docsync_core::format::SupportedFormat;
use docsync_core::models::DocumentRecord;

use crate::extract::{self, ExtractError};

/// A downloaded document body in a temporary local file.
///
/// The file is deleted when this value is dropped, whether or not the
/// document was processed successfully.
#[derive(Debug)]
pub struct DownloadedFile {
    path: TempPath,
}

impl DownloadedFile {
    /// Create an empty temp file whose name ends with `suffix` (e.g. `.pdf`),
    /// so extension-sensitive tools see the right type.
    pub fn create_with_suffix(suffix: &str) -> std::io::Result<(std::fs::File, Self)> {
        let named = tempfile::Builder::new()
            .prefix("docsync-")
            .suffix(suffix)
            .tempfile()?;
        let (file, path) = named.into_parts();
        Ok((file, Self { path }))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn to_path_buf(&self) -> PathBuf {
        self.path.to_path_buf()
    }
}

/// Reachability of the remote source, as shown by `docsync status`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub connected: bool,
    /// Account or location the source is connected as.
    pub user: Option<String>,
    pub error: Option<String>,
}

impl ConnectionStatus {
    pub fn connected(user: impl Into<String>) -> Self {
        Self {
            connected: true,
            user: Some(user.into()),
            error: None,
        }
    }

    pub fn disconnected(error: impl Into<String>) -> Self {
        Self {
            connected: false,
            user: None,
            error: Some(error.into()),
        }
    }
}

/// A cabinet, workspace or folder on the remote source.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Container {
    pub id: String,
    pub name: String,
}

impl Container {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// A remote document-management system the engine pulls from.
///
/// Implementations own authentication and transport. Every call may block
/// on the network; the engine applies no timeout of its own.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Short label used in logs and progress output.
    fn name(&self) -> &str;

    /// Full-text search, optionally scoped to a cabinet.
    async fn search(
        &self,
        query: &str,
        cabinet: Option<&str>,
        max_results: usize,
    ) -> Result<Vec<DocumentRecord>>;

    /// Documents modified within the trailing `days`, newest first.
    async fn recent_documents(&self, days: u32, max_results: usize)
        -> Result<Vec<DocumentRecord>>;

    /// All documents filed in a folder.
    async fn folder_documents(&self, folder_id: &str) -> Result<Vec<DocumentRecord>>;

    /// Download a document body. Fails if the document is gone or the
    /// transfer breaks.
    async fn download(&self, document_id: &str) -> Result<DownloadedFile>;

    /// Current metadata for a document, `None` if it no longer exists.
    async fn info(&self, document_id: &str) -> Result<Option<DocumentRecord>>;

    async fn connection_status(&self) -> ConnectionStatus;

    /// Cabinets the account can see.
    async fn cabinets(&self) -> Result<Vec<Container>>;

    async fn workspaces(&self, cabinet_id: &str) -> Result<Vec<Container>>;

    /// Folders in a workspace. Folder ids are accepted by
    /// [`folder_documents`](Self::folder_documents).
    async fn folders(&self, workspace_id: &str) -> Result<Vec<Container>>;
}

/// Converts a downloaded file into plain text.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, path: &Path, format: SupportedFormat) -> Result<String, ExtractError>;
}

/// Default extractor backed by [`extract::extract_file`].
#[derive(Debug, Default, Clone, Copy)]
pub struct FileExtractor;

impl TextExtractor for FileExtractor {
    fn extract(&self, path: &Path, format: SupportedFormat) -> Result<String, ExtractError> {
        extract::extract_file(path, format)
    }
}
