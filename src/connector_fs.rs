//! Local directory as a remote source.
//!
//! Treats every file under `root` as a document: the id is its path relative
//! to `root` (with `/` separators), the name is the file name, `modified` is
//! the file's mtime and `workspace` is the parent directory. The root is the
//! only cabinet (id `.`), its top-level directories are workspaces and every
//! directory below a workspace is a folder. Useful for
//! indexing a mounted share or an export folder, and for tests.
//!
//! ```toml
//! [source]
//! kind = "directory"
//!
//! [source.directory]
//! root = "./inbox"
//! ```

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use walkdir::WalkDir;

use docsync_core::models::DocumentRecord;

use crate::traits::{ConnectionStatus, Container, DownloadedFile, RemoteSource};

const ROOT_CABINET: &str = ".";

pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Every file under the root, sorted by id for deterministic ordering.
    fn scan(&self) -> Result<Vec<DocumentRecord>> {
        if !self.root.is_dir() {
            bail!("Directory source root does not exist: {}", self.root.display());
        }

        let mut records = Vec::new();
        for entry in WalkDir::new(&self.root) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            records.push(self.record_for(entry.path())?);
        }
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records)
    }

    /// `/`-separated path relative to the root.
    fn relative_id(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Directories under `dir` as containers, sorted by id.
    fn directories(&self, dir: &Path, max_depth: usize) -> Result<Vec<Container>> {
        let mut dirs = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1).max_depth(max_depth) {
            let entry = entry?;
            if !entry.file_type().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            dirs.push(Container::new(self.relative_id(entry.path()), name));
        }
        dirs.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(dirs)
    }

    fn record_for(&self, path: &Path) -> Result<DocumentRecord> {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        let id = self.relative_id(path);
        let modified: DateTime<Utc> = std::fs::metadata(path)
            .and_then(|m| m.modified())
            .with_context(|| format!("Failed to stat {}", path.display()))?
            .into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| id.clone());
        let workspace = relative
            .parent()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_default();

        Ok(DocumentRecord {
            id,
            name,
            modified,
            author: String::new(),
            workspace,
        })
    }

    /// Resolve an id back to a path, refusing anything outside the root.
    fn path_for(&self, document_id: &str) -> Result<PathBuf> {
        let relative = Path::new(document_id);
        if relative.is_absolute()
            || relative
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            bail!("invalid document id: {}", document_id);
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl RemoteSource for DirectorySource {
    fn name(&self) -> &str {
        "directory"
    }

    async fn search(
        &self,
        query: &str,
        _cabinet: Option<&str>,
        max_results: usize,
    ) -> Result<Vec<DocumentRecord>> {
        let needle = query.trim().to_lowercase();
        let mut records = self.scan()?;
        if !needle.is_empty() && needle != "*" {
            records.retain(|r| r.id.to_lowercase().contains(&needle));
        }
        records.truncate(max_results);
        Ok(records)
    }

    async fn recent_documents(&self, days: u32, max_results: usize) -> Result<Vec<DocumentRecord>> {
        let cutoff = Utc::now() - chrono::Duration::days(i64::from(days));
        let mut records = self.scan()?;
        records.retain(|r| r.modified >= cutoff);
        records.sort_by(|a, b| b.modified.cmp(&a.modified));
        records.truncate(max_results);
        Ok(records)
    }

    async fn folder_documents(&self, folder_id: &str) -> Result<Vec<DocumentRecord>> {
        let folder = folder_id.trim_matches('/');
        let records = self.scan()?;
        Ok(records
            .into_iter()
            .filter(|r| r.workspace.replace('\\', "/") == folder)
            .collect())
    }

    async fn download(&self, document_id: &str) -> Result<DownloadedFile> {
        let source = self.path_for(document_id)?;
        if !source.is_file() {
            return Err(anyhow!("document {} not found", document_id));
        }
        let suffix = source
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_else(|| ".tmp".to_string());
        let (_file, downloaded) = DownloadedFile::create_with_suffix(&suffix)?;
        std::fs::copy(&source, downloaded.path())
            .with_context(|| format!("Failed to copy {}", source.display()))?;
        Ok(downloaded)
    }

    async fn info(&self, document_id: &str) -> Result<Option<DocumentRecord>> {
        let path = self.path_for(document_id)?;
        if !path.is_file() {
            return Ok(None);
        }
        self.record_for(&path).map(Some)
    }

    async fn connection_status(&self) -> ConnectionStatus {
        if self.root.is_dir() {
            ConnectionStatus::connected(self.root.display().to_string())
        } else {
            ConnectionStatus::disconnected(format!(
                "root does not exist: {}",
                self.root.display()
            ))
        }
    }

    async fn cabinets(&self) -> Result<Vec<Container>> {
        if !self.root.is_dir() {
            bail!("Directory source root does not exist: {}", self.root.display());
        }
        let name = self
            .root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.root.display().to_string());
        Ok(vec![Container::new(ROOT_CABINET, name)])
    }

    async fn workspaces(&self, cabinet_id: &str) -> Result<Vec<Container>> {
        if cabinet_id != ROOT_CABINET {
            bail!("unknown cabinet: {}", cabinet_id);
        }
        if !self.root.is_dir() {
            bail!("Directory source root does not exist: {}", self.root.display());
        }
        self.directories(&self.root, 1)
    }

    async fn folders(&self, workspace_id: &str) -> Result<Vec<Container>> {
        let dir = self.path_for(workspace_id.trim_matches('/'))?;
        if !dir.is_dir() {
            bail!("workspace {} not found", workspace_id);
        }
        self.directories(&dir, usize::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, DirectorySource) {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("matters/acme")).unwrap();
        fs::write(root.join("matters/acme/lease.txt"), "lease terms").unwrap();
        fs::write(root.join("matters/acme/photo.png"), [0u8; 4]).unwrap();
        fs::write(root.join("intake.txt"), "intake notes").unwrap();
        let source = DirectorySource::new(root);
        (tmp, source)
    }

    #[tokio::test]
    async fn search_star_lists_everything_sorted() {
        let (_tmp, source) = fixture();
        let docs = source.search("*", None, 100).await.unwrap();
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["intake.txt", "matters/acme/lease.txt", "matters/acme/photo.png"]
        );
        assert_eq!(docs[1].name, "lease.txt");
        assert_eq!(docs[1].workspace, "matters/acme");
    }

    #[tokio::test]
    async fn search_filters_and_caps() {
        let (_tmp, source) = fixture();
        assert_eq!(source.search("LEASE", None, 100).await.unwrap().len(), 1);
        assert_eq!(source.search("*", None, 2).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn folder_documents_matches_workspace() {
        let (_tmp, source) = fixture();
        let docs = source.folder_documents("matters/acme").await.unwrap();
        assert_eq!(docs.len(), 2);
    }

    #[tokio::test]
    async fn download_copies_into_temp_file() {
        let (_tmp, source) = fixture();
        let downloaded = source.download("matters/acme/lease.txt").await.unwrap();
        assert_eq!(fs::read_to_string(downloaded.path()).unwrap(), "lease terms");
        let path = downloaded.to_path_buf();
        drop(downloaded);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn missing_or_escaping_ids_fail() {
        let (_tmp, source) = fixture();
        assert!(source.download("gone.txt").await.is_err());
        assert!(source.download("../etc/passwd").await.is_err());
        assert_eq!(source.info("gone.txt").await.unwrap(), None);
    }

    #[tokio::test]
    async fn directory_tree_maps_to_cabinets_workspaces_and_folders() {
        let (tmp, source) = fixture();
        fs::create_dir_all(tmp.path().join("matters/acme/drafts")).unwrap();
        fs::create_dir_all(tmp.path().join("archive")).unwrap();

        let cabinets = source.cabinets().await.unwrap();
        assert_eq!(cabinets.len(), 1);
        assert_eq!(cabinets[0].id, ".");

        let workspaces = source.workspaces(".").await.unwrap();
        let ids: Vec<&str> = workspaces.iter().map(|w| w.id.as_str()).collect();
        assert_eq!(ids, vec!["archive", "matters"]);

        let folders = source.folders("matters").await.unwrap();
        let ids: Vec<&str> = folders.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["matters/acme", "matters/acme/drafts"]);
        assert_eq!(folders[0].name, "acme");

        // Folder ids feed straight into folder listing.
        let docs = source.folder_documents(&folders[0].id).await.unwrap();
        assert_eq!(docs.len(), 2);

        assert!(source.workspaces("other").await.is_err());
        assert!(source.folders("missing").await.is_err());
        assert!(source.folders("../outside").await.is_err());
    }

    #[tokio::test]
    async fn recent_documents_includes_fresh_files() {
        let (_tmp, source) = fixture();
        let docs = source.recent_documents(1, 10).await.unwrap();
        assert_eq!(docs.len(), 3);
    }
}
