//! The sync engine.
//!
//! Orchestrates one sync batch:
//!
//! ```text
//! discover ─▶ evaluate ─▶ download ─▶ extract ─▶ chunk ─▶ upsert ─▶ commit state
//!              │                 └──────────── per document ───────────┘
//!              └─ skipped (unsupported / up to date): not attempted
//! ```
//!
//! Documents are processed strictly one at a time, in the order the source
//! returned them. A failing document is recorded and the batch moves on.
//! The [`SyncState`] is loaded once at the start and committed once at the
//! end; nothing is persisted mid-batch, so an interrupted run leaves the
//! previous state intact.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tracing::debug;

use docsync_core::chunk::{ChunkError, ChunkingProcessor};
use docsync_core::format::SupportedFormat;
use docsync_core::models::{DocumentRecord, FailureEntry, SyncState};
use docsync_core::policy::{self, Eligibility};
use docsync_core::store::{KnowledgeStore, StateRepository};

use crate::activity::ActivityLog;
use crate::error::{DocumentError, SyncError};
use crate::progress::{NoProgress, SyncProgressEvent, SyncProgressReporter};
use crate::traits::{ConnectionStatus, Container, RemoteSource, TextExtractor};

/// Outcome of one sync batch.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub synced_count: usize,
    pub failed_count: usize,
    pub failed_documents: Vec<FailureEntry>,
    /// Number of documents handed to the batch, skipped ones included.
    pub total_processed: usize,
    pub skipped_unsupported: usize,
    pub skipped_up_to_date: usize,
    pub chunks_written: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SyncReport {
    pub fn success(&self) -> bool {
        self.failed_count == 0
    }
}

/// Snapshot shown by `docsync status`.
#[derive(Debug, Clone, Serialize)]
pub struct SyncStatistics {
    pub last_sync: Option<DateTime<Utc>>,
    pub total_synced: usize,
    pub failed_documents: Vec<FailureEntry>,
    pub connection_status: ConnectionStatus,
}

/// A cabinet and the workspaces and folders beneath it.
#[derive(Debug, Clone, Serialize)]
pub struct CabinetTree {
    pub cabinet: Container,
    pub workspaces: Vec<WorkspaceTree>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceTree {
    pub workspace: Container,
    pub folders: Vec<Container>,
}

pub struct SyncEngine {
    source: Arc<dyn RemoteSource>,
    extractor: Arc<dyn TextExtractor>,
    processor: ChunkingProcessor,
    store: Arc<dyn KnowledgeStore>,
    state: Arc<dyn StateRepository>,
    activity: ActivityLog,
    progress: Box<dyn SyncProgressReporter>,
}

impl SyncEngine {
    pub fn new(
        source: Arc<dyn RemoteSource>,
        extractor: Arc<dyn TextExtractor>,
        processor: ChunkingProcessor,
        store: Arc<dyn KnowledgeStore>,
        state: Arc<dyn StateRepository>,
    ) -> Self {
        Self {
            source,
            extractor,
            processor,
            store,
            state,
            activity: ActivityLog::disabled(),
            progress: Box::new(NoProgress),
        }
    }

    pub fn with_activity_log(mut self, activity: ActivityLog) -> Self {
        self.activity = activity;
        self
    }

    pub fn with_progress(mut self, progress: Box<dyn SyncProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Eligibility of each document against the stored state, without
    /// downloading or writing anything.
    pub async fn plan(
        &self,
        documents: Vec<DocumentRecord>,
    ) -> Result<Vec<(DocumentRecord, Eligibility)>, SyncError> {
        let state = self.state.load().await.map_err(SyncError::StateLoad)?;
        Ok(documents
            .into_iter()
            .map(|doc| {
                let decision = policy::evaluate(&doc, &state);
                (doc, decision)
            })
            .collect())
    }

    /// Full-text search on the source, keeping only supported file types.
    pub async fn discover_documents(
        &self,
        query: &str,
        max_results: usize,
        cabinet: Option<&str>,
    ) -> Result<Vec<DocumentRecord>, SyncError> {
        self.activity
            .info(format!("Discovering documents with query: {}", query));
        self.progress.report(SyncProgressEvent::Discovering {
            source: self.source.name().to_string(),
        });
        let mut documents = self
            .source
            .search(query, cabinet, max_results)
            .await
            .map_err(|e| self.discovery_failed(e))?;
        let found = documents.len();
        documents.retain(policy::is_supported);
        documents.truncate(max_results);
        debug!(
            query,
            found,
            supported = documents.len(),
            "discovered documents"
        );
        self.activity.info(format!(
            "Found {} supported documents out of {} total",
            documents.len(),
            found
        ));
        Ok(documents)
    }

    pub async fn sync_query(
        &self,
        query: &str,
        cabinet: Option<&str>,
        max_results: usize,
    ) -> Result<SyncReport, SyncError> {
        let documents = self.discover_documents(query, max_results, cabinet).await?;
        self.sync(&documents).await
    }

    /// Sync documents modified within the trailing `days`.
    pub async fn sync_recent_documents(
        &self,
        days: u32,
        max_results: usize,
    ) -> Result<SyncReport, SyncError> {
        let documents = self.recent_documents(days, max_results).await?;
        self.sync(&documents).await
    }

    pub async fn recent_documents(
        &self,
        days: u32,
        max_results: usize,
    ) -> Result<Vec<DocumentRecord>, SyncError> {
        self.activity.info(format!(
            "Discovering documents modified in the last {} days",
            days
        ));
        self.progress.report(SyncProgressEvent::Discovering {
            source: self.source.name().to_string(),
        });
        let mut documents = self
            .source
            .recent_documents(days, max_results)
            .await
            .map_err(|e| self.discovery_failed(e))?;
        documents.truncate(max_results);
        self.activity
            .info(format!("Found {} recent documents", documents.len()));
        Ok(documents)
    }

    pub async fn sync_folder(&self, folder_id: &str) -> Result<SyncReport, SyncError> {
        let documents = self.folder_documents(folder_id).await?;
        self.sync(&documents).await
    }

    pub async fn folder_documents(
        &self,
        folder_id: &str,
    ) -> Result<Vec<DocumentRecord>, SyncError> {
        self.activity
            .info(format!("Discovering documents in folder: {}", folder_id));
        self.progress.report(SyncProgressEvent::Discovering {
            source: self.source.name().to_string(),
        });
        let documents = self
            .source
            .folder_documents(folder_id)
            .await
            .map_err(|e| self.discovery_failed(e))?;
        self.activity
            .info(format!("Found {} documents in folder", documents.len()));
        Ok(documents)
    }

    fn discovery_failed(&self, e: anyhow::Error) -> SyncError {
        self.activity
            .error(format!("Error discovering documents: {:#}", e));
        SyncError::Discovery(e)
    }

    /// Sync a batch of discovered documents.
    ///
    /// Per-document failures are recorded in the report and in the state's
    /// failure list (which is replaced, not merged). Only a failure to load
    /// or commit the state is returned as an error.
    pub async fn sync(&self, documents: &[DocumentRecord]) -> Result<SyncReport, SyncError> {
        let started_at = Utc::now();
        let mut state = self.state.load().await.map_err(SyncError::StateLoad)?;

        let decisions: Vec<Eligibility> = documents
            .iter()
            .map(|doc| policy::evaluate(doc, &state))
            .collect();
        let eligible = decisions.iter().filter(|d| d.is_eligible()).count();

        self.activity.info(format!(
            "Starting sync of {} documents ({} eligible)",
            documents.len(),
            eligible
        ));

        let mut synced_count = 0;
        let mut chunks_written = 0;
        let mut skipped_unsupported = 0;
        let mut skipped_up_to_date = 0;
        let mut failures = Vec::new();
        let mut n = 0u64;

        for (doc, decision) in documents.iter().zip(decisions) {
            match decision {
                Eligibility::SkippedUnsupported => {
                    skipped_unsupported += 1;
                    debug!(document = %doc.name, "{}", decision);
                    continue;
                }
                Eligibility::SkippedUpToDate => {
                    skipped_up_to_date += 1;
                    debug!(document = %doc.name, "{}", decision);
                    continue;
                }
                Eligibility::Eligible(_) => {}
            }

            n += 1;
            self.progress.report(SyncProgressEvent::Syncing {
                source: self.source.name().to_string(),
                n,
                total: eligible as u64,
                document: doc.name.clone(),
            });

            let sync_time = Utc::now();
            match self.sync_document(doc, sync_time).await {
                Ok(count) => {
                    state.record_synced(doc, sync_time);
                    synced_count += 1;
                    chunks_written += count;
                    self.activity
                        .info(format!("Synced {} ({} chunks)", doc.name, count));
                }
                Err(e) => {
                    self.activity
                        .error(format!("Failed to sync {}: {}", doc.name, e));
                    failures.push(FailureEntry {
                        document_id: doc.id.clone(),
                        name: doc.name.clone(),
                        error_message: e.to_string(),
                    });
                }
            }
        }

        let finished_at = Utc::now();
        state.failed_documents = failures.clone();
        state.last_sync = Some(finished_at);

        if let Err(e) = self.state.commit(&state).await {
            self.activity
                .error(format!("Failed to persist sync state: {:#}", e));
            return Err(SyncError::StatePersistence(e));
        }

        let report = SyncReport {
            synced_count,
            failed_count: failures.len(),
            failed_documents: failures,
            total_processed: documents.len(),
            skipped_unsupported,
            skipped_up_to_date,
            chunks_written,
            started_at,
            finished_at,
        };

        let summary = format!(
            "Sync completed: {} synced, {} failed, {} skipped",
            report.synced_count,
            report.failed_count,
            report.skipped_unsupported + report.skipped_up_to_date
        );
        if report.success() {
            self.activity.info(summary);
        } else {
            self.activity.warning(summary);
        }
        Ok(report)
    }

    /// Download, extract, chunk and upsert one document. Returns the number
    /// of chunks written.
    ///
    /// The downloaded copy lives in a [`DownloadedFile`](crate::traits::DownloadedFile)
    /// and is deleted when this function returns, on every path.
    async fn sync_document(
        &self,
        doc: &DocumentRecord,
        sync_time: DateTime<Utc>,
    ) -> Result<usize, DocumentError> {
        let format = SupportedFormat::from_name(&doc.name)
            .ok_or_else(|| DocumentError::UnsupportedFormat(doc.name.clone()))?;

        let downloaded =
            self.source
                .download(&doc.id)
                .await
                .map_err(|e| DocumentError::Download {
                    name: doc.name.clone(),
                    reason: format!("{:#}", e),
                })?;

        let text = self
            .extractor
            .extract(downloaded.path(), format)
            .map_err(|source| DocumentError::Extraction {
                name: doc.name.clone(),
                source,
            })?;

        let provenance = self.provenance(doc, format, sync_time);
        let chunks = self
            .processor
            .process(&text, &self.source_name(doc), &provenance)
            .map_err(|e| match e {
                ChunkError::NoExtractableText(_) => {
                    DocumentError::NoExtractableText(doc.name.clone())
                }
            })?;

        let outcome = self
            .store
            .upsert(&chunks)
            .await
            .map_err(|e| DocumentError::StoreUpsert {
                name: doc.name.clone(),
                reason: format!("{:#}", e),
            })?;
        if !outcome.success {
            return Err(DocumentError::StoreUpsert {
                name: doc.name.clone(),
                reason: outcome.message,
            });
        }

        Ok(chunks.len())
    }

    /// Knowledge-store key for a document's chunks. Keyed by id, not name,
    /// so same-named documents in different folders never overwrite each
    /// other.
    fn source_name(&self, doc: &DocumentRecord) -> String {
        format!("{}:{}", self.source.name(), doc.id)
    }

    fn provenance(
        &self,
        doc: &DocumentRecord,
        format: SupportedFormat,
        sync_time: DateTime<Utc>,
    ) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("source".to_string(), self.source.name().to_string()),
            ("document_id".to_string(), doc.id.clone()),
            ("document_name".to_string(), doc.name.clone()),
            (
                "remote_modified".to_string(),
                doc.modified.to_rfc3339_opts(SecondsFormat::Secs, true),
            ),
            ("author".to_string(), doc.author.clone()),
            ("workspace".to_string(), doc.workspace.clone()),
            (
                "sync_time".to_string(),
                sync_time.to_rfc3339_opts(SecondsFormat::Secs, true),
            ),
            ("file_type".to_string(), format.extension().to_string()),
        ])
    }

    /// Cabinets, workspaces and up to `max_folders` folders per workspace.
    ///
    /// Only a failure to list the cabinets is an error. A cabinet or
    /// workspace whose children cannot be listed is logged as a warning and
    /// kept with no children.
    pub async fn cabinet_structure(
        &self,
        max_folders: usize,
    ) -> Result<Vec<CabinetTree>, SyncError> {
        let cabinets = self.source.cabinets().await.map_err(|e| {
            self.activity
                .error(format!("Error getting cabinet structure: {:#}", e));
            SyncError::Discovery(e)
        })?;

        let mut tree = Vec::with_capacity(cabinets.len());
        for cabinet in cabinets {
            let workspaces = match self.source.workspaces(&cabinet.id).await {
                Ok(workspaces) => workspaces,
                Err(e) => {
                    self.activity.warning(format!(
                        "Error getting workspaces for cabinet {}: {:#}",
                        cabinet.name, e
                    ));
                    Vec::new()
                }
            };

            let mut nodes = Vec::with_capacity(workspaces.len());
            for workspace in workspaces {
                let folders = match self.source.folders(&workspace.id).await {
                    Ok(mut folders) => {
                        folders.truncate(max_folders);
                        folders
                    }
                    Err(e) => {
                        self.activity.warning(format!(
                            "Error getting folders for workspace {}: {:#}",
                            workspace.name, e
                        ));
                        Vec::new()
                    }
                };
                nodes.push(WorkspaceTree { workspace, folders });
            }
            tree.push(CabinetTree {
                cabinet,
                workspaces: nodes,
            });
        }
        Ok(tree)
    }

    /// Last sync time, totals and failures from the stored state, plus a live
    /// connection check.
    pub async fn statistics(&self) -> Result<SyncStatistics, SyncError> {
        let SyncState {
            last_sync,
            synced_documents,
            failed_documents,
        } = self.state.load().await.map_err(SyncError::StateLoad)?;
        Ok(SyncStatistics {
            last_sync,
            total_synced: synced_documents.len(),
            failed_documents,
            connection_status: self.source.connection_status().await,
        })
    }
}
