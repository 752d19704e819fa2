//! Wiring from configuration to concrete collaborators.

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::SqlitePool;

use docsync_core::chunk::ChunkingProcessor;
use docsync_core::store::StateRepository;

use crate::activity::ActivityLog;
use crate::config::{Config, SourceKind, StateBackend};
use crate::connector_fs::DirectorySource;
use crate::connector_netdocs::{self, NetDocumentsClient};
use crate::progress::SyncProgressReporter;
use crate::sqlite_store::SqliteKnowledgeStore;
use crate::state::{JsonFileStateRepository, SqliteStateRepository};
use crate::sync::SyncEngine;
use crate::traits::{FileExtractor, RemoteSource};

/// The remote source selected by `[source] kind`.
///
/// With `require_auth`, a NetDocuments source without a token is an error
/// up front instead of a failure on the first request.
pub fn build_source(config: &Config, require_auth: bool) -> Result<Arc<dyn RemoteSource>> {
    match config.source.kind {
        SourceKind::Netdocuments => {
            let nd = config
                .source
                .netdocuments
                .as_ref()
                .context("[source.netdocuments] is missing")?;
            if require_auth {
                connector_netdocs::require_token(nd)?;
            }
            Ok(Arc::new(NetDocumentsClient::new(nd)?))
        }
        SourceKind::Directory => {
            let dir = config
                .source
                .directory
                .as_ref()
                .context("[source.directory] is missing")?;
            Ok(Arc::new(DirectorySource::new(&dir.root)))
        }
    }
}

pub fn build_state_repository(config: &Config, pool: &SqlitePool) -> Arc<dyn StateRepository> {
    match config.state.backend {
        StateBackend::File => Arc::new(JsonFileStateRepository::new(&config.state.path)),
        StateBackend::Sqlite => Arc::new(SqliteStateRepository::new(pool.clone())),
    }
}

/// A fully wired engine: configured source, file extractor, SQLite
/// knowledge store, configured state backend and activity log.
pub fn build_engine(
    config: &Config,
    pool: &SqlitePool,
    source: Arc<dyn RemoteSource>,
    progress: Box<dyn SyncProgressReporter>,
) -> SyncEngine {
    SyncEngine::new(
        source,
        Arc::new(FileExtractor),
        ChunkingProcessor::new(config.chunking.chunk_size, config.chunking.chunk_overlap),
        Arc::new(SqliteKnowledgeStore::new(pool.clone())),
        build_state_repository(config, pool),
    )
    .with_activity_log(ActivityLog::to_file(&config.state.activity_log))
    .with_progress(progress)
}
