//! TOML configuration.
//!
//! ```toml
//! [db]
//! path = "./data/docsync.sqlite"
//!
//! [chunking]
//! chunk_size = 1000
//! chunk_overlap = 200
//!
//! [state]
//! backend = "file"            # or "sqlite"
//! path = "./data/sync_state.json"
//! activity_log = "./data/sync.log"
//!
//! [source]
//! kind = "netdocuments"       # or "directory"
//!
//! [source.netdocuments]
//! base_url = "https://api.vault.netvoyage.com"
//! access_token_env = "NETDOCUMENTS_ACCESS_TOKEN"
//!
//! [sync]
//! default_query = "*"
//! max_results = 100
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub state: StateConfig,
    pub source: SourceConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    docsync_core::chunk::DEFAULT_CHUNK_SIZE
}
fn default_chunk_overlap() -> usize {
    docsync_core::chunk::DEFAULT_CHUNK_OVERLAP
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StateBackend {
    File,
    Sqlite,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StateConfig {
    #[serde(default = "default_state_backend")]
    pub backend: StateBackend,
    #[serde(default = "default_state_path")]
    pub path: PathBuf,
    #[serde(default = "default_activity_log")]
    pub activity_log: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            backend: default_state_backend(),
            path: default_state_path(),
            activity_log: default_activity_log(),
        }
    }
}

fn default_state_backend() -> StateBackend {
    StateBackend::File
}
fn default_state_path() -> PathBuf {
    PathBuf::from("./data/sync_state.json")
}
fn default_activity_log() -> PathBuf {
    PathBuf::from("./data/sync.log")
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Netdocuments,
    Directory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub kind: SourceKind,
    pub netdocuments: Option<NetDocumentsConfig>,
    pub directory: Option<DirectorySourceConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NetDocumentsConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Inline token. Prefer `access_token_env` outside of local testing.
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default = "default_token_env")]
    pub access_token_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.vault.netvoyage.com".to_string()
}
fn default_token_env() -> String {
    "NETDOCUMENTS_ACCESS_TOKEN".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}

impl NetDocumentsConfig {
    /// Token from config, falling back to the configured environment variable.
    pub fn resolve_token(&self) -> Option<String> {
        self.access_token
            .clone()
            .filter(|t| !t.is_empty())
            .or_else(|| std::env::var(&self.access_token_env).ok())
            .filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DirectorySourceConfig {
    pub root: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    #[serde(default = "default_query")]
    pub default_query: String,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_recent_days")]
    pub recent_days: u32,
    #[serde(default = "default_recent_max_results")]
    pub recent_max_results: usize,
    /// Folders listed per workspace by `docsync cabinets`.
    #[serde(default = "default_folders_per_workspace")]
    pub folders_per_workspace: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            default_query: default_query(),
            max_results: default_max_results(),
            recent_days: default_recent_days(),
            recent_max_results: default_recent_max_results(),
            folders_per_workspace: default_folders_per_workspace(),
        }
    }
}

fn default_query() -> String {
    "*".to_string()
}
fn default_max_results() -> usize {
    100
}
fn default_recent_days() -> u32 {
    30
}
fn default_recent_max_results() -> usize {
    50
}
fn default_folders_per_workspace() -> usize {
    10
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if config.chunking.chunk_size == 0 {
        bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.chunk_overlap >= config.chunking.chunk_size {
        bail!(
            "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
            config.chunking.chunk_overlap,
            config.chunking.chunk_size
        );
    }

    if config.sync.max_results == 0 || config.sync.recent_max_results == 0 {
        bail!("sync.max_results and sync.recent_max_results must be >= 1");
    }

    match config.source.kind {
        SourceKind::Netdocuments if config.source.netdocuments.is_none() => {
            bail!("source.kind is 'netdocuments' but [source.netdocuments] is missing")
        }
        SourceKind::Directory if config.source.directory.is_none() => {
            bail!("source.kind is 'directory' but [source.directory] is missing")
        }
        _ => {}
    }

    Ok(config)
}
