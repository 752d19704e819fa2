//! # docsync CLI
//!
//! ```bash
//! docsync --config ./config/docsync.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docsync init` | Create the SQLite database and schema |
//! | `docsync sync query [QUERY]` | Sync documents matching a full-text query |
//! | `docsync sync recent` | Sync documents modified in the last N days |
//! | `docsync sync folder <ID>` | Sync every document in a folder |
//! | `docsync status` | Last sync, totals, failures and connection status |
//! | `docsync failures` | Failures recorded by the last sync |
//! | `docsync cabinets` | Cabinets, workspaces and folder ids on the source |
//! | `docsync search "<query>"` | Keyword search over indexed chunks |
//!
//! Diagnostics go to stderr and are filtered with `RUST_LOG`
//! (default `warn`). Command output goes to stdout.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use docsync::config;
use docsync::migrate;
use docsync::progress::ProgressMode;
use docsync::search;
use docsync::stats;
use docsync::sync_cmd::{self, SyncTarget};

#[derive(Parser)]
#[command(
    name = "docsync",
    about = "Keep a local knowledge index in sync with a remote document store",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docsync.toml")]
    config: PathBuf,

    /// Progress on stderr: off, human or json. Defaults to human when
    /// stderr is a terminal.
    #[arg(long, global = true, value_parser = parse_progress)]
    progress: Option<ProgressMode>,

    #[command(subcommand)]
    command: Commands,
}

fn parse_progress(s: &str) -> Result<ProgressMode, String> {
    ProgressMode::parse(s)
        .ok_or_else(|| format!("invalid progress mode '{}': use off, human or json", s))
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Sync documents from the configured source.
    Sync {
        #[command(subcommand)]
        action: SyncAction,
    },

    /// Show last sync time, totals, failures and connection status.
    Status,

    /// List the documents that failed in the last sync.
    Failures,

    /// Show the cabinets, workspaces and folders on the source.
    Cabinets {
        /// Folders shown per workspace. Defaults to
        /// `sync.folders_per_workspace`.
        #[arg(long)]
        max_folders: Option<usize>,
    },

    /// Keyword search over indexed chunks.
    Search {
        query: String,

        #[arg(long, default_value_t = 10)]
        limit: i64,
    },
}

#[derive(Subcommand)]
enum SyncAction {
    /// Sync documents matching a full-text query.
    Query {
        /// Defaults to `sync.default_query`.
        query: Option<String>,

        /// Restrict the search to one cabinet.
        #[arg(long)]
        cabinet: Option<String>,

        /// Defaults to `sync.max_results`.
        #[arg(long)]
        max_results: Option<usize>,

        /// Show what would be synced without downloading or writing.
        #[arg(long)]
        dry_run: bool,
    },

    /// Sync documents modified within the trailing window.
    Recent {
        /// Defaults to `sync.recent_days`.
        #[arg(long)]
        days: Option<u32>,

        /// Defaults to `sync.recent_max_results`.
        #[arg(long)]
        max_results: Option<usize>,

        #[arg(long)]
        dry_run: bool,
    },

    /// Sync every document in a folder.
    Folder {
        folder_id: String,

        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    let progress = cli.progress.unwrap_or_else(ProgressMode::default_for_tty);

    match cli.command {
        Commands::Init => {
            migrate::init_database(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Sync { action } => {
            let (target, dry_run) = match action {
                SyncAction::Query {
                    query,
                    cabinet,
                    max_results,
                    dry_run,
                } => (
                    SyncTarget::Query {
                        query: query.unwrap_or_else(|| cfg.sync.default_query.clone()),
                        cabinet,
                        max_results: max_results.unwrap_or(cfg.sync.max_results),
                    },
                    dry_run,
                ),
                SyncAction::Recent {
                    days,
                    max_results,
                    dry_run,
                } => (
                    SyncTarget::Recent {
                        days: days.unwrap_or(cfg.sync.recent_days),
                        max_results: max_results.unwrap_or(cfg.sync.recent_max_results),
                    },
                    dry_run,
                ),
                SyncAction::Folder { folder_id, dry_run } => {
                    (SyncTarget::Folder { folder_id }, dry_run)
                }
            };
            sync_cmd::run_sync(&cfg, target, dry_run, progress).await?;
        }
        Commands::Status => {
            stats::run_status(&cfg).await?;
        }
        Commands::Failures => {
            sync_cmd::run_failures(&cfg).await?;
        }
        Commands::Cabinets { max_folders } => {
            let max_folders = max_folders.unwrap_or(cfg.sync.folders_per_workspace);
            sync_cmd::run_cabinets(&cfg, max_folders).await?;
        }
        Commands::Search { query, limit } => {
            search::run_search(&cfg, &query, limit).await?;
        }
    }

    Ok(())
}
