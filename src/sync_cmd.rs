//! `docsync sync`, `docsync failures` and `docsync cabinets`.

use std::fmt;
use std::path::PathBuf;

use anyhow::Result;

use docsync_core::models::DocumentRecord;

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::progress::ProgressMode;
use crate::sources;
use crate::state::SyncLock;
use crate::sync::{CabinetTree, SyncEngine, SyncReport};

/// Which documents a `sync` invocation discovers.
#[derive(Debug, Clone)]
pub enum SyncTarget {
    Query {
        query: String,
        cabinet: Option<String>,
        max_results: usize,
    },
    Recent {
        days: u32,
        max_results: usize,
    },
    Folder {
        folder_id: String,
    },
}

impl fmt::Display for SyncTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncTarget::Query { query, cabinet, .. } => match cabinet {
                Some(c) => write!(f, "query \"{}\" in cabinet {}", query, c),
                None => write!(f, "query \"{}\"", query),
            },
            SyncTarget::Recent { days, .. } => write!(f, "recent {}d", days),
            SyncTarget::Folder { folder_id } => write!(f, "folder {}", folder_id),
        }
    }
}

/// Lock file next to the state file, held for the whole invocation.
fn lock_path(config: &Config) -> PathBuf {
    config.state.path.with_extension("lock")
}

pub async fn run_sync(
    config: &Config,
    target: SyncTarget,
    dry_run: bool,
    progress: ProgressMode,
) -> Result<()> {
    let source = sources::build_source(config, true)?;
    let source_name = source.name().to_string();
    let pool = db::connect(config).await?;
    migrate::run_migrations(&pool).await?;
    let engine = sources::build_engine(config, &pool, source, progress.reporter());

    if dry_run {
        let documents = discover(&engine, &target).await?;
        let plan = engine.plan(documents).await?;
        println!("sync {} {} (dry-run)", source_name, target);
        println!("  documents found: {}", plan.len());
        for (doc, decision) in &plan {
            println!("  {:<28} {}", decision.to_string(), doc.name);
        }
        let eligible = plan.iter().filter(|(_, d)| d.is_eligible()).count();
        println!("  would sync: {}", eligible);
        pool.close().await;
        return Ok(());
    }

    let _lock = SyncLock::acquire(lock_path(config))?;
    let documents = discover(&engine, &target).await?;
    let report = engine.sync(&documents).await?;

    println!("sync {} {}", source_name, target);
    print_report(&report);

    pool.close().await;
    Ok(())
}

async fn discover(engine: &SyncEngine, target: &SyncTarget) -> Result<Vec<DocumentRecord>> {
    let documents = match target {
        SyncTarget::Query {
            query,
            cabinet,
            max_results,
        } => {
            engine
                .discover_documents(query, *max_results, cabinet.as_deref())
                .await?
        }
        SyncTarget::Recent { days, max_results } => {
            engine.recent_documents(*days, *max_results).await?
        }
        SyncTarget::Folder { folder_id } => engine.folder_documents(folder_id).await?,
    };
    Ok(documents)
}

fn print_report(report: &SyncReport) {
    println!("  discovered: {} documents", report.total_processed);
    println!("  synced: {}", report.synced_count);
    println!("  failed: {}", report.failed_count);
    println!("  skipped (up to date): {}", report.skipped_up_to_date);
    println!("  skipped (unsupported): {}", report.skipped_unsupported);
    println!("  chunks written: {}", report.chunks_written);
    println!(
        "  duration: {} ms",
        (report.finished_at - report.started_at).num_milliseconds()
    );
    if report.success() {
        println!("ok");
        return;
    }
    println!("  failures:");
    for failure in &report.failed_documents {
        println!(
            "    {} ({}): {}",
            failure.name, failure.document_id, failure.error_message
        );
    }
    println!("completed with {} failure(s)", report.failed_count);
}

/// Print the failure list recorded by the most recent batch.
pub async fn run_failures(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate::run_migrations(&pool).await?;
    let state = sources::build_state_repository(config, &pool).load().await?;

    if state.failed_documents.is_empty() {
        println!("No failures in the last sync.");
    } else {
        println!("{:<24} {:<32} ERROR", "DOCUMENT ID", "NAME");
        for failure in &state.failed_documents {
            println!(
                "{:<24} {:<32} {}",
                failure.document_id, failure.name, failure.error_message
            );
        }
    }

    pool.close().await;
    Ok(())
}

/// Print the cabinet, workspace and folder tree. Folder ids are what
/// `docsync sync folder` takes.
pub async fn run_cabinets(config: &Config, max_folders: usize) -> Result<()> {
    let source = sources::build_source(config, true)?;
    let pool = db::connect(config).await?;
    migrate::run_migrations(&pool).await?;
    let engine = sources::build_engine(config, &pool, source, ProgressMode::Off.reporter());

    let tree = engine.cabinet_structure(max_folders).await?;
    print!("{}", render_tree(&tree));

    pool.close().await;
    Ok(())
}

fn render_tree(tree: &[CabinetTree]) -> String {
    if tree.is_empty() {
        return "No cabinets.\n".to_string();
    }
    let mut out = String::new();
    for cabinet in tree {
        out.push_str(&format!("{} [{}]\n", cabinet.cabinet.name, cabinet.cabinet.id));
        for ws in &cabinet.workspaces {
            out.push_str(&format!("  {} [{}]\n", ws.workspace.name, ws.workspace.id));
            for folder in &ws.folders {
                out.push_str(&format!("    {} [{}]\n", folder.name, folder.id));
            }
        }
    }
    out
}
