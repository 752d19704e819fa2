//! `docsync status`: sync state and index overview.

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::progress::ProgressMode;
use crate::sources;
use crate::sqlite_store::SqliteKnowledgeStore;

pub async fn run_status(config: &Config) -> Result<()> {
    let source = sources::build_source(config, false)?;
    let source_name = source.name().to_string();
    let pool = db::connect(config).await?;
    migrate::run_migrations(&pool).await?;

    let engine = sources::build_engine(config, &pool, source, ProgressMode::Off.reporter());
    let stats = engine.statistics().await?;
    let index = SqliteKnowledgeStore::new(pool.clone());
    let chunks = index.chunk_count().await?;
    let documents = index.source_count().await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("docsync status");
    println!("==============");
    println!();
    println!("  Source:       {}", source_name);
    match (&stats.connection_status.user, &stats.connection_status.error) {
        (Some(user), _) if stats.connection_status.connected => {
            println!("  Connection:   connected as {}", user)
        }
        (_, Some(err)) => println!("  Connection:   disconnected ({})", err),
        _ => println!("  Connection:   disconnected"),
    }
    println!();
    println!("  Database:     {}", config.db.path.display());
    println!("  Size:         {}", format_bytes(db_size));
    println!("  Documents:    {}", documents);
    println!("  Chunks:       {}", chunks);
    println!();
    println!(
        "  Last sync:    {}",
        match stats.last_sync {
            Some(ts) => format_relative(ts, Utc::now()),
            None => "never".to_string(),
        }
    );
    println!("  Synced:       {}", stats.total_synced);
    println!("  Failed:       {}", stats.failed_documents.len());
    for failure in &stats.failed_documents {
        println!("    {}: {}", failure.name, failure.error_message);
    }
    println!();

    pool.close().await;
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// "3 hours ago" for recent times, an absolute timestamp otherwise.
fn format_relative(ts: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = (now - ts).num_seconds();
    let absolute = ts.format("%Y-%m-%d %H:%M UTC").to_string();
    if delta < 0 {
        return absolute;
    }

    let (n, unit) = if delta < 60 {
        return "just now".to_string();
    } else if delta < 3600 {
        (delta / 60, "min")
    } else if delta < 86400 {
        (delta / 3600, "hour")
    } else if delta < 86400 * 30 {
        (delta / 86400, "day")
    } else {
        return absolute;
    };
    format!("{} {}{} ago", n, unit, if n == 1 { "" } else { "s" })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn bytes_are_humanized() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn relative_times() {
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap();
        assert_eq!(format_relative(now - Duration::seconds(5), now), "just now");
        assert_eq!(format_relative(now - Duration::minutes(1), now), "1 min ago");
        assert_eq!(format_relative(now - Duration::hours(3), now), "3 hours ago");
        assert_eq!(format_relative(now - Duration::days(2), now), "2 days ago");
        assert_eq!(
            format_relative(now - Duration::days(90), now),
            "2024-03-12 12:00 UTC"
        );
    }
}
