//! `docsync search`: keyword search over indexed chunks.

use anyhow::{Context, Result};

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::sqlite_store::SqliteKnowledgeStore;

pub async fn run_search(config: &Config, query: &str, limit: i64) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let pool = db::connect(config).await?;
    migrate::run_migrations(&pool).await?;
    let store = SqliteKnowledgeStore::new(pool.clone());
    let hits = store
        .search(&fts_query(query), limit)
        .await
        .with_context(|| format!("Search failed for query: {}", query))?;

    if hits.is_empty() {
        println!("No results.");
    }
    for (i, hit) in hits.iter().enumerate() {
        let name = hit.document_name.as_deref().unwrap_or(&hit.source_name);
        println!(
            "{}. [{:.2}] {} (chunk {}/{})",
            i + 1,
            hit.score,
            name,
            hit.chunk_index + 1,
            hit.chunk_count
        );
        if let Some(id) = &hit.document_id {
            println!("    document: {}", id);
        }
        println!("    {}", hit.snippet.replace('\n', " "));
    }

    pool.close().await;
    Ok(())
}

/// Quote each term so user input is never parsed as FTS5 syntax.
fn fts_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(|term| format!("\"{}\"", term.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terms_are_quoted() {
        assert_eq!(fts_query("rent  due"), "\"rent\" \"due\"");
        assert_eq!(fts_query("a\"b OR"), "\"a\"\"b\" \"OR\"");
    }
}
