//! Index statistics.
//!
//! Summarizes a persisted snapshot: node counts by kind, document count,
//! file size, and when it was built. Used by `trag stats`.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::path::Path;

use table_rag_core::models::ContentKind;
use table_rag_core::store::VectorStore;

use crate::persist::load_index;

/// Run the stats command: open the snapshot and print a summary.
pub async fn run_stats(index_dir: &Path) -> Result<()> {
    let index = load_index(index_dir).await?;
    let stats = index.store.stats().await?;

    let db_size = std::fs::metadata(index.db_path())
        .map(|m| m.len())
        .unwrap_or(0);

    println!("table-rag: Index Stats");
    println!("======================");
    println!();
    println!("  Index:       {}", index.dir.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!("  Built:       {}", format_built_at(index.manifest.built_at, Utc::now()));
    println!();
    println!("  Documents:   {}", stats.documents);
    println!("  Nodes:       {}", stats.total);
    for kind in [ContentKind::Table, ContentKind::Text, ContentKind::Image] {
        println!("    {:<10} {}", kind.as_str(), stats.count(kind));
    }

    let keys = &index.manifest.metadata_keys;
    println!();
    println!(
        "  Metadata keys: document={} page={} kind={} markup={}",
        keys.document_id, keys.page, keys.kind, keys.table_markup
    );
    println!();

    index.store.close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
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

/// Build time relative to `now` ("3 hours ago"), absolute once older than a month.
fn format_built_at(built_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = (now - built_at).num_seconds();
    let absolute = built_at.format("%Y-%m-%d %H:%M").to_string();

    if delta < 0 {
        absolute
    } else if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        absolute
    }
}
