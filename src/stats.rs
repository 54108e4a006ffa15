//! Snapshot statistics.
//!
//! Summarises what is currently indexed: row count, dimensionality, when
//! the snapshot was written, file sizes and a per-source breakdown of
//! chunks by extraction kind. Used by `docrag stats`.

use std::collections::BTreeMap;

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::config::Config;
use crate::models::ChunkKind;
use crate::store::{Snapshot, VectorStore};

/// Chunk counts for one source file.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SourceStats {
    pub full_text: usize,
    pub tables: usize,
    pub ocr: usize,
    pub image: usize,
}

impl SourceStats {
    pub fn total(&self) -> usize {
        self.full_text + self.tables + self.ocr + self.image
    }
}

/// Per-source breakdown, keyed and ordered by source path.
pub fn by_source(snapshot: &Snapshot) -> BTreeMap<String, SourceStats> {
    let mut out: BTreeMap<String, SourceStats> = BTreeMap::new();
    for chunk in &snapshot.metadata {
        let entry = out.entry(chunk.source.clone()).or_default();
        match chunk.kind {
            ChunkKind::FullText => entry.full_text += 1,
            ChunkKind::Table => entry.tables += 1,
            ChunkKind::Ocr => entry.ocr += 1,
            ChunkKind::Image => entry.image += 1,
        }
    }
    out
}

/// Run the stats command: load the snapshot and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let store = VectorStore::new(&config.storage.index_path);

    println!("docrag: snapshot stats");
    println!("======================");
    println!();
    println!("  Index:       {}", store.index_path().display());

    let Some(snapshot) = store.load_async().await? else {
        println!("  (no snapshot yet; ingest some files first)");
        println!();
        return Ok(());
    };

    let index_size = file_size(store.index_path());
    let meta_size = file_size(&store.meta_path());
    println!(
        "  Size:        {} index + {} metadata",
        format_bytes(index_size),
        format_bytes(meta_size)
    );
    println!();
    println!("  Rows:        {}", snapshot.len());
    println!("  Dimensions:  {}", snapshot.dims());
    println!("  Written:     {}", format_relative(snapshot.created_at));

    let sources = by_source(&snapshot);
    if !sources.is_empty() {
        println!();
        println!("  By source:");
        println!(
            "  {:<40} {:>6} {:>6} {:>6} {:>6} {:>6}",
            "SOURCE", "TEXT", "TABLE", "OCR", "IMAGE", "TOTAL"
        );
        println!("  {}", "-".repeat(76));
        for (source, s) in &sources {
            println!(
                "  {:<40} {:>6} {:>6} {:>6} {:>6} {:>6}",
                source,
                s.full_text,
                s.tables,
                s.ocr,
                s.image,
                s.total()
            );
        }
    }

    println!();
    Ok(())
}

fn file_size(path: &std::path::Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
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

/// "3 hours ago" for recent times, an absolute timestamp otherwise.
fn format_relative(ts: DateTime<Utc>) -> String {
    let delta = (Utc::now() - ts).num_seconds();
    let absolute = ts.format("%Y-%m-%d %H:%M UTC").to_string();

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
