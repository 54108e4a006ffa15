//! Field comparison across ingested documents.
//!
//! Each requested field is used as a retrieval query on its own against
//! one snapshot loaded for the whole request; the hits are flattened into
//! one Markdown table, grouped by field in request order. No generation is
//! involved.

use std::sync::Arc;

use anyhow::Result;

use crate::error::RagError;
use crate::query::QueryEngine;

/// Number of characters of a chunk shown in a table cell.
pub const PREVIEW_CHARS: usize = 50;

/// One row of the comparison table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompareRow {
    pub field: String,
    pub chunk: String,
    pub source: String,
}

pub struct ComparePipeline {
    engine: Arc<QueryEngine>,
}

impl ComparePipeline {
    pub fn new(engine: Arc<QueryEngine>) -> Self {
        Self { engine }
    }

    /// Retrieve every field and return the rendered table.
    pub async fn compare(&self, fields: &[String]) -> Result<String> {
        let rows = self.collect_rows(fields).await?;
        Ok(render_table(&rows))
    }

    pub async fn collect_rows(&self, fields: &[String]) -> Result<Vec<CompareRow>> {
        if fields.is_empty() {
            return Err(RagError::MissingFields.into());
        }

        let snapshot = self.engine.load_snapshot().await?;
        let mut rows = Vec::new();
        for field in fields {
            let hits = self.engine.retrieve_in(snapshot.as_ref(), field).await?;
            tracing::debug!(field = %field, hits = hits.len(), "field retrieved");
            rows.extend(hits.into_iter().map(|chunk| CompareRow {
                field: field.clone(),
                chunk: chunk.text,
                source: chunk.source,
            }));
        }
        Ok(rows)
    }
}

pub fn render_table(rows: &[CompareRow]) -> String {
    let mut out = String::from("### Comparison Results:\n\n");
    out.push_str("| Field           | Chunk                         | Source         |\n");
    out.push_str("|-----------------|-------------------------------|----------------|\n");
    for row in rows {
        out.push_str(&format!(
            "| {} | {}... | {} |\n",
            row.field,
            preview(&row.chunk),
            row.source
        ));
    }
    out
}

/// First [`PREVIEW_CHARS`] characters, never splitting a code point.
fn preview(text: &str) -> &str {
    match text.char_indices().nth(PREVIEW_CHARS) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}
