//! Text extraction for uploaded PDFs and images.
//!
//! [`Extractor`] is the seam the ingestion pipeline calls. The production
//! implementation, [`PdfImageExtractor`], produces for a PDF:
//!
//! 1. one [`ChunkKind::FullText`] chunk from the text layer (`pdf-extract`),
//! 2. one [`ChunkKind::Table`] chunk per detected table (glyph positions
//!    from `pdf-extract` grouped by [`crate::table::PageLayout`]),
//! 3. one [`ChunkKind::Ocr`] chunk aggregating OCR over every page,
//!
//! and for an image a single [`ChunkKind::Image`] chunk. Each step runs in
//! isolation: a failing step is logged and contributes nothing, the others
//! still run. Whitespace-only chunks are never returned.

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::ExtractionConfig;
use crate::models::{Chunk, ChunkKind};
use crate::ocr;
use crate::table;

/// Failure inside one extraction step.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("OCR failed: {0}")]
    Ocr(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("extraction task panicked: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Uploaded file types the pipeline understands, decided by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Image,
}

impl FileKind {
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".pdf") {
            Some(FileKind::Pdf)
        } else if lower.ends_with(".png") || lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
            Some(FileKind::Image)
        } else {
            None
        }
    }
}

#[async_trait]
pub trait Extractor: Send + Sync {
    /// Full extraction (text layer, tables, page OCR) of a saved PDF.
    async fn extract_pdf(&self, path: &Path) -> Vec<Chunk>;
    /// OCR-only extraction of a saved image.
    async fn extract_image(&self, path: &Path) -> Vec<Chunk>;

    /// Dispatch on [`FileKind`].
    async fn extract(&self, kind: FileKind, path: &Path) -> Vec<Chunk> {
        match kind {
            FileKind::Pdf => self.extract_pdf(path).await,
            FileKind::Image => self.extract_image(path).await,
        }
    }
}

/// Extractor backed by `pdf-extract`, `lopdf`, Tesseract and pdftoppm.
pub struct PdfImageExtractor {
    config: ExtractionConfig,
}

impl PdfImageExtractor {
    pub fn new(config: ExtractionConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Extractor for PdfImageExtractor {
    async fn extract_pdf(&self, path: &Path) -> Vec<Chunk> {
        let source = path.display().to_string();
        let mut chunks = Vec::new();

        match pdf_text(path).await {
            Ok(text) => chunks.push(Chunk::new(text, &source, ChunkKind::FullText)),
            Err(e) => tracing::warn!(file = %source, error = %e, "text extraction failed"),
        }

        match pdf_tables(path, self.config.min_table_rows).await {
            Ok(tables) => {
                tracing::debug!(file = %source, tables = tables.len(), "tables detected");
                chunks.extend(
                    tables
                        .iter()
                        .map(|t| Chunk::new(t.render(), &source, ChunkKind::Table)),
                );
            }
            Err(e) => tracing::warn!(file = %source, error = %e, "table extraction failed"),
        }

        if self.config.ocr {
            match ocr::ocr_pdf_pages(&self.config, path).await {
                Ok(text) => chunks.push(Chunk::new(text, &source, ChunkKind::Ocr)),
                Err(e) => tracing::warn!(file = %source, error = %e, "page OCR failed"),
            }
        }

        chunks.retain(Chunk::has_text);
        chunks
    }

    async fn extract_image(&self, path: &Path) -> Vec<Chunk> {
        let source = path.display().to_string();
        if !self.config.ocr {
            tracing::info!(file = %source, "OCR disabled, skipping image");
            return Vec::new();
        }

        let mut chunks = Vec::new();
        match ocr::ocr_image(&self.config, path).await {
            Ok(text) => chunks.push(Chunk::new(text, &source, ChunkKind::Image)),
            Err(e) => tracing::warn!(file = %source, error = %e, "image OCR failed"),
        }
        chunks.retain(Chunk::has_text);
        chunks
    }
}

/// Whole-document text layer.
pub async fn pdf_text(path: &Path) -> Result<String, ExtractError> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let bytes = std::fs::read(&path)?;
        pdf_extract::extract_text_from_mem(&bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
    })
    .await?
}

/// Tables found on every page, in page order.
pub async fn pdf_tables(path: &Path, min_rows: usize) -> Result<Vec<table::Table>, ExtractError> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let doc = lopdf::Document::load(&path).map_err(|e| ExtractError::Pdf(e.to_string()))?;
        let mut layout = table::PageLayout::new();
        pdf_extract::output_doc(&doc, &mut layout).map_err(|e| ExtractError::Pdf(e.to_string()))?;

        let mut tables = Vec::new();
        for (page, runs) in layout.into_pages() {
            let found = table::detect_tables(&runs, min_rows);
            if !found.is_empty() {
                tracing::debug!(file = %path.display(), page, tables = found.len(), "page tables");
            }
            tables.extend(found);
        }
        Ok(tables)
    })
    .await?
}
