//! Core data models shared by the ingestion, query and comparison pipelines.

use serde::{Deserialize, Serialize};

/// Which extraction pass produced a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    /// Whole-document text layer of a PDF.
    FullText,
    /// One table detected on a PDF page, rendered as pipe-delimited rows.
    Table,
    /// OCR over every rasterised PDF page, page-numbered.
    Ocr,
    /// OCR over an uploaded image.
    Image,
}

/// A unit of extracted text plus the file it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub source: String,
    pub kind: ChunkKind,
}

impl Chunk {
    pub fn new(text: impl Into<String>, source: impl Into<String>, kind: ChunkKind) -> Self {
        Self {
            text: text.into(),
            source: source.into(),
            kind,
        }
    }

    /// Chunks with whitespace-only text never reach the index.
    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

/// A file received for ingestion.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Result of one ingestion call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// A fresh snapshot was written.
    Indexed { files: usize, chunks: usize },
    /// Nothing with text was extracted; the snapshot was left alone.
    NothingToProcess,
}

impl IngestOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            IngestOutcome::Indexed { .. } => "Files processed successfully",
            IngestOutcome::NothingToProcess => "No valid files found for processing",
        }
    }
}
