//! Ingestion pipeline orchestration.
//!
//! Coordinates the upload flow: save → extract → drop empty chunks →
//! embed → build index → persist snapshot. [`IngestPipeline::ingest`]
//! replaces the stored snapshot wholesale; [`IngestPipeline::append`] is
//! the separate incremental path that adds rows to it.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::embedding::{embed_texts, EmbeddingProvider};
use crate::error::RagError;
use crate::extract::{Extractor, FileKind};
use crate::models::{Chunk, IngestOutcome, UploadedFile};
use crate::store::{Snapshot, VectorStore};

pub struct IngestPipeline {
    extractor: Arc<dyn Extractor>,
    embedder: Arc<dyn EmbeddingProvider>,
    store: VectorStore,
    upload_dir: PathBuf,
    batch_size: usize,
}

impl IngestPipeline {
    pub fn new(
        extractor: Arc<dyn Extractor>,
        embedder: Arc<dyn EmbeddingProvider>,
        store: VectorStore,
        upload_dir: impl Into<PathBuf>,
        batch_size: usize,
    ) -> Self {
        Self {
            extractor,
            embedder,
            store,
            upload_dir: upload_dir.into(),
            batch_size,
        }
    }

    /// Ingest a batch and replace the stored snapshot with it.
    ///
    /// Returns [`IngestOutcome::NothingToProcess`] without touching the
    /// snapshot when no file yields any text.
    pub async fn ingest(&self, files: Vec<UploadedFile>) -> Result<IngestOutcome> {
        let file_count = files.len();
        let chunks = self.collect_chunks(files).await?;
        if chunks.is_empty() {
            tracing::info!(files = file_count, "no text extracted, snapshot left unchanged");
            return Ok(IngestOutcome::NothingToProcess);
        }

        let embeddings = self.embed_chunks(&chunks).await?;
        let snapshot = Snapshot::build(self.embedder.dims(), embeddings, chunks)?;
        let rows = self.store.save_async(snapshot).await?.len();

        tracing::info!(files = file_count, chunks = rows, "ingestion complete");
        Ok(IngestOutcome::Indexed {
            files: file_count,
            chunks: rows,
        })
    }

    /// Ingest a batch and append it to the stored snapshot.
    pub async fn append(&self, files: Vec<UploadedFile>) -> Result<IngestOutcome> {
        let file_count = files.len();
        let chunks = self.collect_chunks(files).await?;
        if chunks.is_empty() {
            return Ok(IngestOutcome::NothingToProcess);
        }

        let added = chunks.len();
        let embeddings = self.embed_chunks(&chunks).await?;
        let snapshot = self
            .store
            .insert_documents_async(embeddings, chunks)
            .await?;

        tracing::info!(
            files = file_count,
            added,
            total = snapshot.len(),
            "appended to snapshot"
        );
        Ok(IngestOutcome::Indexed {
            files: file_count,
            chunks: added,
        })
    }

    /// Save every file and extract its non-empty chunks.
    async fn collect_chunks(&self, files: Vec<UploadedFile>) -> Result<Vec<Chunk>> {
        if files.is_empty() {
            return Err(RagError::NoFiles.into());
        }

        let mut all_chunks = Vec::new();
        for file in &files {
            let saved = self.save_upload(file).await?;
            let Some(kind) = FileKind::from_name(&file.name) else {
                tracing::info!(file = %file.name, "unsupported file type, skipped");
                continue;
            };

            let chunks = self.extractor.extract(kind, &saved).await;
            tracing::debug!(file = %saved.display(), chunks = chunks.len(), "extracted");
            all_chunks.extend(chunks);
        }

        all_chunks.retain(Chunk::has_text);
        Ok(all_chunks)
    }

    async fn embed_chunks(&self, chunks: &[Chunk]) -> Result<Vec<Vec<f32>>> {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        embed_texts(self.embedder.as_ref(), &texts, self.batch_size).await
    }

    /// Write an upload into the managed directory under a sanitized name.
    pub async fn save_upload(&self, file: &UploadedFile) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.upload_dir)
            .await
            .with_context(|| {
                format!(
                    "Failed to create upload directory: {}",
                    self.upload_dir.display()
                )
            })?;
        let path = self.upload_dir.join(sanitize_filename(&file.name));
        tokio::fs::write(&path, &file.bytes)
            .await
            .with_context(|| format!("Failed to save upload: {}", path.display()))?;
        Ok(path)
    }
}

/// Reduce a client-supplied name to a safe single path component.
///
/// Directory parts are dropped, whitespace becomes `_`, anything other
/// than ASCII alphanumerics, `.`, `-` and `_` is removed, and leading or
/// trailing dots and underscores are trimmed. An empty result becomes
/// `"upload"`.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .filter_map(|c| {
            if c.is_whitespace() {
                Some('_')
            } else if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                Some(c)
            } else {
                None
            }
        })
        .collect();
    let trimmed = cleaned.trim_matches(|c| c == '.' || c == '_');
    if trimmed.is_empty() {
        "upload".to_string()
    } else {
        trimmed.to_string()
    }
}
