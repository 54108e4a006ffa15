//! Retrieval and answer generation.
//!
//! [`QueryEngine::retrieve`] embeds a query and looks up its nearest
//! chunks in the current snapshot; [`QueryEngine::answer`] adds prompt
//! construction and a call to the generation backend. The comparison
//! pipeline loads the snapshot once with [`QueryEngine::load_snapshot`]
//! and runs every field through [`QueryEngine::retrieve_in`] without
//! generating.

use std::sync::Arc;

use anyhow::Result;

use crate::embedding::{embed_query, EmbeddingProvider};
use crate::error::RagError;
use crate::generation::{GenerationProvider, GenerationRequest};
use crate::models::Chunk;
use crate::store::{Snapshot, VectorStore};

/// Tunables for one engine, taken from `[retrieval]` and `[generation]`.
#[derive(Debug, Clone, Copy)]
pub struct QueryOptions {
    pub top_k: usize,
    pub max_tokens: usize,
    pub temperature: f32,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            top_k: 5,
            max_tokens: 500,
            temperature: 0.2,
        }
    }
}

pub struct QueryEngine {
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn GenerationProvider>,
    store: VectorStore,
    options: QueryOptions,
}

impl QueryEngine {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn GenerationProvider>,
        store: VectorStore,
        options: QueryOptions,
    ) -> Self {
        Self {
            embedder,
            generator,
            store,
            options,
        }
    }

    /// The current snapshot, `None` before the first ingestion.
    pub async fn load_snapshot(&self) -> Result<Option<Snapshot>> {
        self.store.load_async().await
    }

    /// Nearest chunks for `query`, closest first.
    ///
    /// Empty when nothing has been ingested yet.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<Chunk>> {
        let snapshot = self.load_snapshot().await?;
        self.retrieve_in(snapshot.as_ref(), query).await
    }

    /// [`retrieve`](Self::retrieve) against an already loaded snapshot.
    pub async fn retrieve_in(&self, snapshot: Option<&Snapshot>, query: &str) -> Result<Vec<Chunk>> {
        let vector = embed_query(self.embedder.as_ref(), query).await?;
        let Some(snapshot) = snapshot else {
            return Ok(Vec::new());
        };
        let hits = snapshot.search(&vector, self.options.top_k)?;
        Ok(hits.into_iter().cloned().collect())
    }

    /// Answer `query` from retrieved context.
    ///
    /// A generation failure is not an error: its message comes back as the
    /// answer text.
    pub async fn answer(&self, query: &str) -> Result<String> {
        if query.trim().is_empty() {
            return Err(RagError::MissingQuery.into());
        }

        let chunks = self.retrieve(query).await?;
        tracing::debug!(retrieved = chunks.len(), "context assembled");
        let prompt = build_prompt(&build_context(&chunks), query);

        let request = GenerationRequest {
            prompt,
            max_tokens: self.options.max_tokens,
            temperature: self.options.temperature,
        };
        match self.generator.generate(&request).await {
            Ok(text) => Ok(text.trim().to_string()),
            Err(e) => {
                tracing::warn!(
                    model = self.generator.model_name(),
                    error = %e,
                    "generation failed"
                );
                Ok(format!("Error generating response: {}", e))
            }
        }
    }
}

/// Join the non-empty chunk texts with newlines.
pub fn build_context(chunks: &[Chunk]) -> String {
    chunks
        .iter()
        .filter(|c| c.has_text())
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn build_prompt(context: &str, query: &str) -> String {
    format!(
        "Given the following context:\n\n{}\n\nPlease answer the following question based on the above context:\n{}",
        context, query
    )
}
