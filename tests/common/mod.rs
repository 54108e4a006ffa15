//! Fake collaborators and helpers shared by the integration tests.

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use docrag::compare::ComparePipeline;
use docrag::embedding::EmbeddingProvider;
use docrag::extract::Extractor;
use docrag::generation::{GenerationProvider, GenerationRequest};
use docrag::ingest::IngestPipeline;
use docrag::models::{Chunk, ChunkKind, UploadedFile};
use docrag::query::{QueryEngine, QueryOptions};
use docrag::server::AppState;
use docrag::store::VectorStore;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const DIMS: usize = 64;

// ─── Embedder ───────────────────────────────────────────────────────

/// Bag-of-words embedder: each lowercase word adds 1.0 to the bucket
/// picked by its FNV-1a hash. Texts sharing words land close together.
pub struct HashEmbedder {
    pub dims: usize,
}

impl HashEmbedder {
    pub fn new() -> Self {
        Self { dims: DIMS }
    }

    pub fn vector(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims];
        for word in text.split_whitespace() {
            let word: String = word
                .chars()
                .filter(|c| c.is_alphanumeric())
                .flat_map(char::to_lowercase)
                .collect();
            if word.is_empty() {
                continue;
            }
            let bucket = (fnv1a(word.as_bytes()) % self.dims as u64) as usize;
            v[bucket] += 1.0;
        }
        v
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for b in bytes {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash"
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }
}

// ─── Generator ──────────────────────────────────────────────────────

/// Records every prompt and answers with a padded canned reply.
#[derive(Default)]
pub struct EchoGenerator {
    pub prompts: Mutex<Vec<String>>,
}

impl EchoGenerator {
    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl GenerationProvider for EchoGenerator {
    fn model_name(&self) -> &str {
        "echo"
    }
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        Ok(format!("  answered with {} tokens max \n", request.max_tokens))
    }
}

// ─── Extractor ──────────────────────────────────────────────────────

/// Returns preconfigured chunks keyed by saved file name.
#[derive(Default)]
pub struct FixedExtractor {
    by_name: HashMap<String, Vec<(String, ChunkKind)>>,
    pub calls: AtomicUsize,
}

impl FixedExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, chunks: &[(&str, ChunkKind)]) -> Self {
        self.by_name.insert(
            name.to_string(),
            chunks
                .iter()
                .map(|(text, kind)| (text.to_string(), *kind))
                .collect(),
        );
        self
    }

    fn chunks_for(&self, path: &Path) -> Vec<Chunk> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let source = path.display().to_string();
        self.by_name
            .get(&name)
            .map(|chunks| {
                chunks
                    .iter()
                    .map(|(text, kind)| Chunk::new(text.clone(), &source, *kind))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl Extractor for FixedExtractor {
    async fn extract_pdf(&self, path: &Path) -> Vec<Chunk> {
        self.chunks_for(path)
    }
    async fn extract_image(&self, path: &Path) -> Vec<Chunk> {
        self.chunks_for(path)
    }
}

/// Extractor for a small financial report and a receipt scan.
pub fn sample_extractor() -> FixedExtractor {
    FixedExtractor::new()
        .with(
            "report.pdf",
            &[
                ("quarterly revenue grew", ChunkKind::FullText),
                ("risk factors include currency", ChunkKind::Table),
                ("   ", ChunkKind::Ocr),
            ],
        )
        .with("scan.png", &[("receipt total paid", ChunkKind::Image)])
}

/// Extractor whose every chunk is blank.
pub fn blank_extractor() -> FixedExtractor {
    FixedExtractor::new()
        .with("blank.pdf", &[("", ChunkKind::FullText), (" \n ", ChunkKind::Ocr)])
        .with("blank.png", &[("\t", ChunkKind::Image)])
}

pub fn upload(name: &str) -> UploadedFile {
    UploadedFile {
        name: name.to_string(),
        bytes: format!("contents of {}", name).into_bytes(),
    }
}

// ─── Wiring ─────────────────────────────────────────────────────────

pub struct Harness {
    pub tmp: TempDir,
    pub index_path: PathBuf,
    pub upload_dir: PathBuf,
    pub extractor: Arc<FixedExtractor>,
    pub generator: Arc<EchoGenerator>,
    pub state: AppState,
}

impl Harness {
    pub fn new(extractor: FixedExtractor) -> Self {
        Self::with_top_k(extractor, 1)
    }

    pub fn with_top_k(extractor: FixedExtractor, top_k: usize) -> Self {
        let tmp = TempDir::new().unwrap();
        let index_path = tmp.path().join("db").join("vector_db.index");
        let upload_dir = tmp.path().join("uploads");
        let extractor = Arc::new(extractor);
        let generator = Arc::new(EchoGenerator::default());
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(HashEmbedder::new());
        let store = VectorStore::new(&index_path);

        let ingest = IngestPipeline::new(
            extractor.clone(),
            embedder.clone(),
            store.clone(),
            &upload_dir,
            2,
        );
        let query = Arc::new(QueryEngine::new(
            embedder,
            generator.clone(),
            store,
            QueryOptions {
                top_k,
                ..QueryOptions::default()
            },
        ));
        let state = AppState {
            ingest: Arc::new(ingest),
            compare: Arc::new(ComparePipeline::new(query.clone())),
            query,
        };

        Self {
            tmp,
            index_path,
            upload_dir,
            extractor,
            generator,
            state,
        }
    }

    pub fn store(&self) -> VectorStore {
        VectorStore::new(&self.index_path)
    }

    /// Raw bytes of both snapshot files, for unchanged-on-disk checks.
    pub fn snapshot_bytes(&self) -> (Vec<u8>, Vec<u8>) {
        let store = self.store();
        (
            std::fs::read(store.index_path()).unwrap(),
            std::fs::read(store.meta_path()).unwrap(),
        )
    }
}
