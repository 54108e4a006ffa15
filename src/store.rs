//! Snapshot persistence.
//!
//! A snapshot is the `(index, embeddings, metadata)` triple. It lives in
//! two sibling files:
//!
//! | File | Content |
//! |------|---------|
//! | `<index_path>` | [`FlatIndex`] binary layout |
//! | `<index_path>.meta.json` | [`SnapshotMeta`] JSON: embeddings, chunks, checksum |
//!
//! Each file is written to a temporary sibling and renamed into place. The
//! pair as a whole is not atomic: a reader racing a writer can see a new
//! index next to an old sidecar. The sidecar records the SHA-256 of the
//! index bytes it belongs to, and [`VectorStore::load`] rejects a
//! mismatched pair as [`RagError::CorruptSnapshot`]. Only one writer at a
//! time is supported.
//!
//! [`VectorStore::save`] and [`VectorStore::load`] do blocking file I/O and
//! hashing. Async callers use the `*_async` variants, which run the same
//! work on Tokio's blocking pool.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::RagError;
use crate::index::{FlatIndex, SearchHits};
use crate::models::Chunk;

/// The in-memory form of a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub index: FlatIndex,
    pub embeddings: Vec<Vec<f32>>,
    pub metadata: Vec<Chunk>,
    pub created_at: DateTime<Utc>,
}

impl Snapshot {
    /// Assemble a snapshot, enforcing row alignment.
    pub fn new(index: FlatIndex, embeddings: Vec<Vec<f32>>, metadata: Vec<Chunk>) -> Result<Self> {
        let snapshot = Self {
            index,
            embeddings,
            metadata,
            created_at: Utc::now(),
        };
        snapshot.check_alignment()?;
        Ok(snapshot)
    }

    /// Build a fresh index over `embeddings`.
    pub fn build(dims: usize, embeddings: Vec<Vec<f32>>, metadata: Vec<Chunk>) -> Result<Self> {
        let index = FlatIndex::build(dims, &embeddings)?;
        Self::new(index, embeddings, metadata)
    }

    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    pub fn dims(&self) -> usize {
        self.index.dims()
    }

    /// Append rows to index, embeddings and metadata together.
    pub fn append(&mut self, embeddings: Vec<Vec<f32>>, metadata: Vec<Chunk>) -> Result<()> {
        if embeddings.len() != metadata.len() {
            anyhow::bail!(
                "cannot append {} vectors with {} chunks",
                embeddings.len(),
                metadata.len()
            );
        }
        self.index.add(&embeddings)?;
        self.embeddings.extend(embeddings);
        self.metadata.extend(metadata);
        self.created_at = Utc::now();
        Ok(())
    }

    /// Nearest chunks to `query`, best first.
    ///
    /// Labels that do not address a metadata row are dropped.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<&Chunk>> {
        let hits = self.index.search(query, k)?;
        Ok(resolve_hits(&hits, &self.metadata))
    }

    fn check_alignment(&self) -> Result<()> {
        let rows = self.index.len();
        if rows != self.embeddings.len() || rows != self.metadata.len() {
            return Err(RagError::CorruptSnapshot(format!(
                "index has {} rows, embeddings {}, metadata {}",
                rows,
                self.embeddings.len(),
                self.metadata.len()
            ))
            .into());
        }
        Ok(())
    }
}

/// Map search labels onto metadata, skipping padding and out-of-range rows.
pub fn resolve_hits<'a>(hits: &SearchHits, metadata: &'a [Chunk]) -> Vec<&'a Chunk> {
    hits.labels
        .iter()
        .filter_map(|&label| usize::try_from(label).ok())
        .filter_map(|i| metadata.get(i))
        .collect()
}

/// On-disk sidecar next to the index file.
#[derive(Debug, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub dims: usize,
    pub rows: usize,
    pub index_sha256: String,
    pub created_at: DateTime<Utc>,
    pub embeddings: Vec<Vec<f32>>,
    pub metadata: Vec<Chunk>,
}

/// Reads and writes snapshots at a fixed path.
#[derive(Debug, Clone)]
pub struct VectorStore {
    index_path: PathBuf,
}

impl VectorStore {
    pub fn new(index_path: impl Into<PathBuf>) -> Self {
        Self {
            index_path: index_path.into(),
        }
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    pub fn meta_path(&self) -> PathBuf {
        let mut name = self.index_path.as_os_str().to_owned();
        name.push(".meta.json");
        PathBuf::from(name)
    }

    pub fn exists(&self) -> bool {
        self.index_path.exists()
    }

    /// Overwrite both files with `snapshot`.
    pub fn save(&self, snapshot: &Snapshot) -> Result<()> {
        snapshot.check_alignment()?;

        if let Some(parent) = self.index_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create index directory: {}", parent.display())
                })?;
            }
        }

        let index_bytes = snapshot.index.to_bytes();
        let meta = SnapshotMeta {
            dims: snapshot.index.dims(),
            rows: snapshot.len(),
            index_sha256: sha256_hex(&index_bytes),
            created_at: snapshot.created_at,
            embeddings: snapshot.embeddings.clone(),
            metadata: snapshot.metadata.clone(),
        };
        let meta_bytes = serde_json::to_vec(&meta)?;

        write_replace(&self.index_path, &index_bytes)?;
        write_replace(&self.meta_path(), &meta_bytes)?;

        tracing::info!(
            path = %self.index_path.display(),
            rows = meta.rows,
            dims = meta.dims,
            "snapshot saved"
        );
        Ok(())
    }

    /// Load the current snapshot, or `None` if none has been written yet.
    pub fn load(&self) -> Result<Option<Snapshot>> {
        if !self.index_path.exists() {
            tracing::info!(
                path = %self.index_path.display(),
                "no snapshot on disk yet"
            );
            return Ok(None);
        }

        let index_bytes = std::fs::read(&self.index_path)
            .with_context(|| format!("Failed to read index: {}", self.index_path.display()))?;
        let meta_path = self.meta_path();
        let meta_bytes = std::fs::read(&meta_path).map_err(|e| {
            RagError::CorruptSnapshot(format!(
                "index present but metadata unreadable ({}): {}",
                meta_path.display(),
                e
            ))
        })?;
        let meta: SnapshotMeta = serde_json::from_slice(&meta_bytes)
            .map_err(|e| RagError::CorruptSnapshot(format!("metadata: {}", e)))?;

        if meta.index_sha256 != sha256_hex(&index_bytes) {
            return Err(RagError::CorruptSnapshot(
                "index file does not match its metadata (concurrent write?)".to_string(),
            )
            .into());
        }

        let index = FlatIndex::from_bytes(&index_bytes)?;
        if index.dims() != meta.dims {
            return Err(RagError::CorruptSnapshot(format!(
                "index dims {} but metadata says {}",
                index.dims(),
                meta.dims
            ))
            .into());
        }

        let snapshot = Snapshot {
            index,
            embeddings: meta.embeddings,
            metadata: meta.metadata,
            created_at: meta.created_at,
        };
        snapshot.check_alignment()?;
        Ok(Some(snapshot))
    }

    /// Append rows to the stored snapshot, creating it if absent.
    ///
    /// This is the incremental path; regular ingestion replaces instead.
    pub fn insert_documents(
        &self,
        embeddings: Vec<Vec<f32>>,
        metadata: Vec<Chunk>,
    ) -> Result<Snapshot> {
        let snapshot = match self.load()? {
            Some(mut existing) => {
                existing.append(embeddings, metadata)?;
                existing
            }
            None => {
                let dims = embeddings
                    .first()
                    .map(Vec::len)
                    .ok_or_else(|| anyhow::anyhow!("nothing to insert"))?;
                Snapshot::build(dims, embeddings, metadata)?
            }
        };
        self.save(&snapshot)?;
        Ok(snapshot)
    }

    pub async fn load_async(&self) -> Result<Option<Snapshot>> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.load()).await?
    }

    /// Save `snapshot` and hand it back.
    pub async fn save_async(&self, snapshot: Snapshot) -> Result<Snapshot> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || {
            store.save(&snapshot)?;
            Ok(snapshot)
        })
        .await?
    }

    pub async fn insert_documents_async(
        &self,
        embeddings: Vec<Vec<f32>>,
        metadata: Vec<Chunk>,
    ) -> Result<Snapshot> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.insert_documents(embeddings, metadata)).await?
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Write to `<path>.<uuid>.tmp` then rename over `path`.
fn write_replace(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(format!(".{}.tmp", uuid::Uuid::new_v4().simple()));
    let tmp = PathBuf::from(tmp_name);

    std::fs::write(&tmp, bytes).with_context(|| format!("Failed to write {}", tmp.display()))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e).with_context(|| format!("Failed to move {} into place", path.display()));
    }
    Ok(())
}
