//! Exact nearest-neighbour index over embedding vectors.
//!
//! [`FlatIndex`] stores every vector row-major and answers queries by
//! brute-force squared Euclidean distance. Row `i` of the index is the
//! `i`-th vector passed to [`FlatIndex::build`] / [`FlatIndex::add`]; the
//! index never holds chunk text.
//!
//! # Binary layout
//!
//! ```text
//! magic "DRIX" | version u32 | dims u32 | rows u64 | rows × dims f32
//! ```
//!
//! All integers and floats are little-endian.

use anyhow::{bail, Result};

use crate::embedding::{blob_to_vec, vec_to_blob};
use crate::error::RagError;

const MAGIC: &[u8; 4] = b"DRIX";
const VERSION: u32 = 1;
const HEADER_LEN: usize = 4 + 4 + 4 + 8;

/// Label used for result slots that have no row behind them.
pub const NO_LABEL: i64 = -1;

#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dims: usize,
    data: Vec<f32>,
}

/// Search output, ordered by ascending distance.
///
/// Always `k` entries long. Slots beyond the populated row count carry
/// [`NO_LABEL`] and an infinite distance.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHits {
    pub distances: Vec<f32>,
    pub labels: Vec<i64>,
}

impl FlatIndex {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            data: Vec::new(),
        }
    }

    /// Build an index from a batch of equal-length vectors.
    pub fn build(dims: usize, vectors: &[Vec<f32>]) -> Result<Self> {
        let mut index = Self::new(dims);
        index.add(vectors)?;
        Ok(index)
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn len(&self) -> usize {
        if self.dims == 0 {
            0
        } else {
            self.data.len() / self.dims
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append rows. Every vector is checked before any is added.
    pub fn add(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
        if self.dims == 0 {
            bail!("index dimension must be > 0");
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dims) {
            return Err(RagError::DimensionMismatch {
                expected: self.dims,
                actual: bad.len(),
            }
            .into());
        }
        self.data.reserve(vectors.len() * self.dims);
        for v in vectors {
            self.data.extend_from_slice(v);
        }
        Ok(())
    }

    /// Return the `k` nearest rows to `query`.
    pub fn search(&self, query: &[f32], k: usize) -> Result<SearchHits> {
        if query.len() != self.dims {
            return Err(RagError::DimensionMismatch {
                expected: self.dims,
                actual: query.len(),
            }
            .into());
        }

        let mut scored: Vec<(f32, usize)> = self
            .data
            .chunks_exact(self.dims)
            .enumerate()
            .map(|(i, row)| (squared_l2(query, row), i))
            .collect();
        scored.sort_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });
        scored.truncate(k);

        let mut distances = Vec::with_capacity(k);
        let mut labels = Vec::with_capacity(k);
        for (d, i) in scored {
            distances.push(d);
            labels.push(i as i64);
        }
        while labels.len() < k {
            distances.push(f32::INFINITY);
            labels.push(NO_LABEL);
        }

        Ok(SearchHits { distances, labels })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.data.len() * 4);
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&VERSION.to_le_bytes());
        out.extend_from_slice(&(self.dims as u32).to_le_bytes());
        out.extend_from_slice(&(self.len() as u64).to_le_bytes());
        out.extend_from_slice(&vec_to_blob(&self.data));
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN || &bytes[..4] != MAGIC {
            return Err(RagError::CorruptSnapshot("not an index file".to_string()).into());
        }
        let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        if version != VERSION {
            return Err(RagError::CorruptSnapshot(format!(
                "unsupported index version {}",
                version
            ))
            .into());
        }
        let dims = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
        let mut rows_buf = [0u8; 8];
        rows_buf.copy_from_slice(&bytes[12..20]);
        let rows = u64::from_le_bytes(rows_buf) as usize;

        let body = &bytes[HEADER_LEN..];
        let expected = rows
            .checked_mul(dims)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| RagError::CorruptSnapshot("index header overflow".to_string()))?;
        if body.len() != expected {
            return Err(RagError::CorruptSnapshot(format!(
                "index body is {} bytes, header declares {}",
                body.len(),
                expected
            ))
            .into());
        }

        Ok(Self {
            dims,
            data: blob_to_vec(body),
        })
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
