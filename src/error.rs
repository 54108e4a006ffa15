//! Typed pipeline errors.
//!
//! Validation failures are distinct variants so the HTTP layer can map them
//! to `400`; everything else travels as [`anyhow::Error`] and becomes `500`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    #[error("Query parameter is missing")]
    MissingQuery,

    #[error("Fields parameter is missing")]
    MissingFields,

    #[error("No files uploaded")]
    NoFiles,

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("corrupt snapshot: {0}")]
    CorruptSnapshot(String),

    #[error("embedding failed: {0}")]
    Embedding(String),
}

impl RagError {
    /// True for errors caused by the caller's input rather than the system.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            RagError::MissingQuery | RagError::MissingFields | RagError::NoFiles
        )
    }
}
