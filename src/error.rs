//! Error type for the knowledge engine.
//!
//! Format errors (vector/blob length, malformed metadata) and resource errors
//! (store not initialized, database failures) are always surfaced to the caller.
//! Degraded embedding is not an error and never appears here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("expected {expected}-dim vector, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("expected {expected} bytes, got {actual}")]
    BlobLength { expected: usize, actual: usize },

    #[error("malformed chunk metadata: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("unknown chunk type: {0}")]
    UnknownChunkType(String),

    #[error("unknown domain: {0}")]
    UnknownDomain(String),

    #[error("unknown search mode: {0}")]
    UnknownMode(String),

    #[error("chunk store is not initialized; call init() first")]
    NotInitialized,

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("embedding backend unavailable: {0}")]
    Embedding(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, KnowledgeError>;
