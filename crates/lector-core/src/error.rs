//! Error taxonomy for the indexing and retrieval pipeline.

use thiserror::Error;

/// Errors produced by chunking, indexing, retrieval, and synthesis.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid chunking or query parameters.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Unknown document id or missing on-disk index.
    #[error("not found: {0}")]
    NotFound(String),

    /// Embedding or generation provider failure.
    #[error("provider error: {0}")]
    Provider(String),

    /// A persisted index exists but cannot be deserialized.
    #[error("inconsistent index: {0}")]
    Consistency(String),

    /// I/O failure while reading or writing persisted state.
    #[error("storage error: {0}")]
    Storage(String),
}

impl Error {
    /// Shorthand for [`Error::NotFound`] on a document id.
    pub fn document_not_found(document_id: &str) -> Self {
        Error::NotFound(format!("document not found or not indexed: {}", document_id))
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;
