//! Core data models that flow through the indexing and retrieval pipeline.

use serde::{Deserialize, Serialize};

/// Descriptive metadata for an uploaded document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub pages: usize,
    pub title: String,
    pub author: String,
}

impl Default for DocumentMetadata {
    fn default() -> Self {
        Self {
            pages: 0,
            title: "Untitled".to_string(),
            author: "Unknown".to_string(),
        }
    }
}

/// A document whose text has been extracted and is ready for indexing.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub raw_text: String,
    pub metadata: Option<DocumentMetadata>,
}

/// A contiguous window of a document's text.
///
/// `char_start` and `char_end` are character (not byte) offsets into the
/// document's raw text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub index: usize,
    pub text: String,
    pub char_start: usize,
    pub char_end: usize,
    pub hash: String,
}

impl Chunk {
    /// Number of characters covered by this chunk.
    pub fn char_len(&self) -> usize {
        self.char_end - self.char_start
    }
}

/// A retrieved chunk with its similarity score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Chunks ranked by descending score; ties ordered by ascending chunk index.
pub type RetrievalResult = Vec<ScoredChunk>;

/// Outcome of indexing one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    pub document_id: String,
    pub chunk_count: usize,
}

/// A synthesized answer plus the context it was conditioned on.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub answer: String,
    pub contexts: Vec<String>,
    pub document_id: String,
}

/// Maximum accepted length of a document id.
pub const MAX_DOCUMENT_ID_LEN: usize = 128;

/// Document ids double as directory and file names, so they are limited to
/// ASCII alphanumerics, `-` and `_`.
pub fn is_valid_document_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_DOCUMENT_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
