//! Fixed-window text chunker with character overlap.
//!
//! Splits a document's raw text into [`Chunk`]s of at most `chunk_size`
//! characters. Consecutive chunks share exactly `overlap` characters, so
//! boundaries depend only on `chunk_size`, `overlap`, and the text length.
//! No paragraph or sentence detection is performed.
//!
//! # Algorithm
//!
//! 1. Start at character offset 0.
//! 2. Emit `text[offset .. offset + chunk_size]` (clamped to the end).
//! 3. Stop if that chunk reached the end of the text; otherwise advance
//!    `offset` by `chunk_size - overlap` and repeat.
//!
//! Offsets are counted in Unicode scalar values, never bytes, so
//! multi-byte text is never split inside a character.
//!
//! # Example
//!
//! ```rust
//! use lector_core::chunk::{chunk_text, ChunkParams};
//!
//! let text = "x".repeat(3000);
//! let chunks = chunk_text("doc-123", &text, &ChunkParams::default()).unwrap();
//! let starts: Vec<usize> = chunks.iter().map(|c| c.char_start).collect();
//! assert_eq!(starts, vec![0, 800, 1600, 2400]);
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::Chunk;

/// Default window size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
/// Default number of characters shared by consecutive chunks.
pub const DEFAULT_OVERLAP: usize = 200;

/// Chunking parameters. Persisted alongside every index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkParams {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

impl ChunkParams {
    /// Create validated parameters.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        let params = Self {
            chunk_size,
            overlap,
        };
        params.validate()?;
        Ok(params)
    }

    /// Check `0 <= overlap < chunk_size`.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::Configuration("chunk_size must be > 0".to_string()));
        }
        if self.overlap >= self.chunk_size {
            return Err(Error::Configuration(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }

    /// Distance between the starts of consecutive chunks.
    pub fn step(&self) -> usize {
        self.chunk_size - self.overlap
    }
}

/// Split `text` into overlapping fixed-size chunks.
///
/// Returns chunks with contiguous indices starting at 0. Empty text yields
/// no chunks; text no longer than `chunk_size` yields exactly one.
///
/// # Errors
///
/// [`Error::Configuration`] if `overlap >= chunk_size` or `chunk_size == 0`.
pub fn chunk_text(document_id: &str, text: &str, params: &ChunkParams) -> Result<Vec<Chunk>> {
    params.validate()?;

    // Byte offset of every char start, plus the end of the text.
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let total_chars = boundaries.len() - 1;

    let mut chunks = Vec::with_capacity(total_chars / params.step() + 1);
    let mut offset = 0;

    while offset < total_chars {
        let end = (offset + params.chunk_size).min(total_chars);
        let piece = &text[boundaries[offset]..boundaries[end]];
        chunks.push(make_chunk(document_id, chunks.len(), piece, offset, end));

        if end == total_chars {
            break;
        }
        offset += params.step();
    }

    Ok(chunks)
}

/// Create a single [`Chunk`] with a deterministic id and SHA-256 content hash.
fn make_chunk(document_id: &str, index: usize, text: &str, start: usize, end: usize) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    let id = Uuid::new_v5(
        &Uuid::NAMESPACE_OID,
        format!("{}:{}", document_id, index).as_bytes(),
    );

    Chunk {
        id: id.to_string(),
        document_id: document_id.to_string(),
        index,
        text: text.to_string(),
        char_start: start,
        char_end: end,
        hash,
    }
}
