//! Embedding provider trait and vector utilities.
//!
//! Defines the [`Embedder`] trait that all embedding backends implement,
//! plus pure helpers for similarity and vector serialization. Concrete
//! providers (OpenAI, Ollama, fastembed) live in the `lector` app crate.
//!
//! Embedders are stateless from the pipeline's point of view: repeated
//! calls with the same text go back to the provider every time.

use async_trait::async_trait;

use crate::error::{Error, Result};

/// An external text-embedding provider.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Returns the configured vector dimensionality, or 0 when unknown.
    fn dims(&self) -> usize;

    /// Embed a batch of texts, returning one vector per input in input order.
    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_many(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Provider("empty embedding response".to_string()))
    }
}

/// Verify that a provider returned `expected` vectors of one shared
/// dimension, with every component finite.
///
/// Returns the common dimension (0 for an empty batch).
pub fn check_batch(expected: usize, vectors: &[Vec<f32>]) -> Result<usize> {
    if vectors.len() != expected {
        return Err(Error::Provider(format!(
            "malformed embedding response: expected {} vectors, got {}",
            expected,
            vectors.len()
        )));
    }
    let dims = vectors.first().map(Vec::len).unwrap_or(0);
    if vectors.iter().any(|v| v.len() != dims || v.is_empty()) {
        return Err(Error::Provider(
            "malformed embedding response: vectors have inconsistent dimensions".to_string(),
        ));
    }
    if vectors.iter().flatten().any(|x| !x.is_finite()) {
        return Err(Error::Provider(
            "malformed embedding response: non-finite vector component".to_string(),
        ));
    }
    Ok(dims)
}

/// Encode a float vector as little-endian f32 bytes.
///
/// # Example
///
/// ```rust
/// use lector_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12); // 3 × 4 bytes
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode little-endian f32 bytes back into a float vector.
///
/// Trailing bytes that do not form a full `f32` are ignored; callers that
/// care check the length first.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal (unrelated)
/// - `-1.0` = opposite direction
///
/// Returns `0.0` for empty vectors, zero vectors, or vectors of different lengths.
///
/// ```text
///            a · b
/// cos(θ) = ─────────
///          ‖a‖ × ‖b‖
/// ```
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    (dot / denom).clamp(-1.0, 1.0)
}
