//! Per-document vector index.
//!
//! A [`VectorIndex`] owns every (chunk, embedding) pair of exactly one
//! document and answers brute-force cosine-similarity queries over them.
//! It is immutable once built: [`VectorIndex::query`] never mutates state,
//! so an index can be shared behind an `Arc` by any number of readers.
//!
//! # Ranking
//!
//! 1. Score every stored embedding against the query vector (cosine).
//! 2. Sort by score descending, ties by ascending chunk index.
//! 3. Truncate to `min(k, chunk_count)`.
//!
//! # Serialization
//!
//! [`VectorIndex::encode`] produces a JSON manifest (chunks and build
//! parameters) and a flat little-endian `f32` vector blob.
//! [`VectorIndex::decode`] reverses it and rejects anything inconsistent
//! with [`Error::Consistency`]. Writing the two parts to disk is the app
//! crate's job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::chunk::ChunkParams;
use crate::embedding::{blob_to_vec, check_batch, cosine_similarity, vec_to_blob, Embedder};
use crate::error::{Error, Result};
use crate::models::{Chunk, RetrievalResult, ScoredChunk};

/// On-disk format version written into every manifest.
pub const FORMAT_VERSION: u32 = 1;

/// A chunk and its embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

/// Self-describing metadata for a persisted index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexManifest {
    pub format_version: u32,
    pub document_id: String,
    pub model: String,
    pub dims: usize,
    pub chunk_params: ChunkParams,
    pub built_at: DateTime<Utc>,
    pub chunks: Vec<Chunk>,
}

/// The two serialized parts of an index.
#[derive(Debug, Clone)]
pub struct EncodedIndex {
    /// Pretty-printed JSON [`IndexManifest`].
    pub manifest: Vec<u8>,
    /// `chunk_count × dims` little-endian `f32` values, in chunk order.
    pub vectors: Vec<u8>,
}

/// Nearest-neighbor store over one document's chunk embeddings.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    document_id: String,
    model: String,
    dims: usize,
    chunk_params: ChunkParams,
    built_at: DateTime<Utc>,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Embed every chunk (order preserved) and assemble the index.
    ///
    /// Nothing is returned if any embedding call fails; a partial index
    /// never escapes this function.
    ///
    /// # Errors
    ///
    /// - [`Error::Provider`] if the embedder fails or returns a malformed batch.
    /// - [`Error::Configuration`] if the chunks do not belong to `document_id`
    ///   or are not numbered `0..n`.
    pub async fn build(
        document_id: &str,
        chunks: Vec<Chunk>,
        chunk_params: ChunkParams,
        embedder: &dyn Embedder,
    ) -> Result<Self> {
        validate_chunks(document_id, &chunks).map_err(Error::Configuration)?;

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = if texts.is_empty() {
            Vec::new()
        } else {
            embedder.embed_many(&texts).await?
        };

        let mut dims = check_batch(chunks.len(), &embeddings)?;
        if chunks.is_empty() {
            dims = embedder.dims();
        } else if embedder.dims() != 0 && embedder.dims() != dims {
            return Err(Error::Provider(format!(
                "provider returned {}-dimensional vectors, {} configured for model {}",
                dims,
                embedder.dims(),
                embedder.model_name()
            )));
        }

        debug!(
            "Built index for {} ({} chunks, {} dims)",
            document_id,
            chunks.len(),
            dims
        );

        let entries = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexEntry { chunk, embedding })
            .collect();

        Ok(Self {
            document_id: document_id.to_string(),
            model: embedder.model_name().to_string(),
            dims,
            chunk_params,
            built_at: Utc::now(),
            entries,
        })
    }

    /// Return the `min(k, chunk_count)` chunks most similar to `vector`.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] if `k == 0` or the vector dimension does not
    /// match a non-empty index.
    pub fn query(&self, vector: &[f32], k: usize) -> Result<RetrievalResult> {
        if k == 0 {
            return Err(Error::Configuration("k must be >= 1".to_string()));
        }
        if self.entries.is_empty() {
            return Ok(Vec::new());
        }
        if vector.len() != self.dims {
            return Err(Error::Configuration(format!(
                "query vector has {} dimensions, index for {} has {}",
                vector.len(),
                self.document_id,
                self.dims
            )));
        }

        let mut scored: Vec<ScoredChunk> = self
            .entries
            .iter()
            .map(|e| ScoredChunk {
                chunk: e.chunk.clone(),
                score: cosine_similarity(vector, &e.embedding),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.chunk.index.cmp(&b.chunk.index))
        });
        scored.truncate(k);

        Ok(scored)
    }

    /// Serialize into a manifest and a vector blob.
    pub fn encode(&self) -> Result<EncodedIndex> {
        let manifest = IndexManifest {
            format_version: FORMAT_VERSION,
            document_id: self.document_id.clone(),
            model: self.model.clone(),
            dims: self.dims,
            chunk_params: self.chunk_params,
            built_at: self.built_at,
            chunks: self.entries.iter().map(|e| e.chunk.clone()).collect(),
        };
        let manifest = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| Error::Storage(format!("failed to encode manifest: {}", e)))?;

        let mut vectors = Vec::with_capacity(self.entries.len() * self.dims * 4);
        for e in &self.entries {
            vectors.extend_from_slice(&vec_to_blob(&e.embedding));
        }

        Ok(EncodedIndex { manifest, vectors })
    }

    /// Rebuild an index from its serialized parts.
    ///
    /// # Errors
    ///
    /// [`Error::Consistency`] if the manifest does not parse, has an
    /// unknown format version, lists malformed chunks, claims zero
    /// dimensions for a non-empty index, or the vector blob length
    /// disagrees with `chunk_count × dims`.
    pub fn decode(manifest: &[u8], vectors: &[u8]) -> Result<Self> {
        let manifest: IndexManifest = serde_json::from_slice(manifest)
            .map_err(|e| Error::Consistency(format!("unreadable manifest: {}", e)))?;

        if manifest.format_version != FORMAT_VERSION {
            return Err(Error::Consistency(format!(
                "unsupported index format version {} (expected {})",
                manifest.format_version, FORMAT_VERSION
            )));
        }
        validate_chunks(&manifest.document_id, &manifest.chunks).map_err(Error::Consistency)?;
        if manifest.dims == 0 && !manifest.chunks.is_empty() {
            return Err(Error::Consistency(format!(
                "manifest lists {} chunks but zero dimensions",
                manifest.chunks.len()
            )));
        }

        let expected = manifest.chunks.len() * manifest.dims * 4;
        if vectors.len() != expected {
            return Err(Error::Consistency(format!(
                "vector data is {} bytes, expected {} ({} chunks × {} dims)",
                vectors.len(),
                expected,
                manifest.chunks.len(),
                manifest.dims
            )));
        }

        let entries = if manifest.dims == 0 {
            Vec::new()
        } else {
            manifest
                .chunks
                .into_iter()
                .zip(vectors.chunks_exact(manifest.dims * 4))
                .map(|(chunk, raw)| IndexEntry {
                    chunk,
                    embedding: blob_to_vec(raw),
                })
                .collect()
        };

        Ok(Self {
            document_id: manifest.document_id,
            model: manifest.model,
            dims: manifest.dims,
            chunk_params: manifest.chunk_params,
            built_at: manifest.built_at,
            entries,
        })
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    /// Embedding model the index was built with.
    pub fn model_name(&self) -> &str {
        &self.model
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn chunk_params(&self) -> ChunkParams {
        self.chunk_params
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    /// Number of stored chunks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stored entries in chunk order.
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }
}

/// Chunks must belong to `document_id` and be numbered `0..n` in order.
fn validate_chunks(document_id: &str, chunks: &[Chunk]) -> std::result::Result<(), String> {
    for (i, c) in chunks.iter().enumerate() {
        if c.document_id != document_id {
            return Err(format!(
                "chunk {} belongs to {}, not {}",
                i, c.document_id, document_id
            ));
        }
        if c.index != i {
            return Err(format!("chunk at position {} has index {}", i, c.index));
        }
        if c.char_end < c.char_start {
            return Err(format!("chunk {} has an inverted character range", i));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::chunk_text;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Letter-frequency embedder: deterministic and content-sensitive.
    struct LetterEmbedder {
        calls: AtomicUsize,
    }

    impl LetterEmbedder {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    fn letters(text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; 26];
        for c in text.chars().filter(|c| c.is_ascii_alphabetic()) {
            v[(c.to_ascii_lowercase() as u8 - b'a') as usize] += 1.0;
        }
        v
    }

    #[async_trait]
    impl Embedder for LetterEmbedder {
        fn model_name(&self) -> &str {
            "letters"
        }
        fn dims(&self) -> usize {
            26
        }
        async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts.iter().map(|t| letters(t)).collect())
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        fn model_name(&self) -> &str {
            "failing"
        }
        fn dims(&self) -> usize {
            26
        }
        async fn embed_many(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Err(Error::Provider("quota exhausted".to_string()))
        }
    }

    fn doc_text() -> String {
        ["a".repeat(10), "b".repeat(10), "c".repeat(10), "d".repeat(10)].concat()
    }

    async fn build_small() -> VectorIndex {
        let params = ChunkParams::new(10, 0).unwrap();
        let chunks = chunk_text("doc1", &doc_text(), &params).unwrap();
        VectorIndex::build("doc1", chunks, params, &LetterEmbedder::new())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_build_preserves_order() {
        let index = build_small().await;
        assert_eq!(index.len(), 4);
        assert_eq!(index.dims(), 26);
        assert_eq!(index.model_name(), "letters");
        for (i, e) in index.entries().iter().enumerate() {
            assert_eq!(e.chunk.index, i);
            assert_eq!(e.embedding, letters(&e.chunk.text));
        }
    }

    #[tokio::test]
    async fn test_ranking_identical_vector_first() {
        let index = build_small().await;
        let target = index.entries()[2].embedding.clone();
        let results = index.query(&target, 4).unwrap();
        assert_eq!(results[0].chunk.index, 2);
        assert!((results[0].score - 1.0).abs() < 1e-6);
        for r in &results[1..] {
            assert!(r.score <= results[0].score);
        }
    }

    #[tokio::test]
    async fn test_ties_break_by_index() {
        let index = build_small().await;
        // Orthogonal to every chunk: all scores are 0.
        let mut q = vec![0.0f32; 26];
        q[25] = 1.0;
        let results = index.query(&q, 4).unwrap();
        let order: Vec<usize> = results.iter().map(|r| r.chunk.index).collect();
        assert_eq!(order, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_k_bounding() {
        let index = build_small().await;
        let q = letters("abc");
        assert_eq!(index.query(&q, 2).unwrap().len(), 2);
        assert_eq!(index.query(&q, 4).unwrap().len(), 4);
        assert_eq!(index.query(&q, 10).unwrap().len(), 4);
        assert!(matches!(index.query(&q, 0), Err(Error::Configuration(_))));
    }

    #[tokio::test]
    async fn test_query_is_pure() {
        let index = build_small().await;
        let q = letters("bbbccc");
        assert_eq!(index.query(&q, 3).unwrap(), index.query(&q, 3).unwrap());
    }

    #[tokio::test]
    async fn test_dimension_mismatch() {
        let index = build_small().await;
        assert!(matches!(
            index.query(&[1.0, 2.0], 1),
            Err(Error::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_index() {
        let embedder = LetterEmbedder::new();
        let index = VectorIndex::build("doc1", Vec::new(), ChunkParams::default(), &embedder)
            .await
            .unwrap();
        assert!(index.is_empty());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
        assert!(index.query(&letters("x"), 4).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_build_fails_on_provider_error() {
        let params = ChunkParams::new(10, 0).unwrap();
        let chunks = chunk_text("doc1", &doc_text(), &params).unwrap();
        let err = VectorIndex::build("doc1", chunks, params, &FailingEmbedder)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Provider(_)));
    }

    #[tokio::test]
    async fn test_build_rejects_foreign_chunks() {
        let params = ChunkParams::new(10, 0).unwrap();
        let chunks = chunk_text("other", &doc_text(), &params).unwrap();
        let err = VectorIndex::build("doc1", chunks, params, &LetterEmbedder::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[tokio::test]
    async fn test_encode_decode_identical_queries() {
        let index = build_small().await;
        let encoded = index.encode().unwrap();
        let restored = VectorIndex::decode(&encoded.manifest, &encoded.vectors).unwrap();

        assert_eq!(restored.document_id(), "doc1");
        assert_eq!(restored.chunk_params(), index.chunk_params());
        for q in ["aaa", "abcd", "dddd c", "zzz"] {
            let v = letters(q);
            assert_eq!(index.query(&v, 3).unwrap(), restored.query(&v, 3).unwrap());
        }
    }

    #[tokio::test]
    async fn test_decode_rejects_truncated_vectors() {
        let index = build_small().await;
        let encoded = index.encode().unwrap();
        let short = &encoded.vectors[..encoded.vectors.len() - 4];
        assert!(matches!(
            VectorIndex::decode(&encoded.manifest, short),
            Err(Error::Consistency(_))
        ));
    }

    #[tokio::test]
    async fn test_decode_rejects_zero_dims_with_chunks() {
        let index = build_small().await;
        let encoded = index.encode().unwrap();
        let mut manifest: serde_json::Value = serde_json::from_slice(&encoded.manifest).unwrap();
        manifest["dims"] = serde_json::json!(0);
        let bytes = serde_json::to_vec(&manifest).unwrap();
        assert!(matches!(
            VectorIndex::decode(&bytes, &[]),
            Err(Error::Consistency(ref m)) if m.contains("zero dimensions")
        ));
    }

    #[test]
    fn test_decode_rejects_garbage_manifest() {
        assert!(matches!(
            VectorIndex::decode(b"not json", &[]),
            Err(Error::Consistency(_))
        ));
    }

    #[tokio::test]
    async fn test_decode_rejects_unknown_version() {
        let index = build_small().await;
        let encoded = index.encode().unwrap();
        let mut manifest: serde_json::Value = serde_json::from_slice(&encoded.manifest).unwrap();
        manifest["format_version"] = serde_json::json!(99);
        let bytes = serde_json::to_vec(&manifest).unwrap();
        assert!(matches!(
            VectorIndex::decode(&bytes, &encoded.vectors),
            Err(Error::Consistency(_))
        ));
    }

    #[tokio::test]
    async fn test_rebuild_is_structurally_identical() {
        let params = ChunkParams::new(10, 3).unwrap();
        let embedder = LetterEmbedder::new();
        let a = VectorIndex::build(
            "doc1",
            chunk_text("doc1", &doc_text(), &params).unwrap(),
            params,
            &embedder,
        )
        .await
        .unwrap();
        let b = VectorIndex::build(
            "doc1",
            chunk_text("doc1", &doc_text(), &params).unwrap(),
            params,
            &embedder,
        )
        .await
        .unwrap();
        assert_eq!(a.entries(), b.entries());
    }
}
