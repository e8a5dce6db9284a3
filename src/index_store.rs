//! On-disk persistence for [`VectorIndex`]es.
//!
//! Layout, one directory per document under `[storage].index_dir`:
//!
//! ```text
//! <index_dir>/
//!   <document_id>/
//!     manifest.json   # format version, model, dims, chunk params, chunks
//!     vectors.bin     # chunk_count × dims little-endian f32
//! ```
//!
//! A directory is self-describing: [`DiskIndexStore::load`] needs nothing
//! but the document id. Writes go to a hidden sibling directory that is
//! renamed into place, so a completed index is never observed half-written.
//! The previous directory is parked as `.<id>.old-<uuid>` until the new one
//! is in place; if a process dies between the two renames, the next load or
//! persist of that document moves the parked copy back.

use lector_core::index::VectorIndex;
use lector_core::models::is_valid_document_id;
use lector_core::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

const MANIFEST_FILE: &str = "manifest.json";
const VECTORS_FILE: &str = "vectors.bin";

fn storage_err(action: &str, path: &Path, e: std::io::Error) -> Error {
    Error::Storage(format!("failed to {} {}: {}", action, path.display(), e))
}

/// Filesystem-backed index persistence rooted at one directory.
#[derive(Debug, Clone)]
pub struct DiskIndexStore {
    root: PathBuf,
}

impl DiskIndexStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the index for `document_id`.
    pub fn index_dir(&self, document_id: &str) -> PathBuf {
        self.root.join(document_id)
    }

    /// Whether a persisted index directory exists for `document_id`.
    pub async fn exists(&self, document_id: &str) -> bool {
        is_valid_document_id(document_id)
            && tokio::fs::metadata(self.index_dir(document_id))
                .await
                .map(|m| m.is_dir())
                .unwrap_or(false)
    }

    /// Write `index` to `<root>/<document_id>`, replacing any previous copy.
    pub async fn persist(&self, index: &VectorIndex) -> Result<()> {
        let document_id = index.document_id();
        if !is_valid_document_id(document_id) {
            return Err(Error::Configuration(format!(
                "invalid document id: {:?}",
                document_id
            )));
        }

        let encoded = index.encode()?;
        self.restore_parked(document_id).await?;
        let final_dir = self.index_dir(document_id);
        let staging = self
            .root
            .join(format!(".{}.tmp-{}", document_id, Uuid::new_v4()));

        tokio::fs::create_dir_all(&staging)
            .await
            .map_err(|e| storage_err("create", &staging, e))?;

        let write = async {
            let manifest_path = staging.join(MANIFEST_FILE);
            tokio::fs::write(&manifest_path, &encoded.manifest)
                .await
                .map_err(|e| storage_err("write", &manifest_path, e))?;
            let vectors_path = staging.join(VECTORS_FILE);
            tokio::fs::write(&vectors_path, &encoded.vectors)
                .await
                .map_err(|e| storage_err("write", &vectors_path, e))?;
            self.swap_into_place(&staging, &final_dir).await
        };

        if let Err(e) = write.await {
            let _ = tokio::fs::remove_dir_all(&staging).await;
            return Err(e);
        }

        debug!(
            "Persisted index for {} ({} chunks) to {}",
            document_id,
            index.len(),
            final_dir.display()
        );
        Ok(())
    }

    async fn swap_into_place(&self, staging: &Path, final_dir: &Path) -> Result<()> {
        let previous = if tokio::fs::metadata(final_dir).await.is_ok() {
            let parked = self.root.join(format!(
                ".{}.old-{}",
                final_dir
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default(),
                Uuid::new_v4()
            ));
            tokio::fs::rename(final_dir, &parked)
                .await
                .map_err(|e| storage_err("move aside", final_dir, e))?;
            Some(parked)
        } else {
            None
        };

        if let Err(e) = tokio::fs::rename(staging, final_dir).await {
            if let Some(parked) = &previous {
                let _ = tokio::fs::rename(parked, final_dir).await;
            }
            return Err(storage_err("rename", staging, e));
        }

        if let Some(parked) = previous {
            let _ = tokio::fs::remove_dir_all(parked).await;
        }
        Ok(())
    }

    /// Move a parked previous copy of `document_id` back into place when the
    /// live directory is missing. Returns whether a copy was restored.
    async fn restore_parked(&self, document_id: &str) -> Result<bool> {
        let prefix = format!(".{}.old-", document_id);
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(storage_err("list", &self.root, e)),
        };

        let mut parked = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| storage_err("list", &self.root, e))?
        {
            if entry.file_name().to_string_lossy().starts_with(&prefix) {
                parked.push(entry.path());
            }
        }
        let Some(candidate) = parked.pop() else {
            return Ok(false);
        };

        let final_dir = self.index_dir(document_id);
        let restored = if tokio::fs::metadata(&final_dir).await.is_err() {
            tokio::fs::rename(&candidate, &final_dir)
                .await
                .map_err(|e| storage_err("restore", &candidate, e))?;
            warn!(
                "Restored index for {} from interrupted swap {}",
                document_id,
                candidate.display()
            );
            true
        } else {
            parked.push(candidate);
            false
        };
        for stale in parked {
            let _ = tokio::fs::remove_dir_all(stale).await;
        }
        Ok(restored)
    }

    /// Load the persisted index for `document_id`.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if no index directory exists (or the id is invalid).
    /// - [`Error::Consistency`] if the directory exists but its contents are
    ///   missing, unreadable, or belong to another document.
    pub async fn load(&self, document_id: &str) -> Result<VectorIndex> {
        if !is_valid_document_id(document_id) {
            return Err(Error::document_not_found(document_id));
        }
        if !self.exists(document_id).await && !self.restore_parked(document_id).await? {
            return Err(Error::document_not_found(document_id));
        }
        let dir = self.index_dir(document_id);

        let manifest = tokio::fs::read(dir.join(MANIFEST_FILE))
            .await
            .map_err(|e| Error::Consistency(format!("cannot read manifest for {}: {}", document_id, e)))?;
        let vectors = tokio::fs::read(dir.join(VECTORS_FILE))
            .await
            .map_err(|e| Error::Consistency(format!("cannot read vectors for {}: {}", document_id, e)))?;

        let index = VectorIndex::decode(&manifest, &vectors)?;
        if index.document_id() != document_id {
            return Err(Error::Consistency(format!(
                "directory {} holds the index of {}",
                dir.display(),
                index.document_id()
            )));
        }
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use lector_core::chunk::{chunk_text, ChunkParams};
    use lector_core::embedding::Embedder;
    use tempfile::TempDir;

    struct LengthEmbedder;

    #[async_trait]
    impl Embedder for LengthEmbedder {
        fn model_name(&self) -> &str {
            "length"
        }
        fn dims(&self) -> usize {
            3
        }
        async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let vowels = t.chars().filter(|c| "aeiou".contains(*c)).count() as f32;
                    vec![t.len() as f32, vowels, 1.0]
                })
                .collect())
        }
    }

    async fn sample_index(document_id: &str, text: &str) -> VectorIndex {
        let params = ChunkParams::new(16, 4).unwrap();
        let chunks = chunk_text(document_id, text, &params).unwrap();
        VectorIndex::build(document_id, chunks, params, &LengthEmbedder)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_persist_then_load_round_trip() {
        let tmp = TempDir::new().unwrap();
        let store = DiskIndexStore::new(tmp.path());
        let index = sample_index("doc1", "the quick brown fox jumps over the lazy dog again").await;

        store.persist(&index).await.unwrap();
        assert!(tmp.path().join("doc1").join("manifest.json").exists());
        assert!(tmp.path().join("doc1").join("vectors.bin").exists());

        let loaded = store.load("doc1").await.unwrap();
        assert_eq!(loaded.len(), index.len());
        for q in [vec![10.0, 2.0, 1.0], vec![16.0, 5.0, 1.0]] {
            assert_eq!(index.query(&q, 3).unwrap(), loaded.query(&q, 3).unwrap());
        }
    }

    #[tokio::test]
    async fn test_persist_overwrites_previous() {
        let tmp = TempDir::new().unwrap();
        let store = DiskIndexStore::new(tmp.path());
        store
            .persist(&sample_index("doc1", "short text").await)
            .await
            .unwrap();
        store
            .persist(&sample_index("doc1", &"much longer text ".repeat(10)).await)
            .await
            .unwrap();

        let loaded = store.load("doc1").await.unwrap();
        assert!(loaded.len() > 1);

        // No staging or parked directories are left behind.
        let leftovers: Vec<_> = std::fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with('.'))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_load_missing_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let store = DiskIndexStore::new(tmp.path());
        assert!(matches!(store.load("nope").await, Err(Error::NotFound(_))));
        assert!(matches!(
            store.load("../escape").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_load_corrupt_is_consistency_error() {
        let tmp = TempDir::new().unwrap();
        let store = DiskIndexStore::new(tmp.path());
        store
            .persist(&sample_index("doc1", "some words to index here").await)
            .await
            .unwrap();
        std::fs::write(tmp.path().join("doc1").join("vectors.bin"), b"xx").unwrap();
        assert!(matches!(
            store.load("doc1").await,
            Err(Error::Consistency(_))
        ));

        std::fs::create_dir_all(tmp.path().join("empty")).unwrap();
        assert!(matches!(
            store.load("empty").await,
            Err(Error::Consistency(_))
        ));
    }

    #[tokio::test]
    async fn test_load_rejects_foreign_directory() {
        let tmp = TempDir::new().unwrap();
        let store = DiskIndexStore::new(tmp.path());
        store
            .persist(&sample_index("doc1", "content of the first document").await)
            .await
            .unwrap();
        std::fs::rename(tmp.path().join("doc1"), tmp.path().join("doc2")).unwrap();
        assert!(matches!(
            store.load("doc2").await,
            Err(Error::Consistency(_))
        ));
    }

    #[tokio::test]
    async fn test_interrupted_swap_is_restored() {
        let tmp = TempDir::new().unwrap();
        let store = DiskIndexStore::new(tmp.path());
        let index = sample_index("doc1", "parked while the swap was running").await;
        store.persist(&index).await.unwrap();

        // The process died after parking the live copy, before the new one
        // was renamed in.
        std::fs::rename(
            tmp.path().join("doc1"),
            tmp.path().join(".doc1.old-5d0c7a3e"),
        )
        .unwrap();
        std::fs::create_dir_all(tmp.path().join(".doc1.tmp-91b2")).unwrap();
        assert!(!store.exists("doc1").await);

        let loaded = store.load("doc1").await.unwrap();
        assert_eq!(loaded.len(), index.len());
        assert!(store.exists("doc1").await);
        assert!(!tmp.path().join(".doc1.old-5d0c7a3e").exists());
    }

    #[tokio::test]
    async fn test_persist_cleans_stale_parked_copies() {
        let tmp = TempDir::new().unwrap();
        let store = DiskIndexStore::new(tmp.path());
        store
            .persist(&sample_index("doc1", "first").await)
            .await
            .unwrap();
        std::fs::create_dir_all(tmp.path().join(".doc1.old-stale")).unwrap();

        store
            .persist(&sample_index("doc1", "second version of the text").await)
            .await
            .unwrap();
        assert!(!tmp.path().join(".doc1.old-stale").exists());
        assert!(store.load("doc1").await.unwrap().len() > 1);
    }
}
