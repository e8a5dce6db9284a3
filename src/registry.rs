//! Process-wide map from document id to its loaded [`VectorIndex`].
//!
//! The registry is an explicit object shared by reference (`Arc`) between
//! every component that needs it. Indexes are published as `Arc`s under a
//! short write lock, so a reader holds either the previous index or the
//! new one, never a partially built one.
//!
//! Operations that touch disk for one document (loading on a cache miss,
//! persisting a rebuilt index) are serialized by a per-document mutex.
//! Different documents never wait on each other except for the brief map
//! locks.
//!
//! Once a publish holds its document lock, persisting and installing run
//! on a spawned task. Dropping the caller's future (a disconnected HTTP
//! client, a timeout) does not stop it halfway, so disk and memory always
//! end up holding the same index.

use lector_core::index::VectorIndex;
use lector_core::models::is_valid_document_id;
use lector_core::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info, warn};

use crate::index_store::DiskIndexStore;

type IndexMap = RwLock<HashMap<String, Arc<VectorIndex>>>;

pub struct IndexRegistry {
    store: DiskIndexStore,
    indexes: Arc<IndexMap>,
    doc_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl IndexRegistry {
    pub fn new(store: DiskIndexStore) -> Self {
        Self {
            store,
            indexes: Arc::new(RwLock::new(HashMap::new())),
            doc_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &DiskIndexStore {
        &self.store
    }

    /// Acquire the per-document lock for `document_id`.
    async fn lock_document(&self, document_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.doc_locks.lock().await;
            locks
                .entry(document_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// The in-memory index for `document_id`, without touching disk.
    pub async fn get(&self, document_id: &str) -> Option<Arc<VectorIndex>> {
        self.indexes.read().await.get(document_id).cloned()
    }

    /// Return the index for `document_id`, loading it from disk on a miss.
    ///
    /// A persisted index that fails to deserialize is logged and reported
    /// as [`Error::NotFound`].
    pub async fn get_or_load(&self, document_id: &str) -> Result<Arc<VectorIndex>> {
        if let Some(index) = self.get(document_id).await {
            debug!("Registry hit for {}", document_id);
            return Ok(index);
        }
        if !is_valid_document_id(document_id) {
            return Err(Error::document_not_found(document_id));
        }

        // Disk is only inspected under the document lock, never while a
        // publish for the same document is swapping directories.
        let _guard = self.lock_document(document_id).await;

        // Another task may have loaded or published while we waited.
        if let Some(index) = self.get(document_id).await {
            return Ok(index);
        }

        let index = match self.store.load(document_id).await {
            Ok(index) => Arc::new(index),
            Err(Error::Consistency(msg)) => {
                warn!(
                    document_id = %document_id,
                    "Persisted index is unreadable, treating as not found: {}",
                    msg
                );
                return Err(Error::document_not_found(document_id));
            }
            Err(e) => return Err(e),
        };

        info!(
            "Loaded index for {} from disk ({} chunks, model {})",
            document_id,
            index.len(),
            index.model_name()
        );
        self.indexes
            .write()
            .await
            .insert(document_id.to_string(), index.clone());
        Ok(index)
    }

    /// Install `index` in memory, replacing any prior entry for its document.
    ///
    /// Does not persist; see [`IndexRegistry::publish`].
    pub async fn put(&self, index: VectorIndex) -> Arc<VectorIndex> {
        install(&self.indexes, index).await
    }

    /// Persist `index` and install it, as one unit per document.
    ///
    /// If persisting fails, the registry and the on-disk copy keep their
    /// previous state. Cancelling the returned future after the document
    /// lock is taken does not abort the write.
    pub async fn publish(&self, index: VectorIndex) -> Result<Arc<VectorIndex>> {
        let guard = self.lock_document(index.document_id()).await;
        let store = self.store.clone();
        let indexes = self.indexes.clone();

        let task = tokio::spawn(async move {
            let _guard = guard;
            store.persist(&index).await?;
            Ok::<_, Error>(install(&indexes, index).await)
        });
        task.await
            .map_err(|e| Error::Storage(format!("index publish task failed: {}", e)))?
    }

    /// Whether `document_id` is loaded in memory.
    pub async fn contains(&self, document_id: &str) -> bool {
        self.indexes.read().await.contains_key(document_id)
    }

    /// Number of indexes loaded in memory.
    pub async fn len(&self) -> usize {
        self.indexes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.indexes.read().await.is_empty()
    }

    /// Drop the in-memory entry for `document_id`. The persisted copy is
    /// kept, so a later `get_or_load` reloads it.
    pub async fn evict(&self, document_id: &str) -> bool {
        let _guard = self.lock_document(document_id).await;
        let removed = self.indexes.write().await.remove(document_id).is_some();
        if removed {
            debug!("Evicted {} from registry", document_id);
        }
        removed
    }
}

async fn install(indexes: &IndexMap, index: VectorIndex) -> Arc<VectorIndex> {
    let index = Arc::new(index);
    indexes
        .write()
        .await
        .insert(index.document_id().to_string(), index.clone());
    index
}
