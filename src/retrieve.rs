//! Question → ranked chunks for one document.

use lector_core::embedding::Embedder;
use lector_core::models::RetrievalResult;
use lector_core::{Error, Result};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::registry::IndexRegistry;

/// Embeds questions and queries the registry's index for a document.
#[derive(Clone)]
pub struct Retriever {
    registry: Arc<IndexRegistry>,
    embedder: Arc<dyn Embedder>,
}

impl Retriever {
    pub fn new(registry: Arc<IndexRegistry>, embedder: Arc<dyn Embedder>) -> Self {
        Self { registry, embedder }
    }

    pub fn registry(&self) -> &Arc<IndexRegistry> {
        &self.registry
    }

    /// Return up to `k` chunks of `document_id` ranked by similarity to
    /// `question`.
    ///
    /// The index is resolved before the question is embedded, so an
    /// unknown document never costs a provider call.
    pub async fn retrieve(
        &self,
        document_id: &str,
        question: &str,
        k: usize,
    ) -> Result<RetrievalResult> {
        if k == 0 {
            return Err(Error::Configuration("k must be >= 1".to_string()));
        }

        let index = self.registry.get_or_load(document_id).await?;
        if index.model_name() != self.embedder.model_name() {
            warn!(
                document_id = %document_id,
                "Index was built with model {} but questions are embedded with {}",
                index.model_name(),
                self.embedder.model_name()
            );
        }

        let vector = self.embedder.embed(question).await?;
        let results = index.query(&vector, k)?;
        debug!(
            "Retrieved {} of {} chunks for {} (top score {:.4})",
            results.len(),
            index.len(),
            document_id,
            results.first().map(|r| r.score).unwrap_or(0.0)
        );
        Ok(results)
    }
}
