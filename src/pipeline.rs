//! The indexing and question-answering pipeline.
//!
//! [`Pipeline`] owns the document store, the shared [`IndexRegistry`] and
//! the providers, and exposes the operations the CLI and HTTP server call:
//!
//! ```text
//! index:    text ─► chunk ─► embed ─► VectorIndex ─► persist ─► registry
//! retrieve: question ─► embed ─► registry.get_or_load ─► query
//! answer:   retrieve ─► context window ─► prompt ─► generate
//! ```
//!
//! Building happens outside any lock; only persist + publish is serialized
//! per document, so a failed or abandoned build leaves the previous index
//! queryable.

use lector_core::chunk::{chunk_text, ChunkParams};
use lector_core::embedding::Embedder;
use lector_core::generation::Generator;
use lector_core::index::VectorIndex;
use lector_core::models::{Answer, Document, DocumentMetadata, IndexReport, RetrievalResult};
use lector_core::{Error, Result};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::answer::AnswerSynthesizer;
use crate::config::Config;
use crate::documents::{check_id, DocumentStore};
use crate::embedding::create_embedder;
use crate::extract::{extract_text, pdf_metadata, ExtractError, MIME_PDF};
use crate::generation::create_generator;
use crate::index_store::DiskIndexStore;
use crate::registry::IndexRegistry;
use crate::retrieve::Retriever;

/// Result of storing and indexing an uploaded document.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub document_id: String,
    pub info: DocumentMetadata,
    /// Extracted text length, in characters.
    pub text_length: usize,
    pub chunks: usize,
}

pub struct Pipeline {
    documents: DocumentStore,
    registry: Arc<IndexRegistry>,
    embedder: Arc<dyn Embedder>,
    retriever: Retriever,
    synthesizer: AnswerSynthesizer,
    chunk_params: ChunkParams,
    default_k: usize,
}

impl Pipeline {
    /// Build a pipeline with the providers selected in `config`.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let embedder = create_embedder(&config.embedding)?;
        let generator = create_generator(&config.generation)?;
        Ok(Self::new(config, embedder, generator))
    }

    /// Build a pipeline around caller-supplied providers.
    pub fn new(config: &Config, embedder: Arc<dyn Embedder>, generator: Arc<dyn Generator>) -> Self {
        let registry = Arc::new(IndexRegistry::new(DiskIndexStore::new(
            &config.storage.index_dir,
        )));
        let retriever = Retriever::new(registry.clone(), embedder.clone());
        let synthesizer = AnswerSynthesizer::new(
            retriever.clone(),
            generator,
            config.retrieval.max_context_chars,
        );

        Self {
            documents: DocumentStore::new(&config.storage.upload_dir),
            registry,
            embedder,
            retriever,
            synthesizer,
            chunk_params: config.chunking.params(),
            default_k: config.retrieval.k,
        }
    }

    pub fn documents(&self) -> &DocumentStore {
        &self.documents
    }

    pub fn registry(&self) -> &Arc<IndexRegistry> {
        &self.registry
    }

    pub fn chunk_params(&self) -> ChunkParams {
        self.chunk_params
    }

    pub fn default_k(&self) -> usize {
        self.default_k
    }

    /// Chunk, embed, persist and publish `text` as the index of `document_id`.
    ///
    /// Either the document becomes fully queryable with the new index, or
    /// the previous index (if any) stays in place.
    pub async fn index(&self, document_id: &str, text: &str) -> Result<IndexReport> {
        self.index_document(&Document {
            id: document_id.to_string(),
            raw_text: text.to_string(),
            metadata: None,
        })
        .await
    }

    /// Index an extracted document under its own id.
    pub async fn index_document(&self, document: &Document) -> Result<IndexReport> {
        check_id(&document.id)?;
        let chunks = chunk_text(&document.id, &document.raw_text, &self.chunk_params)?;
        let index =
            VectorIndex::build(&document.id, chunks, self.chunk_params, self.embedder.as_ref())
                .await?;
        let chunk_count = index.len();
        self.registry.publish(index).await?;

        info!(
            "Indexed {} ({} chars, {} chunks, model {})",
            document.id,
            document.raw_text.chars().count(),
            chunk_count,
            self.embedder.model_name()
        );
        Ok(IndexReport {
            document_id: document.id.clone(),
            chunk_count,
        })
    }

    /// Rebuild the index of `document_id` from its stored raw text.
    pub async fn reindex(&self, document_id: &str) -> Result<IndexReport> {
        let document = self.documents.load(document_id).await?;
        self.index_document(&document).await
    }

    /// Store a PDF upload, extract its text and index it.
    ///
    /// Parsing runs on the blocking pool; large PDFs take a while.
    pub async fn ingest_pdf(&self, document_id: &str, bytes: &[u8]) -> Result<IngestReport> {
        check_id(document_id)?;
        let owned = bytes.to_vec();
        let (text, info) = tokio::task::spawn_blocking(move || {
            let text = extract_text(&owned, MIME_PDF)?;
            Ok::<_, ExtractError>((text, pdf_metadata(&owned)))
        })
        .await
        .map_err(|e| Error::Storage(format!("PDF extraction task failed: {}", e)))?
        .map_err(|e| Error::Configuration(format!("unreadable upload: {}", e)))?;

        self.documents.save_pdf(document_id, bytes, &text).await?;
        self.ingest(Document {
            id: document_id.to_string(),
            raw_text: text,
            metadata: Some(info),
        })
        .await
    }

    /// Store plain text under `document_id` and index it.
    pub async fn ingest_text(
        &self,
        document_id: &str,
        text: &str,
        title: Option<String>,
    ) -> Result<IngestReport> {
        self.documents.save_text(document_id, text).await?;
        let mut info = DocumentMetadata::default();
        if let Some(title) = title.filter(|t| !t.trim().is_empty()) {
            info.title = title;
        }
        self.ingest(Document {
            id: document_id.to_string(),
            raw_text: text.to_string(),
            metadata: Some(info),
        })
        .await
    }

    async fn ingest(&self, document: Document) -> Result<IngestReport> {
        let report = self.index_document(&document).await?;
        Ok(IngestReport {
            document_id: report.document_id,
            text_length: document.raw_text.chars().count(),
            info: document.metadata.unwrap_or_default(),
            chunks: report.chunk_count,
        })
    }

    /// Ranked chunks of `document_id` for `question`; `k` defaults to the
    /// configured `[retrieval] k`.
    pub async fn retrieve(
        &self,
        document_id: &str,
        question: &str,
        k: Option<usize>,
    ) -> Result<RetrievalResult> {
        self.retriever
            .retrieve(document_id, question, k.unwrap_or(self.default_k))
            .await
    }

    /// Answer `question` about `document_id`.
    pub async fn answer(
        &self,
        document_id: &str,
        question: &str,
        k: Option<usize>,
    ) -> Result<Answer> {
        self.synthesizer
            .answer(document_id, question, k.unwrap_or(self.default_k))
            .await
    }
}
