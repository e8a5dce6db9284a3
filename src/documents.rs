//! Storage for uploaded documents and their extracted text.
//!
//! ```text
//! <upload_dir>/
//!   <document_id>.pdf   # original bytes, PDF uploads only
//!   <document_id>.txt   # extracted raw text
//! ```

use lector_core::models::{is_valid_document_id, Document};
use lector_core::{Error, Result};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
}

impl DocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn pdf_path(&self, document_id: &str) -> PathBuf {
        self.root.join(format!("{}.pdf", document_id))
    }

    pub fn text_path(&self, document_id: &str) -> PathBuf {
        self.root.join(format!("{}.txt", document_id))
    }

    /// Store the original PDF bytes and the text extracted from them.
    pub async fn save_pdf(&self, document_id: &str, bytes: &[u8], text: &str) -> Result<()> {
        check_id(document_id)?;
        self.write(&self.pdf_path(document_id), bytes).await?;
        self.write(&self.text_path(document_id), text.as_bytes())
            .await
    }

    /// Store raw text for a document that has no PDF.
    pub async fn save_text(&self, document_id: &str, text: &str) -> Result<()> {
        check_id(document_id)?;
        self.write(&self.text_path(document_id), text.as_bytes())
            .await
    }

    /// The extracted text of `document_id`.
    pub async fn raw_text(&self, document_id: &str) -> Result<String> {
        let bytes = self.read(document_id, self.text_path(document_id)).await?;
        String::from_utf8(bytes)
            .map_err(|_| Error::Storage(format!("stored text for {} is not UTF-8", document_id)))
    }

    /// The stored document, ready to be indexed again. Metadata is not
    /// stored and comes back as `None`.
    pub async fn load(&self, document_id: &str) -> Result<Document> {
        Ok(Document {
            id: document_id.to_string(),
            raw_text: self.raw_text(document_id).await?,
            metadata: None,
        })
    }

    /// The original PDF bytes of `document_id`.
    pub async fn pdf_bytes(&self, document_id: &str) -> Result<Vec<u8>> {
        self.read(document_id, self.pdf_path(document_id)).await
    }

    async fn write(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        tokio::fs::create_dir_all(&self.root).await.map_err(|e| {
            Error::Storage(format!("failed to create {}: {}", self.root.display(), e))
        })?;
        tokio::fs::write(path, bytes)
            .await
            .map_err(|e| Error::Storage(format!("failed to write {}: {}", path.display(), e)))
    }

    async fn read(&self, document_id: &str, path: PathBuf) -> Result<Vec<u8>> {
        if !is_valid_document_id(document_id) {
            return Err(Error::document_not_found(document_id));
        }
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::document_not_found(document_id))
            }
            Err(e) => Err(Error::Storage(format!(
                "failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

/// Reject ids that are unsafe as file names.
pub fn check_id(document_id: &str) -> Result<()> {
    if is_valid_document_id(document_id) {
        Ok(())
    } else {
        Err(Error::Configuration(format!(
            "invalid document id {:?}: use ASCII letters, digits, '-' or '_'",
            document_id
        )))
    }
}
