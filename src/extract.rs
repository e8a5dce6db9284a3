//! Text and metadata extraction for uploaded documents.
//!
//! Callers supply bytes plus a content type; this module returns plain
//! UTF-8 text. PDF text comes from `pdf-extract`; page count, title and
//! author are read with `lopdf`. Metadata is best-effort: anything
//! missing or unreadable falls back to [`DocumentMetadata::default`].

use lector_core::models::DocumentMetadata;
use lopdf::Object;
use std::path::Path;
use thiserror::Error;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_TEXT: &str = "text/plain";

/// Extraction failure. Never a panic; the caller rejects the upload.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported content-type: {0}")]
    UnsupportedContentType(String),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("text is not valid UTF-8")]
    InvalidUtf8,
}

/// Extract plain text from `bytes` of the given content type.
///
/// Parameters after `;` in the content type (e.g. `charset`) are ignored.
pub fn extract_text(bytes: &[u8], content_type: &str) -> Result<String, ExtractError> {
    match essence(content_type).as_str() {
        MIME_PDF => extract_pdf(bytes),
        MIME_TEXT => String::from_utf8(bytes.to_vec()).map_err(|_| ExtractError::InvalidUtf8),
        other => Err(ExtractError::UnsupportedContentType(other.to_string())),
    }
}

fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Content type guessed from a file extension: `.pdf` is PDF, anything
/// else is treated as plain text.
pub fn content_type_for_path(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("pdf") => MIME_PDF,
        _ => MIME_TEXT,
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

/// Page count, title and author of a PDF.
pub fn pdf_metadata(bytes: &[u8]) -> DocumentMetadata {
    let mut meta = DocumentMetadata::default();
    let doc = match lopdf::Document::load_mem(bytes) {
        Ok(doc) => doc,
        Err(_) => return meta,
    };

    meta.pages = doc.get_pages().len();

    let info = match doc.trailer.get(b"Info").map(|o| resolve(&doc, o)) {
        Ok(Some(Object::Dictionary(dict))) => dict,
        _ => return meta,
    };
    if let Some(title) = info_string(&doc, info, b"Title") {
        meta.title = title;
    }
    if let Some(author) = info_string(&doc, info, b"Author") {
        meta.author = author;
    }
    meta
}

fn resolve<'a>(doc: &'a lopdf::Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

fn info_string(doc: &lopdf::Document, info: &lopdf::Dictionary, key: &[u8]) -> Option<String> {
    match info.get(key).ok().and_then(|o| resolve(doc, o)) {
        Some(Object::String(bytes, _)) => {
            let text = decode_pdf_string(bytes);
            let text = text.trim();
            (!text.is_empty()).then(|| text.to_string())
        }
        _ => None,
    }
}

/// Decode a PDF text string: UTF-16BE when it carries a BOM, otherwise
/// bytes are taken as Latin-1.
fn decode_pdf_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        bytes.iter().map(|&b| b as char).collect()
    }
}
