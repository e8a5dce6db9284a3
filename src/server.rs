//! HTTP API for uploading documents and asking questions about them.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/api/health` | Health check (returns version) |
//! | `POST` | `/api/upload-pdf` | Raw PDF body; stores, extracts and indexes it |
//! | `POST` | `/api/documents` | `{"text", "title"?}`; stores and indexes plain text |
//! | `GET`  | `/api/pdf/{id}` | The stored PDF |
//! | `POST` | `/api/ask/{id}` | Answer a question about a document |
//! | `POST` | `/api/retrieve/{id}` | Ranked chunks for a question |
//!
//! Ask and retrieve accept every body shape listed in [`crate::request`].
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "..." } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `internal` (500),
//! `provider_unavailable` (503). Bodies larger than `[server].max_upload_bytes`
//! are rejected with a bare 413.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser front-ends
//! can call the API directly.

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use lector_core::models::{Answer, DocumentMetadata};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
use uuid::Uuid;

use crate::config::Config;
use crate::extract::MIME_PDF;
use crate::pipeline::{IngestReport, Pipeline};
use crate::request::AskRequest;

/// Starts the HTTP server on `[server].bind` and runs until terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pipeline = Arc::new(Pipeline::from_config(config)?);
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!("Listening on http://{}", listener.local_addr()?);
    serve(listener, pipeline, config.server.max_upload_bytes).await
}

/// Serve the API on an already-bound listener.
pub async fn serve(
    listener: tokio::net::TcpListener,
    pipeline: Arc<Pipeline>,
    max_upload_bytes: usize,
) -> anyhow::Result<()> {
    axum::serve(listener, router(pipeline, max_upload_bytes)).await?;
    Ok(())
}

/// Build the API router around a shared pipeline.
pub fn router(pipeline: Arc<Pipeline>, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(handle_health))
        .route("/api/upload-pdf", post(handle_upload_pdf))
        .route("/api/documents", post(handle_add_document))
        .route("/api/pdf/{document_id}", get(handle_get_pdf))
        .route("/api/ask/{document_id}", post(handle_ask))
        .route("/api/retrieve/{document_id}", post(handle_retrieve))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors)
        .with_state(pipeline)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

impl From<lector_core::Error> for AppError {
    fn from(err: lector_core::Error) -> Self {
        use lector_core::Error;

        let (status, code) = match &err {
            Error::Configuration(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            Error::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Error::Provider(_) => (StatusCode::SERVICE_UNAVAILABLE, "provider_unavailable"),
            Error::Consistency(_) | Error::Storage(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal")
            }
        };
        if status.is_server_error() {
            error!("Request failed: {}", err);
        }
        AppError {
            status,
            code,
            message: err.to_string(),
        }
    }
}

// ============ GET /api/health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ Uploads ============

/// Response body shared by both upload endpoints.
#[derive(Serialize)]
struct UploadResponse {
    url: String,
    document_id: String,
    info: DocumentMetadata,
    text_length: usize,
    chunks: usize,
    message: String,
}

impl UploadResponse {
    fn new(report: IngestReport, message: &str) -> Self {
        Self {
            url: format!("/api/pdf/{}", report.document_id),
            document_id: report.document_id,
            info: report.info,
            text_length: report.text_length,
            chunks: report.chunks,
            message: message.to_string(),
        }
    }
}

/// Handler for `POST /api/upload-pdf`.
///
/// The body is the raw PDF. A fresh document id is assigned; the PDF,
/// its extracted text and its index are stored under that id.
async fn handle_upload_pdf(
    State(pipeline): State<Arc<Pipeline>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<UploadResponse>, AppError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !content_type.trim().to_ascii_lowercase().starts_with(MIME_PDF) {
        return Err(bad_request(format!(
            "expected Content-Type {}, got {:?}",
            MIME_PDF, content_type
        )));
    }
    if body.is_empty() {
        return Err(bad_request("empty upload"));
    }

    let document_id = Uuid::new_v4().to_string();
    let report = pipeline.ingest_pdf(&document_id, &body).await?;
    Ok(Json(UploadResponse::new(
        report,
        "PDF uploaded and indexed successfully",
    )))
}

#[derive(Deserialize)]
struct AddDocumentRequest {
    text: String,
    #[serde(default)]
    title: Option<String>,
}

/// Handler for `POST /api/documents`.
async fn handle_add_document(
    State(pipeline): State<Arc<Pipeline>>,
    body: Bytes,
) -> Result<Json<UploadResponse>, AppError> {
    let request: AddDocumentRequest = serde_json::from_slice(&body)
        .map_err(|e| bad_request(format!("expected {{\"text\": ..., \"title\"?: ...}}: {}", e)))?;

    let document_id = Uuid::new_v4().to_string();
    let report = pipeline
        .ingest_text(&document_id, &request.text, request.title)
        .await?;
    Ok(Json(UploadResponse::new(
        report,
        "Document stored and indexed successfully",
    )))
}

// ============ GET /api/pdf/{id} ============

async fn handle_get_pdf(
    State(pipeline): State<Arc<Pipeline>>,
    Path(document_id): Path<String>,
) -> Result<Response, AppError> {
    let bytes = pipeline.documents().pdf_bytes(&document_id).await?;
    Ok(([(header::CONTENT_TYPE, MIME_PDF)], bytes).into_response())
}

// ============ POST /api/ask/{id} ============

async fn handle_ask(
    State(pipeline): State<Arc<Pipeline>>,
    Path(document_id): Path<String>,
    body: Bytes,
) -> Result<Json<Answer>, AppError> {
    let request = AskRequest::from_json(&body)?;
    let answer = pipeline
        .answer(&document_id, &request.question, request.k)
        .await?;
    Ok(Json(answer))
}

// ============ POST /api/retrieve/{id} ============

#[derive(Serialize)]
struct RetrieveResponse {
    document_id: String,
    results: Vec<RetrievedChunk>,
}

#[derive(Serialize)]
struct RetrievedChunk {
    index: usize,
    score: f32,
    char_start: usize,
    char_end: usize,
    text: String,
}

async fn handle_retrieve(
    State(pipeline): State<Arc<Pipeline>>,
    Path(document_id): Path<String>,
    body: Bytes,
) -> Result<Json<RetrieveResponse>, AppError> {
    let request = AskRequest::from_json(&body)?;
    let results = pipeline
        .retrieve(&document_id, &request.question, request.k)
        .await?;

    Ok(Json(RetrieveResponse {
        document_id,
        results: results
            .into_iter()
            .map(|r| RetrievedChunk {
                index: r.chunk.index,
                score: r.score,
                char_start: r.chunk.char_start,
                char_end: r.chunk.char_end,
                text: r.chunk.text,
            })
            .collect(),
    }))
}
