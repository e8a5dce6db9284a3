//! # Lector
//!
//! Retrieval-augmented question answering over uploaded documents.
//!
//! A document's text is split into overlapping chunks, each chunk is
//! embedded, and the vectors are kept in a per-document index on disk.
//! A question is embedded the same way, the closest chunks are retrieved,
//! and a generation provider answers from them.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────────┐   ┌──────────────┐
//! │ PDF / text│──▶│ chunk+embed  │──▶│ index_dir/   │
//! │  upload   │   │ VectorIndex  │   │ <id>/        │
//! └───────────┘   └──────┬───────┘   └──────┬───────┘
//!                        ▼                  │
//!                 ┌──────────────┐          │
//!                 │IndexRegistry │◀─────────┘ lazy load
//!                 └──────┬───────┘
//!                        ▼
//!          Retriever ──▶ AnswerSynthesizer ──▶ CLI / HTTP
//! ```
//!
//! The provider-independent pieces (chunking, [`lector_core::index::VectorIndex`],
//! context assembly) live in the `lector-core` crate.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`embedding`] | Embedding providers (OpenAI, Ollama, local) |
//! | [`generation`] | Generation providers (OpenAI, Ollama) |
//! | [`extract`] | PDF text and metadata extraction |
//! | [`documents`] | Uploaded files and extracted text |
//! | [`index_store`] | Persisting indexes to disk |
//! | [`registry`] | In-memory index map with lazy loading |
//! | [`retrieve`] | Question → ranked chunks |
//! | [`answer`] | Ranked chunks → answer |
//! | [`pipeline`] | The operations the CLI and server call |
//! | [`request`] | Accepted ask/retrieve request shapes |
//! | [`server`] | HTTP API |
//! | [`commands`] | CLI commands |

pub mod answer;
pub mod commands;
pub mod config;
pub mod documents;
pub mod embedding;
pub mod extract;
pub mod generation;
pub mod index_store;
pub mod pipeline;
pub mod registry;
pub mod request;
pub mod retrieve;
pub mod server;
