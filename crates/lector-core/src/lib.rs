//! # Lector Core
//!
//! Shared, I/O-free logic for Lector: data models, the error taxonomy,
//! the fixed-window chunker, provider traits, the per-document vector
//! index, and context assembly for answer synthesis.
//!
//! This crate contains no tokio, HTTP, or filesystem code. Persistence,
//! concrete providers, and the process-wide index registry live in the
//! `lector` application crate.

pub mod chunk;
pub mod context;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod index;
pub mod models;

pub use error::{Error, Result};
