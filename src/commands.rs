//! CLI command implementations.
//!
//! Each `run_*` function backs one `lector` subcommand and prints its
//! result to stdout. Logging goes to stderr.

use anyhow::{Context, Result};
use lector_core::chunk::chunk_text;
use std::path::Path;
use uuid::Uuid;

use crate::config::Config;
use crate::extract::{content_type_for_path, extract_text, MIME_PDF};
use crate::pipeline::Pipeline;

/// Store and index a local PDF or text file.
///
/// With `dry_run`, only the chunk boundaries are printed; no provider is
/// contacted and nothing is written.
pub async fn run_index(
    config: &Config,
    file: &Path,
    id: Option<String>,
    dry_run: bool,
) -> Result<()> {
    let bytes =
        std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let content_type = content_type_for_path(file);
    let document_id = id.unwrap_or_else(|| Uuid::new_v4().to_string());

    if dry_run {
        let text = extract_text(&bytes, content_type)
            .with_context(|| format!("Failed to extract text from {}", file.display()))?;
        let chunks = chunk_text(&document_id, &text, &config.chunking.params())?;
        println!(
            "Dry run: {} ({} chars) → {} chunks (chunk_size={}, overlap={})",
            file.display(),
            text.chars().count(),
            chunks.len(),
            config.chunking.chunk_size,
            config.chunking.overlap
        );
        for chunk in &chunks {
            println!(
                "  [chunk {}] chars {}..{} ({} chars)",
                chunk.index,
                chunk.char_start,
                chunk.char_end,
                chunk.char_len()
            );
        }
        return Ok(());
    }

    let pipeline = Pipeline::from_config(config)?;
    let report = if content_type == MIME_PDF {
        pipeline.ingest_pdf(&document_id, &bytes).await?
    } else {
        let text = extract_text(&bytes, content_type)
            .with_context(|| format!("Failed to extract text from {}", file.display()))?;
        let title = file
            .file_stem()
            .map(|s| s.to_string_lossy().to_string());
        pipeline.ingest_text(&document_id, &text, title).await?
    };

    println!("Indexed {}", file.display());
    println!("  document_id: {}", report.document_id);
    println!("  title:       {}", report.info.title);
    println!("  pages:       {}", report.info.pages);
    println!("  characters:  {}", report.text_length);
    println!("  chunks:      {}", report.chunks);
    Ok(())
}

/// Rebuild a document's index from its stored text.
pub async fn run_reindex(config: &Config, document_id: &str) -> Result<()> {
    let pipeline = Pipeline::from_config(config)?;
    let report = pipeline.reindex(document_id).await?;
    println!(
        "Reindexed {}: {} chunks",
        report.document_id, report.chunk_count
    );
    Ok(())
}

/// Print the chunks of a document ranked against a question.
pub async fn run_retrieve(
    config: &Config,
    document_id: &str,
    question: &str,
    k: Option<usize>,
) -> Result<()> {
    let pipeline = Pipeline::from_config(config)?;
    let results = pipeline.retrieve(document_id, question, k).await?;

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }
    for (rank, r) in results.iter().enumerate() {
        println!(
            "{}. [chunk {}] score={:.4} chars {}..{}",
            rank + 1,
            r.chunk.index,
            r.score,
            r.chunk.char_start,
            r.chunk.char_end
        );
        println!("{}", r.chunk.text);
        println!();
    }
    Ok(())
}

/// Answer a question about a document.
pub async fn run_ask(
    config: &Config,
    document_id: &str,
    question: &str,
    k: Option<usize>,
) -> Result<()> {
    let pipeline = Pipeline::from_config(config)?;
    let answer = pipeline.answer(document_id, question, k).await?;

    println!("{}", answer.answer.trim());
    println!();
    println!("--- Context ({} chunks) ---", answer.contexts.len());
    for (i, context) in answer.contexts.iter().enumerate() {
        println!("[{}] {}", i + 1, context);
    }
    Ok(())
}
