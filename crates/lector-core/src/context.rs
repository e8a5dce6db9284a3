//! Context-window assembly and the answer prompt template.
//!
//! Ranked chunks are concatenated in rank order, separated by a blank
//! line, until the character budget is exhausted. The first chunk that
//! does not fit ends the window; lower-ranked chunks are dropped. A
//! top-ranked chunk that alone exceeds the budget is truncated so the
//! window is never empty when something was retrieved.

use crate::models::ScoredChunk;

/// Separator placed between chunks in the context window.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// Default context budget, in characters.
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 6000;

/// Reply the model is instructed to give when the context is insufficient.
pub const INSUFFICIENT_INFORMATION: &str =
    "I don't have enough information to answer this question.";

/// The text handed to the generator plus the chunk texts it contains.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextWindow {
    pub text: String,
    pub contexts: Vec<String>,
}

/// Concatenate ranked chunks into a window of at most `max_chars` characters.
pub fn assemble_context(results: &[ScoredChunk], max_chars: usize) -> ContextWindow {
    let mut window = ContextWindow::default();
    let mut used = 0usize;

    for (rank, r) in results.iter().enumerate() {
        let len = r.chunk.text.chars().count();
        let sep = if rank == 0 { 0 } else { CONTEXT_SEPARATOR.len() };

        if used + sep + len > max_chars {
            if rank == 0 && max_chars > 0 {
                let truncated: String = r.chunk.text.chars().take(max_chars).collect();
                window.text.push_str(&truncated);
                window.contexts.push(truncated);
            }
            break;
        }

        if rank > 0 {
            window.text.push_str(CONTEXT_SEPARATOR);
        }
        window.text.push_str(&r.chunk.text);
        window.contexts.push(r.chunk.text.clone());
        used += sep + len;
    }

    window
}

/// Build the fixed question-answering prompt around a context window.
///
/// The prompt tells the model to reply with [`INSUFFICIENT_INFORMATION`]
/// when the context does not contain the answer. Nothing checks that it
/// complied.
pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "Using only the following context extracted from a document, answer the user's question.\n\
         If the answer cannot be found in the context, reply exactly: \"{}\"\n\
         \n\
         Context:\n\
         {}\n\
         \n\
         Question: {}\n\
         \n\
         Answer:",
        INSUFFICIENT_INFORMATION,
        context,
        question.trim()
    )
}
