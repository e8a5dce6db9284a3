//! Text-generation provider trait.

use async_trait::async_trait;

use crate::error::Result;

/// An external text-generation (LLM) provider.
///
/// Implementations return the model's output verbatim; they do not
/// post-process, validate grounding, or retry.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Returns the model identifier (e.g. `"gpt-4o-mini"`).
    fn model_name(&self) -> &str;

    /// Generate a completion for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String>;
}
