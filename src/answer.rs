//! Answer synthesis: retrieve, assemble a bounded context, generate.

use lector_core::context::{assemble_context, build_prompt};
use lector_core::generation::Generator;
use lector_core::models::{Answer, ScoredChunk};
use lector_core::Result;
use std::sync::Arc;
use tracing::debug;

use crate::retrieve::Retriever;

pub struct AnswerSynthesizer {
    retriever: Retriever,
    generator: Arc<dyn Generator>,
    max_context_chars: usize,
}

impl AnswerSynthesizer {
    pub fn new(
        retriever: Retriever,
        generator: Arc<dyn Generator>,
        max_context_chars: usize,
    ) -> Self {
        Self {
            retriever,
            generator,
            max_context_chars,
        }
    }

    /// Answer `question` from the `k` best chunks of `document_id`.
    ///
    /// A document with no chunks still reaches the generator, with an empty
    /// context; the prompt asks the model to reply with the
    /// insufficient-information sentinel in that case.
    pub async fn answer(&self, document_id: &str, question: &str, k: usize) -> Result<Answer> {
        let results = self.retriever.retrieve(document_id, question, k).await?;
        self.synthesize(document_id, question, &results).await
    }

    /// Generate an answer from already-ranked chunks.
    pub async fn synthesize(
        &self,
        document_id: &str,
        question: &str,
        results: &[ScoredChunk],
    ) -> Result<Answer> {
        let window = assemble_context(results, self.max_context_chars);
        debug!(
            "Context for {}: {} of {} chunks, {} chars",
            document_id,
            window.contexts.len(),
            results.len(),
            window.text.chars().count()
        );

        let prompt = build_prompt(&window.text, question);
        let answer = self.generator.generate(&prompt).await?;

        Ok(Answer {
            answer,
            contexts: window.contexts,
            document_id: document_id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index_store::DiskIndexStore;
    use crate::registry::IndexRegistry;
    use async_trait::async_trait;
    use lector_core::embedding::Embedder;
    use lector_core::Error;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct UnitEmbedder;

    #[async_trait]
    impl Embedder for UnitEmbedder {
        fn model_name(&self) -> &str {
            "unit"
        }
        fn dims(&self) -> usize {
            1
        }
        async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0]).collect())
        }
    }

    /// Records the last prompt and echoes a fixed reply.
    #[derive(Default)]
    struct RecordingGenerator {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Generator for RecordingGenerator {
        fn model_name(&self) -> &str {
            "recording"
        }
        async fn generate(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok("forty-two".to_string())
        }
    }

    struct BrokenGenerator;

    #[async_trait]
    impl Generator for BrokenGenerator {
        fn model_name(&self) -> &str {
            "broken"
        }
        async fn generate(&self, _prompt: &str) -> Result<String> {
            Err(Error::Provider("quota exceeded".to_string()))
        }
    }

    fn synthesizer(tmp: &TempDir, generator: Arc<dyn Generator>) -> AnswerSynthesizer {
        let registry = Arc::new(IndexRegistry::new(DiskIndexStore::new(tmp.path())));
        AnswerSynthesizer::new(Retriever::new(registry, Arc::new(UnitEmbedder)), generator, 100)
    }

    fn scored(index: usize, text: &str) -> ScoredChunk {
        let params = lector_core::chunk::ChunkParams::new(1000, 0).unwrap();
        let mut chunk = lector_core::chunk::chunk_text("doc", text, &params)
            .unwrap()
            .remove(0);
        chunk.index = index;
        ScoredChunk { chunk, score: 1.0 }
    }

    #[tokio::test]
    async fn test_synthesize_passes_context_and_question() {
        let tmp = TempDir::new().unwrap();
        let generator = Arc::new(RecordingGenerator::default());
        let synth = synthesizer(&tmp, generator.clone());

        let answer = synth
            .synthesize("doc", "What is the answer?", &[scored(0, "The answer is 42.")])
            .await
            .unwrap();

        assert_eq!(answer.answer, "forty-two");
        assert_eq!(answer.contexts, vec!["The answer is 42.".to_string()]);
        assert_eq!(answer.document_id, "doc");
        let prompts = generator.prompts.lock().unwrap();
        assert!(prompts[0].contains("The answer is 42."));
        assert!(prompts[0].contains("Question: What is the answer?"));
    }

    #[tokio::test]
    async fn test_synthesize_drops_chunks_beyond_budget() {
        let tmp = TempDir::new().unwrap();
        let synth = synthesizer(&tmp, Arc::new(RecordingGenerator::default()));
        let results = vec![scored(0, &"a".repeat(60)), scored(1, &"b".repeat(60))];

        let answer = synth.synthesize("doc", "q", &results).await.unwrap();
        assert_eq!(answer.contexts.len(), 1);
        assert!(answer.contexts[0].starts_with('a'));
    }

    #[tokio::test]
    async fn test_empty_results_still_generate() {
        let tmp = TempDir::new().unwrap();
        let generator = Arc::new(RecordingGenerator::default());
        let synth = synthesizer(&tmp, generator.clone());

        let answer = synth.synthesize("doc", "anything?", &[]).await.unwrap();
        assert!(answer.contexts.is_empty());
        assert_eq!(generator.prompts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_generator_failure_propagates() {
        let tmp = TempDir::new().unwrap();
        let synth = synthesizer(&tmp, Arc::new(BrokenGenerator));
        assert!(matches!(
            synth.synthesize("doc", "q", &[scored(0, "text")]).await,
            Err(Error::Provider(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_document_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let generator = Arc::new(RecordingGenerator::default());
        let synth = synthesizer(&tmp, generator.clone());
        assert!(matches!(
            synth.answer("unknown-id", "any question", 4).await,
            Err(Error::NotFound(_))
        ));
        assert!(generator.prompts.lock().unwrap().is_empty());
    }
}
