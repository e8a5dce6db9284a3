//! Deterministic in-process providers shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use lector::config::Config;
use lector_core::embedding::Embedder;
use lector_core::generation::Generator;
use lector_core::{Error, Result};
use std::path::Path;
use std::sync::Mutex;

pub const HASH_DIMS: usize = 32;

/// Bag-of-words embedder: each lowercase alphanumeric token is hashed
/// (FNV-1a) into one of [`HASH_DIMS`] buckets.
pub struct HashEmbedder;

pub fn bucket(token: &str) -> usize {
    let mut h: u64 = 0xcbf29ce484222325;
    for b in token.bytes() {
        h ^= b as u64;
        h = h.wrapping_mul(0x100000001b3);
    }
    (h % HASH_DIMS as u64) as usize
}

pub fn hash_embed(text: &str) -> Vec<f32> {
    let mut v = vec![0.0; HASH_DIMS];
    for token in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        v[bucket(&token.to_lowercase())] += 1.0;
    }
    v
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash-32"
    }
    fn dims(&self) -> usize {
        HASH_DIMS
    }
    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| hash_embed(t)).collect())
    }
}

/// Fails every call, like an unreachable provider.
pub struct DownEmbedder;

#[async_trait]
impl Embedder for DownEmbedder {
    fn model_name(&self) -> &str {
        "hash-32"
    }
    fn dims(&self) -> usize {
        HASH_DIMS
    }
    async fn embed_many(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(Error::Provider("connection refused".to_string()))
    }
}

/// Records every prompt and replies with a fixed answer.
#[derive(Default)]
pub struct RecordingGenerator {
    pub prompts: Mutex<Vec<String>>,
}

impl RecordingGenerator {
    pub const REPLY: &'static str = "The zebra is striped.";

    pub fn prompt_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn last_prompt(&self) -> String {
        self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl Generator for RecordingGenerator {
    fn model_name(&self) -> &str {
        "recording"
    }
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(Self::REPLY.to_string())
    }
}

/// A config whose storage lives under `root`, every other setting default.
pub fn test_config(root: &Path) -> Config {
    let mut config = Config::minimal();
    config.storage.index_dir = root.join("indexes");
    config.storage.upload_dir = root.join("uploads");
    config
}

/// 3000 characters: filler for the first 2604, then repeated "zebra ".
pub fn zebra_document() -> String {
    let text = format!("{}{}", "filler ".repeat(372), "zebra ".repeat(66));
    assert_eq!(text.chars().count(), 3000);
    text
}
