// In-process stand-ins for the model providers

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures::StreamExt;

use crate::embeddings::Embedder;
use crate::generator::{Generator, TextStream, check_budget};
use crate::{RagError, Result};

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "at", "do", "does", "for", "in", "is", "it", "of", "on", "the",
    "to", "was", "what", "when", "where", "which", "who", "will",
];

/// Deterministic bag-of-words embedder
///
/// Each non-stopword token is hashed (FNV-1a) into one of `dimension`
/// buckets and the vector is L2-normalized, so texts sharing words have
/// positive cosine similarity.
pub struct KeywordEmbedder {
    dimension: usize,
    calls: AtomicUsize,
    fail: bool,
}

impl KeywordEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            calls: AtomicUsize::new(0),
            fail: false,
        }
    }

    /// An embedder whose every call fails
    pub fn failing(dimension: usize) -> Self {
        Self {
            fail: true,
            ..Self::new(dimension)
        }
    }

    /// Number of embed_many calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let lowered = text.to_lowercase();

        for token in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|token| !token.is_empty() && !STOPWORDS.contains(token))
        {
            vector[bucket(token, self.dimension)] += 1.0;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm == 0.0 {
            // Constant vector for text without keywords
            vector[0] = 1.0;
            return vector;
        }
        vector.iter_mut().for_each(|x| *x /= norm);
        vector
    }
}

fn bucket(token: &str, buckets: usize) -> usize {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in token.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    (hash % buckets as u64) as usize
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(RagError::Embedding("embedding service unavailable".to_string()));
        }
        Ok(texts.iter().map(|text| self.vector_for(text)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model(&self) -> &str {
        "keyword"
    }
}

/// Generator replying with a fixed answer and recording every prompt
pub struct ScriptedGenerator {
    reply: std::result::Result<String, String>,
    max_prompt_chars: usize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            max_prompt_chars: 100_000,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            ..Self::replying("")
        }
    }

    pub fn with_max_prompt_chars(mut self, max_prompt_chars: usize) -> Self {
        self.max_prompt_chars = max_prompt_chars;
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|prompts| prompts.clone())
            .unwrap_or_default()
    }

    fn record(&self, prompt: &str) -> Result<String> {
        check_budget(prompt, self.max_prompt_chars)?;
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        self.reply.clone().map_err(RagError::Generation)
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.record(prompt)
    }

    async fn generate_stream(&self, prompt: &str) -> Result<TextStream> {
        let reply = self.record(prompt)?;
        // One fragment per word, keeping the separating spaces
        let fragments: Vec<Result<String>> = reply
            .split_inclusive(' ')
            .map(|word| Ok(word.to_string()))
            .collect();
        Ok(futures::stream::iter(fragments).boxed())
    }

    fn max_prompt_chars(&self) -> usize {
        self.max_prompt_chars
    }

    fn model(&self) -> &str {
        "scripted"
    }
}
