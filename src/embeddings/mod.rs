// Embeddings module
// Text preprocessing, chunking and the embedding providers

pub mod chunking;
pub mod gemini;
pub mod ollama;


use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{EmbeddingConfig, Provider};
use crate::{RagError, Result};

pub use chunking::{ChunkingConfig, chunk_document, embedding_text, estimate_token_count};
pub use gemini::GeminiEmbedder;
pub use ollama::OllamaEmbedder;

/// Maps text to fixed-dimension vectors
///
/// Chunk texts at ingestion time and question texts at query time must go
/// through the same preprocessing; implementations route both [`embed`] and
/// [`embed_many`] through [`prepare_text`].
///
/// [`embed`]: Embedder::embed
/// [`embed_many`]: Embedder::embed_many
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_many(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| RagError::Embedding("provider returned no embedding".to_string()))
    }

    /// Embed many texts, returning one vector per input in input order
    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Length of every vector this embedder produces
    fn dimension(&self) -> usize;

    /// Name of the underlying model
    fn model(&self) -> &str;
}

/// Normalize text before embedding
///
/// Collapses all whitespace runs to single spaces, trims, and truncates to
/// `max_chars` characters.
#[inline]
pub fn prepare_text(text: &str, max_chars: usize) -> String {
    let mut prepared = String::with_capacity(text.len().min(max_chars * 4));
    let mut count = 0;

    for word in text.split_whitespace() {
        if count > 0 {
            if count + 1 >= max_chars {
                break;
            }
            prepared.push(' ');
            count += 1;
        }
        for c in word.chars() {
            if count >= max_chars {
                return prepared;
            }
            prepared.push(c);
            count += 1;
        }
    }

    prepared
}

/// Verify a provider response before it reaches the vector store
pub(crate) fn check_embeddings(
    vectors: &[Vec<f32>],
    expected_count: usize,
    dimension: usize,
) -> Result<()> {
    if vectors.len() != expected_count {
        return Err(RagError::Embedding(format!(
            "Mismatch between request and response counts: {} vs {}",
            expected_count,
            vectors.len()
        )));
    }

    if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
        return Err(RagError::Embedding(format!(
            "Expected {}-dimensional embeddings but the provider returned {} dimensions",
            dimension,
            bad.len()
        )));
    }

    if vectors.iter().flatten().any(|x| !x.is_finite()) {
        return Err(RagError::Embedding(
            "Provider returned non-finite embedding values".to_string(),
        ));
    }

    Ok(())
}

/// Keep typed errors raised by response checks and wrap transport failures
pub(crate) fn into_embedding_error(error: anyhow::Error) -> RagError {
    match error.downcast::<RagError>() {
        Ok(rag_error) => rag_error,
        Err(other) => RagError::Embedding(format!("{:#}", other)),
    }
}

/// Build the embedder selected in the configuration
#[inline]
pub fn build_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    let embedder: Arc<dyn Embedder> = match config.provider {
        Provider::Ollama => Arc::new(OllamaEmbedder::new(config)?),
        Provider::Gemini => Arc::new(GeminiEmbedder::new(config)?),
    };
    Ok(embedder)
}
