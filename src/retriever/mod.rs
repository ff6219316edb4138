// Query-time retrieval: embed the question, search, filter and re-rank


use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::Result;
use crate::database::lancedb::vector_store::compare_ranked;
use crate::database::{SearchFilters, VectorStore};
use crate::document::SourceRef;
use crate::embeddings::Embedder;

pub use crate::database::RetrievedChunk;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Chunks handed to the prompt when the caller does not ask for a number
    pub top_k: usize,
    /// Candidates scoring below this cosine similarity are discarded
    pub min_similarity: f32,
    /// Score subtracted per chunk already picked from the same document; 0 disables re-ranking
    pub diversity_penalty: f32,
    /// How many times k candidates to fetch when re-ranking
    pub candidate_multiplier: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            min_similarity: 0.35,
            diversity_penalty: 0.0,
            candidate_multiplier: 3,
        }
    }
}

impl RetrievalConfig {
    #[inline]
    pub fn diversity_enabled(&self) -> bool {
        self.diversity_penalty > 0.0
    }
}

/// Chunks chosen for one question, best first
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievalResult {
    pub chunks: Vec<RetrievedChunk>,
}

impl RetrievalResult {
    #[inline]
    pub fn new(chunks: Vec<RetrievedChunk>) -> Self {
        Self { chunks }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, RetrievedChunk> {
        self.chunks.iter()
    }

    /// Distinct source documents in first-appearance order
    #[inline]
    pub fn sources(&self) -> Vec<SourceRef> {
        distinct_sources(&self.chunks)
    }
}

pub(crate) fn distinct_sources(chunks: &[RetrievedChunk]) -> Vec<SourceRef> {
    let mut sources: Vec<SourceRef> = Vec::new();
    for chunk in chunks {
        if !sources.iter().any(|s| s.document_id == chunk.document_id) {
            sources.push(chunk.source_ref());
        }
    }
    sources
}

pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<VectorStore>,
    config: RetrievalConfig,
}

impl Retriever {
    #[inline]
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<VectorStore>, config: RetrievalConfig) -> Self {
        Self {
            embedder,
            store,
            config,
        }
    }

    #[inline]
    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Find the `k` chunks most relevant to `query`
    ///
    /// An empty result is not an error; it means nothing in the index was
    /// similar enough.
    #[inline]
    pub async fn retrieve(
        &self,
        query: &str,
        k: usize,
        filters: &SearchFilters,
    ) -> Result<RetrievalResult> {
        if query.trim().is_empty() || k == 0 {
            return Ok(RetrievalResult::default());
        }

        let query_vector = self.embedder.embed(query).await?;

        let fetch = if self.config.diversity_enabled() {
            k.saturating_mul(self.config.candidate_multiplier.max(1))
        } else {
            k
        };
        let candidates = self.store.search(&query_vector, fetch, filters).await?;
        debug!("Vector search returned {} candidates", candidates.len());

        let chunks = apply_policies(candidates, k, &self.config);
        info!(
            "Retrieved {} chunks from {} documents",
            chunks.len(),
            distinct_sources(&chunks).len()
        );

        Ok(RetrievalResult::new(chunks))
    }
}

/// Threshold, optionally diversify, then keep the best `k`
///
/// The output is sorted by score descending with ties broken by chunk id and
/// never holds the same chunk twice.
#[inline]
pub fn apply_policies(
    candidates: Vec<RetrievedChunk>,
    k: usize,
    config: &RetrievalConfig,
) -> Vec<RetrievedChunk> {
    let mut kept: Vec<RetrievedChunk> = candidates
        .into_iter()
        .filter(|c| c.score >= config.min_similarity)
        .collect();
    kept.sort_by(compare_ranked);
    kept.dedup_by(|a, b| a.chunk_id == b.chunk_id);

    let mut selected = if config.diversity_enabled() {
        diversify(kept, k, config.diversity_penalty)
    } else {
        kept
    };

    selected.sort_by(compare_ranked);
    selected.truncate(k);
    selected
}

/// Greedy selection penalizing repeated documents
///
/// Each pick takes the candidate with the highest similarity minus
/// `penalty` times the number of chunks already picked from its document.
/// The adjusted value becomes the chunk's score.
fn diversify(mut remaining: Vec<RetrievedChunk>, k: usize, penalty: f32) -> Vec<RetrievedChunk> {
    let mut picked_per_document: HashMap<String, usize> = HashMap::new();
    let mut selected = Vec::with_capacity(k.min(remaining.len()));

    while selected.len() < k && !remaining.is_empty() {
        let adjusted = |chunk: &RetrievedChunk| {
            let picked = picked_per_document
                .get(&chunk.document_id)
                .copied()
                .unwrap_or(0);
            chunk.score - penalty * picked as f32
        };

        let Some(best) = remaining
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                adjusted(b)
                    .total_cmp(&adjusted(a))
                    .then_with(|| a.chunk_id.cmp(&b.chunk_id))
            })
            .map(|(index, _)| index)
        else {
            break;
        };

        let mut chunk = remaining.swap_remove(best);
        chunk.score = adjusted(&chunk);
        *picked_per_document
            .entry(chunk.document_id.clone())
            .or_insert(0) += 1;
        selected.push(chunk);
    }

    selected
}
