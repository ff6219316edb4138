// Indexer module
// Ingestion orchestration: chunk, embed and store documents with per-document reporting

#[cfg(test)]
mod tests;

use std::collections::HashSet;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::database::{ChunkRecord, VectorStore};
use crate::document::Document;
use crate::embeddings::{ChunkingConfig, Embedder, build_embedder, chunk_document, embedding_text};
use crate::{RagError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct IndexerConfig {
    /// Documents processed at the same time
    pub concurrency: usize,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self { concurrency: 4 }
    }
}

/// What happened to one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Indexed { chunks: usize },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentReport {
    pub document_id: String,
    pub outcome: IngestOutcome,
}

impl DocumentReport {
    #[inline]
    pub fn is_indexed(&self) -> bool {
        matches!(self.outcome, IngestOutcome::Indexed { .. })
    }
}

/// Per-document results of one ingestion run, in input order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub documents: Vec<DocumentReport>,
}

impl IngestReport {
    #[inline]
    pub fn indexed_count(&self) -> usize {
        self.documents.iter().filter(|d| d.is_indexed()).count()
    }

    #[inline]
    pub fn failed_count(&self) -> usize {
        self.documents.len() - self.indexed_count()
    }

    #[inline]
    pub fn total_chunks(&self) -> usize {
        self.documents
            .iter()
            .map(|d| match d.outcome {
                IngestOutcome::Indexed { chunks } => chunks,
                IngestOutcome::Failed { .. } => 0,
            })
            .sum()
    }

    #[inline]
    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.documents.iter().filter_map(|d| match &d.outcome {
            IngestOutcome::Failed { error } => Some((d.document_id.as_str(), error.as_str())),
            IngestOutcome::Indexed { .. } => None,
        })
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        self.failed_count() == 0
    }
}

/// Turns documents into stored, searchable chunks
pub struct Indexer {
    embedder: Arc<dyn Embedder>,
    store: Arc<VectorStore>,
    chunking: ChunkingConfig,
    config: IndexerConfig,
}

impl Indexer {
    #[inline]
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<VectorStore>,
        chunking: ChunkingConfig,
        config: IndexerConfig,
    ) -> Self {
        Self {
            embedder,
            store,
            chunking,
            config,
        }
    }

    /// Build an indexer over the configured embedder and vector store
    #[inline]
    pub async fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let embedder = build_embedder(&config.embedding)?;
        let store = Arc::new(VectorStore::new(config).await?);

        Ok(Self::new(
            embedder,
            store,
            config.chunking.clone(),
            config.indexer.clone(),
        ))
    }

    #[inline]
    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    /// Index one document, replacing whatever was stored for its id
    ///
    /// Returns the number of chunks stored. New chunks are written before
    /// chunks beyond the new count are removed, so a failure never leaves the
    /// document with fewer chunks than before.
    #[inline]
    pub async fn ingest_document(&self, document: &Document) -> Result<usize> {
        document.validate()?;

        let chunks = chunk_document(document, &self.chunking)
            .map_err(|e| RagError::Document(format!("Failed to chunk {}: {}", document.id, e)))?;
        if chunks.is_empty() {
            return Err(RagError::Document(format!(
                "document '{}' has no text to index",
                document.id
            )));
        }
        debug!("Document {} split into {} chunks", document.id, chunks.len());

        let texts: Vec<String> = chunks
            .iter()
            .map(|chunk| embedding_text(document, chunk, &self.chunking))
            .collect();
        let vectors = self.embedder.embed_many(&texts).await?;
        if vectors.len() != chunks.len() {
            return Err(RagError::Embedding(format!(
                "Expected {} embeddings but received {}",
                chunks.len(),
                vectors.len()
            )));
        }

        let chunk_count = chunks.len();
        let records: Vec<ChunkRecord> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| ChunkRecord::new(document, chunk, vector))
            .collect();

        self.store.upsert_batch(records).await?;
        self.store
            .delete_stale_chunks(&document.id, chunk_count)
            .await?;

        info!("Indexed document {} ({} chunks)", document.id, chunk_count);
        Ok(chunk_count)
    }

    /// Index documents concurrently, yielding one report per distinct id
    ///
    /// When an id appears more than once only its last occurrence is indexed.
    /// Reports arrive in the order the surviving documents were given.
    #[inline]
    pub fn ingest_stream(
        &self,
        documents: Vec<Document>,
    ) -> impl Stream<Item = DocumentReport> + '_ {
        let documents = dedup_keep_last(documents);
        let concurrency = self.config.concurrency.max(1);
        info!(
            "Ingesting {} documents with concurrency {}",
            documents.len(),
            concurrency
        );

        futures::stream::iter(documents)
            .map(move |document| async move {
                let outcome = match self.ingest_document(&document).await {
                    Ok(chunks) => IngestOutcome::Indexed { chunks },
                    Err(e) => {
                        error!("Failed to index document {}: {}", document.id, e);
                        IngestOutcome::Failed {
                            error: e.to_string(),
                        }
                    }
                };
                DocumentReport {
                    document_id: document.id,
                    outcome,
                }
            })
            .buffered(concurrency)
    }

    /// Index a batch of documents and compact the store afterwards
    #[inline]
    pub async fn ingest(&self, documents: Vec<Document>) -> IngestReport {
        let reports: Vec<DocumentReport> = self.ingest_stream(documents).collect().await;
        let report = IngestReport { documents: reports };

        if report.indexed_count() > 0 {
            self.finish().await;
        }

        info!(
            "Ingestion finished: {} indexed, {} failed, {} chunks",
            report.indexed_count(),
            report.failed_count(),
            report.total_chunks()
        );
        report
    }

    /// Compact the store and build the vector index when it is large enough
    ///
    /// Failures here leave the data searchable and are only logged.
    #[inline]
    pub async fn finish(&self) {
        if let Err(e) = self.store.optimize().await {
            warn!("Failed to optimize vector database: {}", e);
        }
        if let Err(e) = self.store.create_vector_index().await {
            warn!("Failed to create vector index: {}", e);
        }
    }

    /// Remove a document and all of its chunks
    #[inline]
    pub async fn delete_document(&self, document_id: &str) -> Result<()> {
        if document_id.trim().is_empty() {
            return Err(RagError::Document("document id is empty".to_string()));
        }
        self.store.delete_by_document(document_id).await?;
        info!("Deleted document {}", document_id);
        Ok(())
    }
}

fn dedup_keep_last(documents: Vec<Document>) -> Vec<Document> {
    let total = documents.len();
    let mut seen = HashSet::new();
    let mut unique: Vec<Document> = documents
        .into_iter()
        .rev()
        .filter(|document| seen.insert(document.id.clone()))
        .collect();
    unique.reverse();

    if unique.len() < total {
        warn!(
            "Ignoring {} earlier copies of repeated document ids",
            total - unique.len()
        );
    }
    unique
}
