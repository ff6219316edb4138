// Query orchestration: retrieve, assemble, generate


use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::Config;
use crate::database::{SearchFilters, VectorStore};
use crate::document::SourceRef;
use crate::embeddings::build_embedder;
use crate::generator::{Generator, TextStream, build_generator};
use crate::prompt::{Prompt, PromptAssembler};
use crate::retriever::Retriever;
use crate::{RagError, Result};

/// Largest `k` a caller may ask for
pub const MAX_K: usize = 100;

/// One question from the user
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryRequest {
    pub question: String,
    /// Chunks to retrieve; the configured `top_k` when absent
    pub k: Option<usize>,
    pub filters: Option<SearchFilters>,
}

impl QueryRequest {
    #[inline]
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ..Self::default()
        }
    }

    #[inline]
    #[must_use]
    pub fn with_k(mut self, k: usize) -> Self {
        self.k = Some(k);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_filters(mut self, filters: SearchFilters) -> Self {
        self.filters = Some(filters);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<SourceRef>,
}

pub struct Pipeline {
    retriever: Retriever,
    assembler: PromptAssembler,
    generator: Arc<dyn Generator>,
}

impl Pipeline {
    #[inline]
    pub fn new(
        retriever: Retriever,
        assembler: PromptAssembler,
        generator: Arc<dyn Generator>,
    ) -> Self {
        Self {
            retriever,
            assembler,
            generator,
        }
    }

    /// Wire up the providers and vector store named in the configuration
    #[inline]
    pub async fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let embedder = build_embedder(&config.embedding)?;
        let generator = build_generator(&config.generator)?;
        let store = Arc::new(VectorStore::open_for_search(config).await?);

        info!(
            "Pipeline ready: {} embeddings via {}, answers from {} via {}",
            embedder.model(),
            config.embedding.provider,
            generator.model(),
            config.generator.provider
        );

        Ok(Self::new(
            Retriever::new(embedder, store, config.retrieval.clone()),
            PromptAssembler::new(config.prompt.clone()),
            generator,
        ))
    }

    /// Retrieve context for the request and assemble the prompt
    ///
    /// Nothing is sent to the generator.
    #[inline]
    pub async fn prepare(&self, request: &QueryRequest) -> Result<Prompt> {
        let question = request.question.trim();
        if question.is_empty() {
            return Err(RagError::Query("question is empty".to_string()));
        }

        let k = request.k.unwrap_or(self.retriever.config().top_k);
        if k == 0 || k > MAX_K {
            return Err(RagError::Query(format!(
                "k must be between 1 and {}, got {}",
                MAX_K, k
            )));
        }

        let filters = request.filters.clone().unwrap_or_default();
        let retrieval = self.retriever.retrieve(question, k, &filters).await?;
        if retrieval.is_empty() {
            info!("No relevant chunks for question; asking for a refusal");
        }

        let prompt = self.assembler.assemble(question, &retrieval)?;
        debug!(
            "Prompt uses {} chunks from {} sources",
            prompt.context_chunks,
            prompt.sources.len()
        );
        Ok(prompt)
    }

    /// Answer a question in one piece
    #[inline]
    pub async fn answer(&self, request: &QueryRequest) -> Result<Answer> {
        let prompt = self.prepare(request).await?;
        let answer = self.generator.generate(&prompt.text).await?;

        let answer = answer.trim();
        if answer.is_empty() {
            return Err(RagError::Generation(
                "model returned an empty answer".to_string(),
            ));
        }

        Ok(Answer {
            answer: answer.to_string(),
            sources: prompt.sources,
        })
    }

    /// Answer a question as a stream of fragments
    ///
    /// The sources are known before generation starts and are returned
    /// alongside the stream.
    #[inline]
    pub async fn answer_stream(
        &self,
        request: &QueryRequest,
    ) -> Result<(Vec<SourceRef>, TextStream)> {
        let prompt = self.prepare(request).await?;
        let stream = self.generator.generate_stream(&prompt.text).await?;
        Ok((prompt.sources, stream))
    }
}
