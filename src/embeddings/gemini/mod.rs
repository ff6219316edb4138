// Gemini embedding provider over the Generative Language REST API


use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::{Embedder, check_embeddings, into_embedding_error, prepare_text};
use crate::config::{ConfigError, EmbeddingConfig, Provider};
use crate::http::{HttpClient, RetryPolicy};
use crate::{RagError, Result};

/// Gemini caps batchEmbedContents at this many requests
const MAX_BATCH_REQUESTS: usize = 100;

// Documents and questions share one task type so their vectors stay comparable
const TASK_TYPE: &str = "SEMANTIC_SIMILARITY";

#[derive(Debug, Clone)]
pub struct GeminiEmbedder {
    base_url: Url,
    model: String,
    api_key: String,
    batch_size: usize,
    dimension: usize,
    max_input_chars: usize,
    http: HttpClient,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: String,
    content: Content<'a>,
    task_type: &'static str,
    output_dimensionality: usize,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedContentRequest<'a>>,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

impl GeminiEmbedder {
    #[inline]
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let base_url = config.endpoint_url()?;
        let api_key = config
            .api_key()
            .ok_or(ConfigError::MissingApiKey(Provider::Gemini))?;
        let retry = RetryPolicy::backoff(
            config.retry_attempts,
            Duration::from_millis(config.retry_base_delay_ms),
        );

        Ok(Self {
            base_url,
            model: model_resource(&config.model),
            api_key,
            batch_size: (config.batch_size as usize).clamp(1, MAX_BATCH_REQUESTS),
            dimension: config.embedding_dimension as usize,
            max_input_chars: config.max_input_chars,
            http: HttpClient::new(Duration::from_secs(config.timeout_secs), retry),
        })
    }

    fn request_for<'a>(&self, text: &'a str) -> EmbedContentRequest<'a> {
        EmbedContentRequest {
            model: self.model.clone(),
            content: Content {
                parts: [Part { text }],
            },
            task_type: TASK_TYPE,
            output_dimensionality: self.dimension,
        }
    }

    fn endpoint(&self, method: &str) -> anyhow::Result<Url> {
        self.base_url
            .join(&format!("{}:{}", self.model, method))
            .with_context(|| format!("Failed to build {} URL", method))
    }

    fn embed_blocking(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let headers = [("x-goog-api-key", self.api_key.as_str())];

        if let [text] = texts {
            let request_json = serde_json::to_string(&self.request_for(text))
                .context("Failed to serialize embedContent request")?;
            let response_text = self
                .http
                .post_json(&self.endpoint("embedContent")?, &headers, &request_json)
                .context("Failed to generate embedding")?;
            let response: EmbedContentResponse = serde_json::from_str(&response_text)
                .context("Failed to parse embedContent response")?;

            let vectors = vec![response.embedding.values];
            check_embeddings(&vectors, 1, self.dimension)?;
            return Ok(vectors);
        }

        let url = self.endpoint("batchEmbedContents")?;
        let mut vectors = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            let request = BatchEmbedRequest {
                requests: batch.iter().map(|text| self.request_for(text)).collect(),
            };
            let request_json = serde_json::to_string(&request)
                .context("Failed to serialize batchEmbedContents request")?;

            let response_text = self
                .http
                .post_json(&url, &headers, &request_json)
                .with_context(|| format!("Failed to embed batch of {} texts", batch.len()))?;

            let response: BatchEmbedResponse = serde_json::from_str(&response_text)
                .context("Failed to parse batchEmbedContents response")?;
            let batch_vectors: Vec<Vec<f32>> =
                response.embeddings.into_iter().map(|e| e.values).collect();

            check_embeddings(&batch_vectors, batch.len(), self.dimension)?;
            vectors.extend(batch_vectors);
        }

        debug!("Generated {} Gemini embeddings", vectors.len());
        Ok(vectors)
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let prepared: Vec<String> = texts
            .iter()
            .map(|text| prepare_text(text, self.max_input_chars))
            .collect();
        let client = self.clone();

        tokio::task::spawn_blocking(move || client.embed_blocking(&prepared))
            .await
            .map_err(|e| RagError::Embedding(format!("Embedding task failed: {}", e)))?
            .map_err(into_embedding_error)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model(&self) -> &str {
        self.model.trim_start_matches("models/")
    }
}

/// Normalize a model name to its `models/{id}` resource path
pub(crate) fn model_resource(model: &str) -> String {
    let model = model.trim();
    if model.starts_with("models/") || model.starts_with("tunedModels/") {
        model.to_string()
    } else {
        format!("models/{}", model)
    }
}
