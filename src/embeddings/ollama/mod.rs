#[cfg(test)]
mod tests;

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::{Embedder, check_embeddings, into_embedding_error, prepare_text};
use crate::config::EmbeddingConfig;
use crate::http::{HttpClient, RetryPolicy};
use crate::{RagError, Result};

#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    base_url: Url,
    model: String,
    batch_size: usize,
    dimension: usize,
    max_input_chars: usize,
    http: HttpClient,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub size: Option<u64>,
    pub digest: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

impl OllamaEmbedder {
    #[inline]
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let base_url = config.endpoint_url()?;
        let retry = RetryPolicy::backoff(
            config.retry_attempts,
            Duration::from_millis(config.retry_base_delay_ms),
        );

        Ok(Self {
            base_url,
            model: config.model.clone(),
            batch_size: (config.batch_size as usize).max(1),
            dimension: config.embedding_dimension as usize,
            max_input_chars: config.max_input_chars,
            http: HttpClient::new(Duration::from_secs(config.timeout_secs), retry),
        })
    }

    /// Check that the server answers and has the configured model pulled
    #[inline]
    pub fn health_check(&self) -> anyhow::Result<()> {
        debug!("Performing health check for Ollama at {}", self.base_url);

        let models = self.list_models().context("Server ping failed")?;

        if models.iter().any(|m| m.name == self.model) {
            info!(
                "Health check passed for Ollama server at {} with model {}",
                self.base_url, self.model
            );
            Ok(())
        } else {
            let available_models: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
            warn!(
                "Model {} not found. Available models: {:?}",
                self.model, available_models
            );
            Err(anyhow!(
                "Model '{}' is not available. Available models: {:?}",
                self.model,
                available_models
            ))
        }
    }

    #[inline]
    pub fn list_models(&self) -> anyhow::Result<Vec<ModelInfo>> {
        let url = self
            .base_url
            .join("api/tags")
            .context("Failed to build models URL")?;

        debug!("Fetching available models from {}", url);

        let response_text = self
            .http
            .get_text(&url)
            .context("Failed to fetch models")?;

        let models_response: ModelsResponse =
            serde_json::from_str(&response_text).context("Failed to parse models response")?;

        debug!("Found {} models", models_response.models.len());
        Ok(models_response.models)
    }

    fn embed_blocking(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let url = self
            .base_url
            .join("api/embed")
            .context("Failed to build embedding URL")?;

        let mut vectors = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            let request = EmbedRequest {
                model: &self.model,
                input: batch,
            };
            let request_json =
                serde_json::to_string(&request).context("Failed to serialize embedding request")?;

            let response_text = self
                .http
                .post_json(&url, &[], &request_json)
                .with_context(|| format!("Failed to embed batch of {} texts", batch.len()))?;

            let response: EmbedResponse = serde_json::from_str(&response_text)
                .context("Failed to parse embedding response")?;

            check_embeddings(&response.embeddings, batch.len(), self.dimension)?;
            vectors.extend(response.embeddings);
        }

        debug!("Generated {} embeddings total", vectors.len());
        Ok(vectors)
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
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
        &self.model
    }
}
