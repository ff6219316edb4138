
use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use super::{Generator, StreamEvent, TextStream, check_budget, into_generation_error, line_stream};
use crate::config::GeneratorConfig;
use crate::http::{HttpClient, RetryPolicy};
use crate::{RagError, Result};

#[derive(Debug, Clone)]
pub struct OllamaGenerator {
    base_url: Url,
    model: String,
    temperature: Option<f32>,
    max_prompt_chars: usize,
    http: HttpClient,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<GenerateOptions>,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
}

/// One NDJSON line, or the whole body when not streaming
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    error: Option<String>,
}

impl OllamaGenerator {
    #[inline]
    pub fn new(config: &GeneratorConfig) -> Result<Self> {
        let retry = RetryPolicy::single_transport_retry(Duration::from_millis(config.retry_delay_ms));

        Ok(Self {
            base_url: config.endpoint_url()?,
            model: config.model.clone(),
            temperature: config.temperature,
            max_prompt_chars: config.max_prompt_chars,
            http: HttpClient::new(Duration::from_secs(config.timeout_secs), retry),
        })
    }

    fn request_json(&self, prompt: &str, stream: bool) -> anyhow::Result<String> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream,
            options: self
                .temperature
                .map(|temperature| GenerateOptions { temperature }),
        };
        serde_json::to_string(&request).context("Failed to serialize generate request")
    }

    fn generate_url(&self) -> anyhow::Result<Url> {
        self.base_url
            .join("api/generate")
            .context("Failed to build generate URL")
    }

    fn generate_blocking(&self, prompt: &str) -> anyhow::Result<String> {
        let body = self.request_json(prompt, false)?;
        let response_text = self
            .http
            .post_json(&self.generate_url()?, &[], &body)
            .context("Failed to generate answer")?;

        let response: GenerateResponse =
            serde_json::from_str(&response_text).context("Failed to parse generate response")?;

        if let Some(error) = response.error {
            return Err(RagError::Generation(error).into());
        }

        debug!("Generated {} characters", response.response.len());
        Ok(response.response)
    }

    fn open_stream(&self, prompt: &str) -> anyhow::Result<ureq::BodyReader<'static>> {
        let body = self.request_json(prompt, true)?;
        self.http
            .post_json_streaming(&self.generate_url()?, &[], &body)
            .context("Failed to start answer stream")
    }
}

/// Interpret one line of Ollama's NDJSON stream
pub(crate) fn parse_stream_line(line: &str) -> Result<StreamEvent> {
    if line.trim().is_empty() {
        return Ok(StreamEvent::Skip);
    }

    let response: GenerateResponse = serde_json::from_str(line)
        .map_err(|e| RagError::Generation(format!("Failed to parse stream line: {}", e)))?;

    if let Some(error) = response.error {
        return Err(RagError::Generation(error));
    }

    if !response.response.is_empty() {
        // A final line may still carry text; the next read then hits end of body
        return Ok(StreamEvent::Text(response.response));
    }

    if response.done {
        Ok(StreamEvent::Done)
    } else {
        Ok(StreamEvent::Skip)
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        check_budget(prompt, self.max_prompt_chars)?;
        info!("Generating answer with {}", self.model);

        let client = self.clone();
        let prompt = prompt.to_string();

        tokio::task::spawn_blocking(move || client.generate_blocking(&prompt))
            .await
            .map_err(|e| RagError::Generation(format!("Generation task failed: {}", e)))?
            .map_err(into_generation_error)
    }

    async fn generate_stream(&self, prompt: &str) -> Result<TextStream> {
        check_budget(prompt, self.max_prompt_chars)?;
        info!("Streaming answer from {}", self.model);

        let client = self.clone();
        let prompt = prompt.to_string();

        let reader = tokio::task::spawn_blocking(move || client.open_stream(&prompt))
            .await
            .map_err(|e| RagError::Generation(format!("Generation task failed: {}", e)))?
            .map_err(into_generation_error)?;

        Ok(line_stream(reader, parse_stream_line))
    }

    fn max_prompt_chars(&self) -> usize {
        self.max_prompt_chars
    }

    fn model(&self) -> &str {
        &self.model
    }
}
