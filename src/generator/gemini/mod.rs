// Gemini text generation over the Generative Language REST API


use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::{Generator, StreamEvent, TextStream, check_budget, into_generation_error, line_stream};
use crate::config::{ConfigError, GeneratorConfig, Provider};
use crate::embeddings::gemini::model_resource;
use crate::http::{HttpClient, RetryPolicy};
use crate::{RagError, Result};

/// Finish reasons meaning the answer was withheld
const BLOCKED_FINISH_REASONS: &[&str] = &[
    "SAFETY",
    "RECITATION",
    "BLOCKLIST",
    "PROHIBITED_CONTENT",
    "SPII",
];

#[derive(Debug, Clone)]
pub struct GeminiGenerator {
    base_url: Url,
    model: String,
    api_key: String,
    temperature: Option<f32>,
    max_prompt_chars: usize,
    http: HttpClient,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: [RequestContent<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    role: &'static str,
    parts: [RequestPart<'a>; 1],
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GenerateContentResponse {
    fn check_blocked(&self) -> Result<()> {
        if let Some(reason) = self
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
        {
            warn!("Gemini blocked the prompt: {}", reason);
            return Err(RagError::Generation(format!("Prompt blocked: {}", reason)));
        }

        if let Some(reason) = self
            .candidates
            .first()
            .and_then(|c| c.finish_reason.as_deref())
            .filter(|reason| BLOCKED_FINISH_REASONS.contains(reason))
        {
            warn!("Gemini withheld the answer: {}", reason);
            return Err(RagError::Generation(format!("Response blocked: {}", reason)));
        }

        Ok(())
    }

    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| content.parts.iter().map(|p| p.text.as_str()).collect())
            .unwrap_or_default()
    }
}

impl GeminiGenerator {
    #[inline]
    pub fn new(config: &GeneratorConfig) -> Result<Self> {
        let base_url = config.endpoint_url()?;
        let api_key = config
            .api_key()
            .ok_or(ConfigError::MissingApiKey(Provider::Gemini))?;
        let retry = RetryPolicy::single_transport_retry(Duration::from_millis(config.retry_delay_ms));

        Ok(Self {
            base_url,
            model: model_resource(&config.model),
            api_key,
            temperature: config.temperature,
            max_prompt_chars: config.max_prompt_chars,
            http: HttpClient::new(Duration::from_secs(config.timeout_secs), retry),
        })
    }

    fn request_json(&self, prompt: &str) -> anyhow::Result<String> {
        let request = GenerateContentRequest {
            contents: [RequestContent {
                role: "user",
                parts: [RequestPart { text: prompt }],
            }],
            generation_config: self
                .temperature
                .map(|temperature| GenerationConfig { temperature }),
        };
        serde_json::to_string(&request).context("Failed to serialize generateContent request")
    }

    fn endpoint(&self, method: &str) -> anyhow::Result<Url> {
        self.base_url
            .join(&format!("{}:{}", self.model, method))
            .with_context(|| format!("Failed to build {} URL", method))
    }

    fn generate_blocking(&self, prompt: &str) -> anyhow::Result<String> {
        let headers = [("x-goog-api-key", self.api_key.as_str())];
        let body = self.request_json(prompt)?;

        let response_text = self
            .http
            .post_json(&self.endpoint("generateContent")?, &headers, &body)
            .context("Failed to generate answer")?;
        let response: GenerateContentResponse = serde_json::from_str(&response_text)
            .context("Failed to parse generateContent response")?;

        response.check_blocked()?;
        if response.candidates.is_empty() {
            return Err(RagError::Generation("Model returned no candidates".to_string()).into());
        }

        let text = response.text();
        debug!("Generated {} characters", text.len());
        Ok(text)
    }

    fn open_stream(&self, prompt: &str) -> anyhow::Result<ureq::BodyReader<'static>> {
        let headers = [("x-goog-api-key", self.api_key.as_str())];
        let body = self.request_json(prompt)?;

        let mut url = self.endpoint("streamGenerateContent")?;
        url.set_query(Some("alt=sse"));

        self.http
            .post_json_streaming(&url, &headers, &body)
            .context("Failed to start answer stream")
    }
}

/// Interpret one line of Gemini's server-sent event stream
pub(crate) fn parse_sse_line(line: &str) -> Result<StreamEvent> {
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(StreamEvent::Skip);
    };

    let response: GenerateContentResponse = serde_json::from_str(data.trim())
        .map_err(|e| RagError::Generation(format!("Failed to parse stream event: {}", e)))?;

    response.check_blocked()?;

    let text = response.text();
    if text.is_empty() {
        Ok(StreamEvent::Skip)
    } else {
        Ok(StreamEvent::Text(text))
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
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

        Ok(line_stream(reader, parse_sse_line))
    }

    fn max_prompt_chars(&self) -> usize {
        self.max_prompt_chars
    }

    fn model(&self) -> &str {
        self.model.strip_prefix("models/").unwrap_or(&self.model)
    }
}
