
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::embeddings::chunking::ChunkingConfig;
use crate::indexer::IndexerConfig;
use crate::prompt::PromptConfig;
use crate::retriever::RetrievalConfig;

/// Environment variable overriding the base directory
pub const HOME_ENV_VAR: &str = "CLUB_RAG_HOME";
/// Environment variable consulted when no Gemini key is configured
pub const GEMINI_API_KEY_ENV_VAR: &str = "GEMINI_API_KEY";
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/";

pub const DEFAULT_OLLAMA_EMBEDDING_MODEL: &str = "nomic-embed-text:latest";
pub const DEFAULT_OLLAMA_GENERATION_MODEL: &str = "llama3.2:latest";
pub const DEFAULT_GEMINI_EMBEDDING_MODEL: &str = "gemini-embedding-001";
pub const DEFAULT_GEMINI_GENERATION_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 768;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub prompt: PromptConfig,
    #[serde(default)]
    pub indexer: IndexerConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Ollama,
    Gemini,
}

impl fmt::Display for Provider {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ollama => write!(f, "ollama"),
            Self::Gemini => write!(f, "gemini"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: Provider,
    pub protocol: String,
    pub host: String,
    pub port: u16,
    /// Full endpoint root; overrides protocol/host/port when set
    pub base_url: Option<String>,
    pub model: String,
    pub api_key: Option<String>,
    pub batch_size: u32,
    pub embedding_dimension: u32,
    pub max_input_chars: usize,
    pub timeout_secs: u64,
    pub retry_attempts: u32,
    pub retry_base_delay_ms: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: Provider::Ollama,
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            base_url: None,
            model: DEFAULT_OLLAMA_EMBEDDING_MODEL.to_string(),
            api_key: None,
            batch_size: 16,
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
            max_input_chars: 8000,
            timeout_secs: 30,
            retry_attempts: 3,
            retry_base_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeneratorConfig {
    pub provider: Provider,
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub base_url: Option<String>,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    /// Largest prompt the model accepts, in characters
    pub max_prompt_chars: usize,
    pub temperature: Option<f32>,
    pub retry_delay_ms: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            provider: Provider::Ollama,
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            base_url: None,
            model: DEFAULT_OLLAMA_GENERATION_MODEL.to_string(),
            api_key: None,
            timeout_secs: 120,
            max_prompt_chars: 32_000,
            temperature: Some(0.2),
            retry_delay_ms: 500,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(u32),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid embedding dimension: {0} (must be between 8 and 8192)")]
    InvalidEmbeddingDimension(u32),
    #[error("Invalid max input length: {0} (must be at least 1 character)")]
    InvalidMaxInputChars(usize),
    #[error("Invalid timeout: {0} seconds (must be between 1 and 3600)")]
    InvalidTimeout(u64),
    #[error("Invalid retry attempts: {0} (must be between 1 and 10)")]
    InvalidRetryAttempts(u32),
    #[error("Invalid temperature: {0} (must be between 0.0 and 2.0)")]
    InvalidTemperature(f32),
    #[error("Missing API key for {0}; set it in config.toml or GEMINI_API_KEY")]
    MissingApiKey(Provider),
    #[error("Invalid chunk size: {0} (must be between 10 and 4096 words)")]
    InvalidChunkSize(usize),
    #[error("Overlap size ({0}) must be smaller than chunk size ({1})")]
    OverlapTooLarge(usize, usize),
    #[error("Sentence lookback ({0}) cannot exceed chunk size ({1})")]
    InvalidSentenceLookback(usize, usize),
    #[error("Invalid top_k: {0} (must be between 1 and 100)")]
    InvalidTopK(usize),
    #[error("Invalid minimum similarity: {0} (must be between -1.0 and 1.0)")]
    InvalidMinSimilarity(f32),
    #[error("Invalid diversity penalty: {0} (must be between 0.0 and 1.0)")]
    InvalidDiversityPenalty(f32),
    #[error("Invalid candidate multiplier: {0} (must be between 1 and 10)")]
    InvalidCandidateMultiplier(usize),
    #[error("Invalid prompt budget: {0} characters (must be at least 256)")]
    InvalidPromptBudget(usize),
    #[error("Prompt budget ({0}) exceeds the generator limit ({1})")]
    PromptBudgetTooLarge(usize, usize),
    #[error("Invalid indexer concurrency: {0} (must be between 1 and 64)")]
    InvalidConcurrency(usize),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    /// Defaults rooted at `base_dir`
    #[inline]
    pub fn with_base_dir<P: AsRef<Path>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        if !config_path.exists() {
            return Ok(Self::with_base_dir(config_dir));
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    /// Resolve the default base directory
    ///
    /// `CLUB_RAG_HOME` wins when set, otherwise the platform configuration
    /// directory is used.
    #[inline]
    pub fn default_base_dir() -> Result<PathBuf, ConfigError> {
        if let Some(home) = std::env::var_os(HOME_ENV_VAR).filter(|value| !value.is_empty()) {
            return Ok(PathBuf::from(home));
        }

        dirs::config_dir()
            .map(|dir| dir.join("club-rag"))
            .ok_or(ConfigError::DirectoryError)
    }

    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.embedding.validate()?;
        self.generator.validate()?;
        self.validate_chunking_config()?;
        self.validate_retrieval_config()?;
        self.validate_prompt_config()?;

        if !(1..=64).contains(&self.indexer.concurrency) {
            return Err(ConfigError::InvalidConcurrency(self.indexer.concurrency));
        }

        Ok(())
    }

    fn validate_chunking_config(&self) -> Result<(), ConfigError> {
        let config = &self.chunking;

        if !(10..=4096).contains(&config.chunk_size) {
            return Err(ConfigError::InvalidChunkSize(config.chunk_size));
        }

        if config.overlap_size >= config.chunk_size {
            return Err(ConfigError::OverlapTooLarge(
                config.overlap_size,
                config.chunk_size,
            ));
        }

        if config.sentence_lookback > config.chunk_size {
            return Err(ConfigError::InvalidSentenceLookback(
                config.sentence_lookback,
                config.chunk_size,
            ));
        }

        Ok(())
    }

    fn validate_retrieval_config(&self) -> Result<(), ConfigError> {
        let config = &self.retrieval;

        if !(1..=100).contains(&config.top_k) {
            return Err(ConfigError::InvalidTopK(config.top_k));
        }

        if !(-1.0..=1.0).contains(&config.min_similarity) {
            return Err(ConfigError::InvalidMinSimilarity(config.min_similarity));
        }

        if !(0.0..=1.0).contains(&config.diversity_penalty) {
            return Err(ConfigError::InvalidDiversityPenalty(
                config.diversity_penalty,
            ));
        }

        if !(1..=10).contains(&config.candidate_multiplier) {
            return Err(ConfigError::InvalidCandidateMultiplier(
                config.candidate_multiplier,
            ));
        }

        Ok(())
    }

    fn validate_prompt_config(&self) -> Result<(), ConfigError> {
        let budget = self.prompt.max_prompt_chars;

        if budget < 256 {
            return Err(ConfigError::InvalidPromptBudget(budget));
        }

        if budget > self.generator.max_prompt_chars {
            return Err(ConfigError::PromptBudgetTooLarge(
                budget,
                self.generator.max_prompt_chars,
            ));
        }

        Ok(())
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join("config.toml")
    }

    /// Directory holding the LanceDB tables
    #[inline]
    pub fn vector_database_path(&self) -> PathBuf {
        self.get_base_dir().join("vectors")
    }
}

impl EmbeddingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_endpoint(
            self.provider,
            &self.protocol,
            &self.host,
            self.port,
            self.base_url.as_deref(),
        )?;

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        if self.batch_size == 0 || self.batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }

        if !(8..=8192).contains(&self.embedding_dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(
                self.embedding_dimension,
            ));
        }

        if self.max_input_chars == 0 {
            return Err(ConfigError::InvalidMaxInputChars(self.max_input_chars));
        }

        if !(1..=3600).contains(&self.timeout_secs) {
            return Err(ConfigError::InvalidTimeout(self.timeout_secs));
        }

        if !(1..=10).contains(&self.retry_attempts) {
            return Err(ConfigError::InvalidRetryAttempts(self.retry_attempts));
        }

        Ok(())
    }

    /// Root URL that provider endpoints are joined onto
    pub fn endpoint_url(&self) -> Result<Url, ConfigError> {
        endpoint_url(
            self.provider,
            &self.protocol,
            &self.host,
            self.port,
            self.base_url.as_deref(),
        )
    }

    /// Configured key, falling back to `GEMINI_API_KEY`
    pub fn api_key(&self) -> Option<String> {
        resolve_api_key(self.api_key.as_deref())
    }

    /// Switch provider, resetting the model if it belonged to the old one
    pub fn set_provider(&mut self, provider: Provider) {
        if self.provider == provider {
            return;
        }
        self.provider = provider;
        self.model = match provider {
            Provider::Ollama => DEFAULT_OLLAMA_EMBEDDING_MODEL,
            Provider::Gemini => DEFAULT_GEMINI_EMBEDDING_MODEL,
        }
        .to_string();
    }

    pub fn set_host(&mut self, host: String) -> Result<(), ConfigError> {
        let temp_config = EmbeddingConfig {
            host: host.clone(),
            ..self.clone()
        };
        temp_config.validate()?;
        self.host = host;
        Ok(())
    }

    pub fn set_port(&mut self, port: u16) -> Result<(), ConfigError> {
        if port == 0 {
            return Err(ConfigError::InvalidPort(port));
        }
        self.port = port;
        Ok(())
    }

    pub fn set_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(model));
        }
        self.model = model;
        Ok(())
    }

    pub fn set_embedding_dimension(&mut self, dimension: u32) -> Result<(), ConfigError> {
        if !(8..=8192).contains(&dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(dimension));
        }
        self.embedding_dimension = dimension;
        Ok(())
    }
}

impl GeneratorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_endpoint(
            self.provider,
            &self.protocol,
            &self.host,
            self.port,
            self.base_url.as_deref(),
        )?;

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        if !(1..=3600).contains(&self.timeout_secs) {
            return Err(ConfigError::InvalidTimeout(self.timeout_secs));
        }

        if self.max_prompt_chars < 256 {
            return Err(ConfigError::InvalidPromptBudget(self.max_prompt_chars));
        }

        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(ConfigError::InvalidTemperature(temperature));
            }
        }

        Ok(())
    }

    pub fn endpoint_url(&self) -> Result<Url, ConfigError> {
        endpoint_url(
            self.provider,
            &self.protocol,
            &self.host,
            self.port,
            self.base_url.as_deref(),
        )
    }

    pub fn api_key(&self) -> Option<String> {
        resolve_api_key(self.api_key.as_deref())
    }

    pub fn set_provider(&mut self, provider: Provider) {
        if self.provider == provider {
            return;
        }
        self.provider = provider;
        self.model = match provider {
            Provider::Ollama => DEFAULT_OLLAMA_GENERATION_MODEL,
            Provider::Gemini => DEFAULT_GEMINI_GENERATION_MODEL,
        }
        .to_string();
    }

    pub fn set_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(model));
        }
        self.model = model;
        Ok(())
    }
}

fn validate_endpoint(
    provider: Provider,
    protocol: &str,
    host: &str,
    port: u16,
    base_url: Option<&str>,
) -> Result<(), ConfigError> {
    if base_url.is_none() {
        if protocol != "http" && protocol != "https" {
            return Err(ConfigError::InvalidProtocol(protocol.to_string()));
        }

        if port == 0 {
            return Err(ConfigError::InvalidPort(port));
        }
    }

    endpoint_url(provider, protocol, host, port, base_url).map(|_| ())
}

fn endpoint_url(
    provider: Provider,
    protocol: &str,
    host: &str,
    port: u16,
    base_url: Option<&str>,
) -> Result<Url, ConfigError> {
    let url_str = match (base_url, provider) {
        (Some(base), _) => base.to_string(),
        (None, Provider::Gemini) => GEMINI_BASE_URL.to_string(),
        (None, Provider::Ollama) => format!("{}://{}:{}", protocol, host, port),
    };

    // Url::join replaces the last path segment unless the base ends with '/'
    let normalized = if url_str.ends_with('/') {
        url_str.clone()
    } else {
        format!("{}/", url_str)
    };

    Url::parse(&normalized).map_err(|_| ConfigError::InvalidUrl(url_str))
}

fn resolve_api_key(configured: Option<&str>) -> Option<String> {
    configured
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .or_else(|| {
            std::env::var(GEMINI_API_KEY_ENV_VAR)
                .ok()
                .map(|key| key.trim().to_string())
                .filter(|key| !key.is_empty())
        })
}
