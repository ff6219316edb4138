#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// Integration tests that require a local Ollama instance
// Run with: cargo test --test integration_ollama -- --ignored

use club_rag::config::{Config, EmbeddingConfig, GeneratorConfig};
use club_rag::document::{Document, DocumentMetadata};
use club_rag::embeddings::{Embedder, OllamaEmbedder};
use club_rag::generator::Generator;
use club_rag::generator::ollama::OllamaGenerator;
use club_rag::indexer::Indexer;
use club_rag::pipeline::{Pipeline, QueryRequest};
use futures::StreamExt;
use std::env;
use tempfile::TempDir;
use tracing::{debug, info};

const DEFAULT_OLLAMA_HOST: &str = "localhost";
const DEFAULT_OLLAMA_PORT: u16 = 11434;

fn ollama_host() -> (String, u16) {
    let host = env::var("OLLAMA_HOST").unwrap_or_else(|_| DEFAULT_OLLAMA_HOST.to_string());
    let port = env::var("OLLAMA_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_OLLAMA_PORT);
    (host, port)
}

fn embedding_config() -> EmbeddingConfig {
    let (host, port) = ollama_host();
    let defaults = EmbeddingConfig::default();
    EmbeddingConfig {
        host,
        port,
        model: env::var("OLLAMA_EMBED_MODEL").unwrap_or_else(|_| defaults.model.clone()),
        // Smaller batches for testing
        batch_size: 4,
        timeout_secs: 60,
        ..defaults
    }
}

fn generator_config() -> GeneratorConfig {
    let (host, port) = ollama_host();
    let defaults = GeneratorConfig::default();
    GeneratorConfig {
        host,
        port,
        model: env::var("OLLAMA_GENERATION_MODEL").unwrap_or_else(|_| defaults.model.clone()),
        temperature: Some(0.0),
        ..defaults
    }
}

fn init_test_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init()
        .ok(); // Ignore error if already initialized
}

#[test]
#[ignore = "requires a local Ollama instance"]
fn real_ollama_health_check() {
    init_test_tracing();

    let embedder = OllamaEmbedder::new(&embedding_config()).expect("embedder should build");

    info!("Testing health check against real Ollama instance");
    let result = embedder.health_check();

    assert!(
        result.is_ok(),
        "Health check should succeed with local Ollama: {:?}",
        result
    );
}

#[test]
#[ignore = "requires a local Ollama instance"]
fn real_ollama_list_models() {
    init_test_tracing();

    let embedder = OllamaEmbedder::new(&embedding_config()).expect("embedder should build");
    let models = embedder.list_models().expect("model listing should succeed");

    assert!(
        !models.is_empty(),
        "Should have at least one model available"
    );
    for model in &models {
        debug!("Available model: {} (size: {:?})", model.name, model.size);
    }
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires a local Ollama instance"]
async fn real_ollama_embeddings_have_configured_dimension() {
    init_test_tracing();

    let config = embedding_config();
    let embedder = OllamaEmbedder::new(&config).expect("embedder should build");
    let texts = vec![
        "The Spring Social is on May 3rd at the Student Union.".to_string(),
        "Chess Club meets for blitz tournaments every Thursday.".to_string(),
        "The Drama Society rehearses in the Arts Centre.".to_string(),
        "Rowing Club trains on the river at dawn.".to_string(),
        "The Debate Team hosts an open night in March.".to_string(),
    ];

    let vectors = embedder
        .embed_many(&texts)
        .await
        .expect("batch embedding should succeed");

    assert_eq!(vectors.len(), texts.len());
    for vector in &vectors {
        assert_eq!(vector.len(), config.embedding_dimension as usize);
    }
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires a local Ollama instance"]
async fn real_ollama_generates_and_streams() {
    init_test_tracing();

    let generator = OllamaGenerator::new(&generator_config()).expect("generator should build");
    let prompt = "Reply with the single word: ready";

    let answer = generator
        .generate(prompt)
        .await
        .expect("generation should succeed");
    assert!(!answer.trim().is_empty());

    let fragments: Vec<String> = generator
        .generate_stream(prompt)
        .await
        .expect("stream should open")
        .map(|fragment| fragment.expect("fragment should be ok"))
        .collect()
        .await;
    assert!(!fragments.concat().trim().is_empty());
    info!("Streamed {} fragments", fragments.len());
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires a local Ollama instance"]
async fn real_ollama_answers_from_records() {
    init_test_tracing();

    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = Config {
        embedding: embedding_config(),
        generator: generator_config(),
        base_dir: temp_dir.path().to_path_buf(),
        ..Config::default()
    };

    let indexer = Indexer::from_config(&config)
        .await
        .expect("indexer should build");
    let report = indexer
        .ingest(vec![
            Document::new(
                "spring-social",
                "Spring Social",
                "The Spring Social is on May 3rd at the Student Union.",
            )
            .with_metadata(DocumentMetadata {
                category: Some("Social".to_string()),
                ..DocumentMetadata::default()
            }),
        ])
        .await;
    assert!(report.is_success());

    let pipeline = Pipeline::from_config(&config)
        .await
        .expect("pipeline should build");
    let answer = pipeline
        .answer(&QueryRequest::new("When is the Spring Social?"))
        .await
        .expect("question should be answered");

    info!("Answer: {}", answer.answer);
    assert!(answer.answer.contains('3'));
    assert_eq!(answer.sources[0].document_id, "spring-social");
}
