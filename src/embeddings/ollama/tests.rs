use super::*;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Answers `/api/embed` with one vector per input, derived from the input length
struct LengthEmbedding {
    dimension: usize,
}

impl Respond for LengthEmbedding {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: serde_json::Value =
            serde_json::from_slice(&request.body).expect("request should be json");
        let inputs = body["input"].as_array().expect("input should be an array");
        let embeddings: Vec<Vec<f32>> = inputs
            .iter()
            .map(|input| {
                let len = input.as_str().map_or(0, str::len) as f32;
                (0..self.dimension).map(|i| len + i as f32).collect()
            })
            .collect();

        ResponseTemplate::new(200).set_body_json(serde_json::json!({ "embeddings": embeddings }))
    }
}

fn test_config(server: &MockServer) -> EmbeddingConfig {
    EmbeddingConfig {
        base_url: Some(server.uri()),
        model: "test-embed".to_string(),
        batch_size: 2,
        embedding_dimension: 3,
        retry_attempts: 2,
        retry_base_delay_ms: 10,
        ..EmbeddingConfig::default()
    }
}

#[test]
fn client_configuration() {
    let config = EmbeddingConfig {
        host: "test-host".to_string(),
        port: 1234,
        model: "test-model".to_string(),
        batch_size: 128,
        embedding_dimension: 384,
        ..EmbeddingConfig::default()
    };
    let embedder = OllamaEmbedder::new(&config).expect("Failed to create embedder");

    assert_eq!(embedder.model(), "test-model");
    assert_eq!(embedder.dimension(), 384);
    assert_eq!(embedder.batch_size, 128);
    assert_eq!(embedder.base_url.host_str(), Some("test-host"));
    assert_eq!(embedder.base_url.port(), Some(1234));
    assert_eq!(embedder.http.retry_policy().max_attempts, 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn splits_requests_into_batches() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(LengthEmbedding { dimension: 3 })
        .expect(3)
        .mount(&server)
        .await;

    let embedder = OllamaEmbedder::new(&test_config(&server)).expect("embedder should build");
    let texts: Vec<String> = ["a", "bb", "ccc", "dddd", "eeeee"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    let vectors = embedder
        .embed_many(&texts)
        .await
        .expect("embedding should succeed");

    assert_eq!(vectors.len(), 5);
    for (text, vector) in texts.iter().zip(&vectors) {
        assert_eq!(vector[0], text.len() as f32);
        assert_eq!(vector.len(), 3);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn sends_preprocessed_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_partial_json(serde_json::json!({
            "model": "test-embed",
            "input": ["When is the Spring Social?"]
        })))
        .respond_with(LengthEmbedding { dimension: 3 })
        .expect(1)
        .mount(&server)
        .await;

    let embedder = OllamaEmbedder::new(&test_config(&server)).expect("embedder should build");

    let vector = embedder
        .embed("  When is\nthe   Spring Social?\t")
        .await
        .expect("embedding should succeed");

    assert_eq!(vector.len(), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_input_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(LengthEmbedding { dimension: 3 })
        .expect(0)
        .mount(&server)
        .await;

    let embedder = OllamaEmbedder::new(&test_config(&server)).expect("embedder should build");

    let vectors = embedder
        .embed_many(&[])
        .await
        .expect("embedding should succeed");

    assert!(vectors.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn count_mismatch_is_an_embedding_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "embeddings": [[0.1, 0.2, 0.3]] })),
        )
        .mount(&server)
        .await;

    let embedder = OllamaEmbedder::new(&test_config(&server)).expect("embedder should build");

    let error = embedder
        .embed_many(&["one".to_string(), "two".to_string()])
        .await
        .expect_err("mismatched response should fail");

    assert!(matches!(error, RagError::Embedding(ref message) if message.contains("counts")));
}

#[tokio::test(flavor = "multi_thread")]
async fn wrong_dimension_is_an_embedding_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(LengthEmbedding { dimension: 5 })
        .mount(&server)
        .await;

    let embedder = OllamaEmbedder::new(&test_config(&server)).expect("embedder should build");

    let error = embedder
        .embed("Spring Social")
        .await
        .expect_err("wrong dimension should fail");

    assert!(matches!(error, RagError::Embedding(ref message) if message.contains("dimensions")));
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_model_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(serde_json::json!({ "error": "model not found" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let embedder = OllamaEmbedder::new(&test_config(&server)).expect("embedder should build");

    let error = embedder
        .embed("Spring Social")
        .await
        .expect_err("404 should fail");

    assert!(matches!(error, RagError::Embedding(ref message) if message.contains("404")));
}

#[tokio::test(flavor = "multi_thread")]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(LengthEmbedding { dimension: 3 })
        .expect(1)
        .mount(&server)
        .await;

    let embedder = OllamaEmbedder::new(&test_config(&server)).expect("embedder should build");

    assert!(embedder.embed("Spring Social").await.is_ok());
}

#[tokio::test(flavor = "multi_thread")]
async fn health_check_finds_configured_model() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "models": [
                { "name": "llama3.2:latest", "size": 2019393189_u64 },
                { "name": "test-embed", "digest": "abc123" }
            ]
        })))
        .mount(&server)
        .await;

    let embedder = OllamaEmbedder::new(&test_config(&server)).expect("embedder should build");
    let missing = OllamaEmbedder::new(&EmbeddingConfig {
        model: "mxbai-embed-large".to_string(),
        ..test_config(&server)
    })
    .expect("embedder should build");

    let result = tokio::task::spawn_blocking(move || {
        (embedder.health_check().is_ok(), missing.health_check().is_err())
    })
    .await
    .expect("health check task should finish");

    assert_eq!(result, (true, true));
}
