use super::*;
use crate::database::SearchFilters;
use crate::test_support::KeywordEmbedder;
use tempfile::TempDir;

const DIM: usize = 64;

struct Harness {
    indexer: Indexer,
    store: Arc<VectorStore>,
    embedder: Arc<KeywordEmbedder>,
    _temp_dir: TempDir,
}

async fn harness_with(embedder: KeywordEmbedder, chunking: ChunkingConfig) -> Harness {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = Arc::new(
        VectorStore::open(&temp_dir.path().join("vectors"), DIM, "keyword")
            .await
            .expect("should open store"),
    );
    let embedder = Arc::new(embedder);
    let indexer = Indexer::new(
        embedder.clone(),
        Arc::clone(&store),
        chunking,
        IndexerConfig { concurrency: 2 },
    );

    Harness {
        indexer,
        store,
        embedder,
        _temp_dir: temp_dir,
    }
}

async fn harness() -> Harness {
    harness_with(KeywordEmbedder::new(DIM), ChunkingConfig::default()).await
}

fn small_chunks() -> ChunkingConfig {
    ChunkingConfig {
        chunk_size: 10,
        overlap_size: 2,
        sentence_lookback: 0,
        contextual_embeddings: false,
    }
}

fn words(count: usize) -> String {
    (0..count)
        .map(|i| format!("word{}", i))
        .collect::<Vec<_>>()
        .join(" ")
}

#[tokio::test]
async fn ingests_batch_and_reports_each_document() {
    let h = harness().await;
    let documents = vec![
        Document::new(
            "spring-social",
            "Spring Social",
            "The Spring Social is on May 3rd at the Student Union.",
        ),
        Document::new("chess-night", "Chess Night", "Chess Club meets every Thursday."),
    ];

    let report = h.indexer.ingest(documents).await;

    assert!(report.is_success());
    assert_eq!(report.indexed_count(), 2);
    assert_eq!(report.total_chunks(), 2);
    assert_eq!(
        report.documents[0],
        DocumentReport {
            document_id: "spring-social".to_string(),
            outcome: IngestOutcome::Indexed { chunks: 1 },
        }
    );
    assert_eq!(h.store.count_chunks().await.expect("should count"), 2);
}

#[tokio::test]
async fn bad_document_does_not_abort_batch() {
    let h = harness().await;
    let documents = vec![
        Document::new("", "Untitled", "Orphan text."),
        Document::new("quiz-night", "Quiz Night", "Quiz Night is on Friday."),
        Document::new("blank", "Blank", "   "),
    ];

    let report = h.indexer.ingest(documents).await;

    assert_eq!(report.indexed_count(), 1);
    assert_eq!(report.failed_count(), 2);
    assert!(report.documents[1].is_indexed());
    let failed: Vec<&str> = report.failures().map(|(id, _)| id).collect();
    assert_eq!(failed, vec!["", "blank"]);
    assert_eq!(
        h.store.document_ids().await.expect("should list ids"),
        vec!["quiz-night".to_string()]
    );
}

#[tokio::test]
async fn embedding_failure_is_reported_per_document() {
    let h = harness_with(KeywordEmbedder::failing(DIM), ChunkingConfig::default()).await;

    let report = h
        .indexer
        .ingest(vec![
            Document::new("a", "A", "First event."),
            Document::new("b", "B", "Second event."),
        ])
        .await;

    assert_eq!(report.failed_count(), 2);
    for (_, error) in report.failures() {
        assert!(error.contains("Embedding error"));
    }
    assert_eq!(h.store.count_chunks().await.expect("should count"), 0);
}

#[tokio::test]
async fn reingestion_replaces_all_chunks() {
    let h = harness_with(KeywordEmbedder::new(DIM), small_chunks()).await;
    let long = Document::new("fair", "Club Fair", words(34));

    let chunks = h
        .indexer
        .ingest_document(&long)
        .await
        .expect("should index");
    // ceil((34 - 2) / (10 - 2)) windows
    assert_eq!(chunks, 4);
    assert_eq!(h.store.count_chunks().await.expect("should count"), 4);

    let short = Document::new("fair", "Club Fair", "The Club Fair moved to the quad.");
    let chunks = h
        .indexer
        .ingest_document(&short)
        .await
        .expect("should reindex");

    assert_eq!(chunks, 1);
    assert_eq!(h.store.count_chunks().await.expect("should count"), 1);
    let query = h.embedder.vector_for("Club Fair quad");
    let results = h
        .store
        .search(&query, 5, &SearchFilters::default())
        .await
        .expect("search should succeed");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].text, "The Club Fair moved to the quad.");
}

#[tokio::test]
async fn repeated_ids_keep_last_copy() {
    let h = harness().await;

    let report = h
        .indexer
        .ingest(vec![
            Document::new("social", "Spring Social", "Old date: April 1st."),
            Document::new("chess", "Chess Night", "Thursdays."),
            Document::new("social", "Spring Social", "New date: May 3rd."),
        ])
        .await;

    let ids: Vec<&str> = report
        .documents
        .iter()
        .map(|d| d.document_id.as_str())
        .collect();
    assert_eq!(ids, vec!["chess", "social"]);
    assert_eq!(h.store.count_chunks().await.expect("should count"), 2);

    let query = h.embedder.vector_for("Spring Social date");
    let results = h
        .store
        .search(
            &query,
            1,
            &SearchFilters {
                document_ids: Some(vec!["social".to_string()]),
                ..SearchFilters::default()
            },
        )
        .await
        .expect("search should succeed");
    assert_eq!(results[0].text, "New date: May 3rd.");
}

#[tokio::test]
async fn stored_vectors_match_query_embedding() {
    let h = harness_with(KeywordEmbedder::new(DIM), small_chunks()).await;
    let text = "Robotics team demo day";
    h.indexer
        .ingest_document(&Document::new("demo", "Demo Day", text))
        .await
        .expect("should index");

    let query = h.embedder.embed(text).await.expect("should embed");
    let results = h
        .store
        .search(&query, 1, &SearchFilters::default())
        .await
        .expect("search should succeed");

    assert!((results[0].score - 1.0).abs() < 1e-5);
}

#[tokio::test]
async fn delete_document_removes_chunks() {
    let h = harness().await;
    h.indexer
        .ingest(vec![
            Document::new("a", "A", "First event."),
            Document::new("b", "B", "Second event."),
        ])
        .await;

    h.indexer
        .delete_document("a")
        .await
        .expect("should delete");

    assert_eq!(
        h.store.document_ids().await.expect("should list ids"),
        vec!["b".to_string()]
    );
    assert!(matches!(
        h.indexer.delete_document(" ").await,
        Err(RagError::Document(_))
    ));
}

#[test]
fn dedup_preserves_order_of_survivors() {
    let documents = vec![
        Document::new("a", "A", "1"),
        Document::new("b", "B", "2"),
        Document::new("a", "A", "3"),
        Document::new("c", "C", "4"),
    ];

    let unique = dedup_keep_last(documents);

    let summary: Vec<(&str, &str)> = unique
        .iter()
        .map(|d| (d.id.as_str(), d.text.as_str()))
        .collect();
    assert_eq!(summary, vec![("b", "2"), ("a", "3"), ("c", "4")]);
}

#[test]
fn empty_report_is_success() {
    let report = IngestReport::default();

    assert!(report.is_success());
    assert_eq!(report.total_chunks(), 0);
    assert_eq!(IndexerConfig::default().concurrency, 4);
}
