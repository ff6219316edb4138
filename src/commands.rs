use anyhow::{Context, Result, anyhow};
use console::style;
use dialoguer::Input;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use itertools::Itertools;
use std::io::Write;
use std::path::Path;
use tracing::{error, info, warn};

use crate::RagError;
use crate::config::{Config, Provider};
use crate::database::VectorStore;
use crate::document::{SourceRef, load_documents};
use crate::embeddings::OllamaEmbedder;
use crate::indexer::{IngestOutcome, IngestReport, Indexer};
use crate::pipeline::{Pipeline, QueryRequest};

/// Index every document in a JSON file
#[inline]
pub async fn ingest(base_dir: &Path, file: &Path) -> Result<IngestReport> {
    let config = Config::load(base_dir)?;
    let documents = load_documents(file)
        .with_context(|| format!("Failed to load documents from {}", file.display()))?;

    if documents.is_empty() {
        println!("No documents found in {}", file.display());
        return Ok(IngestReport::default());
    }

    info!(
        "Ingesting {} documents from {}",
        documents.len(),
        file.display()
    );
    let indexer = Indexer::from_config(&config)
        .await
        .context("Failed to initialize indexer")?;

    let bar = if console::user_attended_stderr() {
        ProgressBar::new(documents.len() as u64).with_style(
            ProgressStyle::with_template("{spinner} [{pos}/{len}] Indexing {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        )
    } else {
        ProgressBar::hidden()
    };

    let mut reports = Vec::with_capacity(documents.len());
    let mut stream = std::pin::pin!(indexer.ingest_stream(documents));
    while let Some(report) = stream.next().await {
        bar.set_message(report.document_id.clone());
        bar.inc(1);
        reports.push(report);
    }
    bar.finish_and_clear();

    let report = IngestReport { documents: reports };
    if report.indexed_count() > 0 {
        indexer.finish().await;
    }

    println!(
        "Indexed {} documents ({} chunks), {} failed",
        report.indexed_count(),
        report.total_chunks(),
        report.failed_count()
    );
    for document in &report.documents {
        match &document.outcome {
            IngestOutcome::Indexed { chunks } => {
                println!("  {} {} ({} chunks)", style("✓").green(), document.document_id, chunks);
            }
            IngestOutcome::Failed { error } => {
                println!("  {} {}: {}", style("✗").red(), document.document_id, error);
            }
        }
    }

    Ok(report)
}

/// Answer one question and print it with its sources
#[inline]
pub async fn ask(base_dir: &Path, request: &QueryRequest, stream: bool) -> Result<()> {
    let config = Config::load(base_dir)?;
    let pipeline = Pipeline::from_config(&config)
        .await
        .map_err(|e| anyhow!(e.user_message()))?;

    answer_question(&pipeline, request, stream)
        .await
        .map_err(|e| anyhow!(e.user_message()))
}

/// Interactive question loop; `quit` or `exit` leaves
#[inline]
pub async fn chat(base_dir: &Path, stream: bool) -> Result<()> {
    let config = Config::load(base_dir)?;
    let pipeline = Pipeline::from_config(&config)
        .await
        .map_err(|e| anyhow!(e.user_message()))?;

    println!("{}", style("--- Club Knowledge Search Agent ---").bold().cyan());
    println!("Ask me questions about club events. Type 'quit' or 'exit' to end.");

    loop {
        println!();
        let input: String = match Input::new()
            .with_prompt("You")
            .allow_empty(true)
            .interact_text()
        {
            Ok(input) => input,
            Err(e) => {
                warn!("Input closed: {}", e);
                break;
            }
        };

        let question = input.trim();
        if question.eq_ignore_ascii_case("quit") || question.eq_ignore_ascii_case("exit") {
            break;
        }
        if question.is_empty() {
            continue;
        }

        let request = QueryRequest::new(question);
        if let Err(e) = answer_question(&pipeline, &request, stream).await {
            println!("Agent: {}", e.user_message());
        }
    }

    println!("Agent: Goodbye!");
    Ok(())
}

async fn answer_question(
    pipeline: &Pipeline,
    request: &QueryRequest,
    stream: bool,
) -> crate::Result<()> {
    let sources = if stream {
        let (sources, mut fragments) = pipeline
            .answer_stream(request)
            .await
            .inspect_err(log_failure)?;
        let mut stdout = std::io::stdout();
        print!("Agent: ");
        while let Some(fragment) = fragments.next().await {
            let fragment = fragment.inspect_err(|e| {
                println!();
                log_failure(e);
            })?;
            print!("{}", fragment);
            stdout.flush()?;
        }
        println!();
        sources
    } else {
        let answer = pipeline.answer(request).await.inspect_err(log_failure)?;
        println!("Agent: {}", answer.answer);
        answer.sources
    };

    print_sources(&sources);
    Ok(())
}

fn log_failure(error: &RagError) {
    error!("Failed to answer question: {}", error);
}

fn print_sources(sources: &[SourceRef]) {
    if sources.is_empty() {
        return;
    }
    println!("{}", style("Sources:").dim());
    for source in sources {
        println!("  - {}", source);
    }
}

/// Remove a document from the index
#[inline]
pub async fn delete_document(base_dir: &Path, document_id: &str) -> Result<()> {
    let config = Config::load(base_dir)?;
    let indexer = Indexer::from_config(&config)
        .await
        .context("Failed to initialize indexer")?;

    let known = indexer.store().document_ids().await?;
    if !known.iter().any(|id| id == document_id) {
        println!("Document not found: {}", document_id);
        return Ok(());
    }

    indexer.delete_document(document_id).await?;
    println!("{} Deleted document {}", style("✓").green(), document_id);
    Ok(())
}

/// Report provider connectivity and what the index holds
#[inline]
pub async fn show_status(base_dir: &Path) -> Result<()> {
    let config = Config::load(base_dir)?;

    println!("📊 Club RAG Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("🤖 Embedding Provider:");
    match config.embedding.provider {
        Provider::Ollama => match OllamaEmbedder::new(&config.embedding) {
            Ok(embedder) => match embedder.health_check() {
                Ok(()) => println!(
                    "   ✅ Ollama: Connected ({})",
                    config.embedding.endpoint_url()?
                ),
                Err(e) => println!("   ⚠️  Ollama: Unhealthy - {:#}", e),
            },
            Err(e) => println!("   ❌ Ollama: Failed to configure - {}", e),
        },
        Provider::Gemini => {
            if config.embedding.api_key().is_some() {
                println!("   ✅ Gemini: API key configured");
            } else {
                println!("   ❌ Gemini: No API key configured");
            }
        }
    }
    println!("   📋 Model: {}", config.embedding.model);
    println!("   🔢 Dimension: {}", config.embedding.embedding_dimension);

    println!();
    println!("💬 Generator:");
    println!("   Provider: {}", config.generator.provider);
    println!("   📋 Model: {}", config.generator.model);
    if config.generator.provider == Provider::Gemini && config.generator.api_key().is_none() {
        println!("   ❌ No API key configured");
    }

    println!();
    println!("🔍 Vector Database:");
    match VectorStore::open_for_search(&config).await {
        Ok(store) => {
            let chunks = store.count_chunks().await?;
            let documents = store.document_ids().await?;
            println!("   ✅ LanceDB: {}", config.vector_database_path().display());
            println!("   📄 Documents: {}", documents.len());
            println!("   🧩 Chunks: {}", chunks);
            if !documents.is_empty() {
                println!("   🗂️  Ids: {}", documents.iter().take(20).join(", "));
                if documents.len() > 20 {
                    println!("      … and {} more", documents.len() - 20);
                }
            }
        }
        Err(e) => println!("   ❌ LanceDB: Failed to open - {}", e),
    }

    println!();
    println!("💡 Next Steps:");
    println!("   • Use 'club-rag ingest <file>' to index event documents");
    println!("   • Use 'club-rag ask \"<question>\"' to ask a single question");
    println!("   • Use 'club-rag chat' for an interactive session");

    Ok(())
}
