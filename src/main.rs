use std::path::PathBuf;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use club_rag::commands::{ask, chat, delete_document, ingest, show_status};
use club_rag::config::{get_config_dir, run_interactive_config, show_config};
use club_rag::database::SearchFilters;
use club_rag::pipeline::QueryRequest;

#[derive(Parser)]
#[command(name = "club-rag")]
#[command(about = "Answer questions about club events from indexed event records")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml and the vector database
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the embedding and generation providers
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Index event documents from a JSON file
    Ingest {
        /// JSON file with one document or an array of documents
        file: PathBuf,
    },
    /// Ask a single question
    Ask {
        question: String,
        /// Number of passages to retrieve
        #[arg(long)]
        k: Option<usize>,
        /// Only use events in this category
        #[arg(long)]
        category: Option<String>,
        /// Only use events run by this club
        #[arg(long)]
        club: Option<String>,
        /// Only use events on or after this date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Only use events on or before this date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,
        /// Print the answer as it is generated
        #[arg(long)]
        stream: bool,
    },
    /// Remove a document and its passages from the index
    Delete {
        /// Id of the document to delete
        document_id: String,
    },
    /// Show provider and index status
    Status,
    /// Start an interactive question session
    Chat {
        /// Print answers as they are generated
        #[arg(long)]
        stream: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let base_dir = match cli.home {
        Some(home) => home,
        None => get_config_dir()?,
    };

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&base_dir)?;
            } else {
                run_interactive_config(&base_dir)?;
            }
        }
        Commands::Ingest { file } => {
            ingest(&base_dir, &file).await?;
        }
        Commands::Ask {
            question,
            k,
            category,
            club,
            from,
            to,
            stream,
        } => {
            let request = build_request(question, k, category, club, from, to);
            ask(&base_dir, &request, stream).await?;
        }
        Commands::Delete { document_id } => {
            delete_document(&base_dir, &document_id).await?;
        }
        Commands::Status => {
            show_status(&base_dir).await?;
        }
        Commands::Chat { stream } => {
            chat(&base_dir, stream).await?;
        }
    }

    Ok(())
}

fn build_request(
    question: String,
    k: Option<usize>,
    category: Option<String>,
    club: Option<String>,
    date_from: Option<NaiveDate>,
    date_to: Option<NaiveDate>,
) -> QueryRequest {
    let filters = SearchFilters {
        category,
        club,
        date_from,
        date_to,
        document_ids: None,
    };

    QueryRequest {
        question,
        k,
        filters: (!filters.is_empty()).then_some(filters),
    }
}
