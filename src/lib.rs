use thiserror::Error;

use crate::config::ConfigError;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid document: {0}")]
    Document(String),

    #[error("Invalid query: {0}")]
    Query(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    Store(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Prompt of {required} characters exceeds the budget of {limit} characters")]
    BudgetExceeded { required: usize, limit: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl RagError {
    /// Message suitable for showing to the person who asked the question.
    #[inline]
    pub fn user_message(&self) -> String {
        match self {
            Self::Query(reason) => format!("Sorry, I couldn't use that question: {}", reason),
            Self::Embedding(_) => {
                "Sorry, I had trouble understanding the question right now. Please try again."
                    .to_string()
            }
            Self::Store(_) => {
                "Sorry, I couldn't search the club knowledge base right now. Please try again."
                    .to_string()
            }
            Self::Generation(_) => {
                "Sorry, I had trouble formulating a response. Please try again.".to_string()
            }
            Self::BudgetExceeded { .. } => {
                "Sorry, that question is too long for me to answer. Please shorten it.".to_string()
            }
            Self::Config(e) => format!("The assistant is misconfigured: {}", e),
            Self::Document(_) | Self::Io(_) | Self::Other(_) => format!("Error: {}", self),
        }
    }
}

pub mod commands;
pub mod config;
pub mod database;
pub mod document;
pub mod embeddings;
pub mod generator;
pub mod http;
pub mod indexer;
pub mod pipeline;
pub mod prompt;
pub mod retriever;

#[cfg(test)]
mod test_support;
