// LanceDB vector database module
// Chunk vectors with their event metadata, searched by cosine similarity


pub mod vector_store;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::document::{Chunk, Document, DocumentMetadata, SourceRef};

pub use vector_store::VectorStore;

/// A chunk ready to be written: its text, parent document details and vector
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRecord {
    pub chunk: Chunk,
    /// Title of the parent document
    pub title: String,
    pub metadata: DocumentMetadata,
    pub vector: Vec<f32>,
}

impl ChunkRecord {
    #[inline]
    pub fn new(document: &Document, chunk: Chunk, vector: Vec<f32>) -> Self {
        Self {
            chunk,
            title: document.title.clone(),
            metadata: document.metadata.clone(),
            vector,
        }
    }
}

/// A chunk returned by similarity search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub chunk_id: String,
    pub document_id: String,
    pub title: String,
    pub text: String,
    pub chunk_index: u32,
    pub metadata: DocumentMetadata,
    /// Cosine similarity to the query; higher is closer
    pub score: f32,
}

impl RetrievedChunk {
    #[inline]
    pub fn source_ref(&self) -> SourceRef {
        SourceRef {
            document_id: self.document_id.clone(),
            title: self.title.clone(),
            date: self.metadata.date,
        }
    }
}

/// Metadata restrictions applied before the nearest-neighbour search
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilters {
    pub category: Option<String>,
    pub club: Option<String>,
    /// Inclusive lower bound on the event date
    pub date_from: Option<NaiveDate>,
    /// Inclusive upper bound on the event date
    pub date_to: Option<NaiveDate>,
    /// Restrict results to these documents
    pub document_ids: Option<Vec<String>>,
}

impl SearchFilters {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.to_predicate().is_none() && self.document_ids.is_none()
    }

    /// True when the filters can never match anything
    #[inline]
    pub fn excludes_everything(&self) -> bool {
        self.document_ids.as_ref().is_some_and(Vec::is_empty)
            || matches!((self.date_from, self.date_to), (Some(from), Some(to)) if from > to)
    }

    /// Render the filters as a LanceDB SQL predicate
    ///
    /// Dates are stored as ISO-8601 strings, so lexical comparison orders
    /// them chronologically. Events without a date never match a date bound.
    #[inline]
    pub fn to_predicate(&self) -> Option<String> {
        let mut clauses = Vec::new();

        if let Some(category) = &self.category {
            clauses.push(format!("category = {}", sql_literal(category)));
        }
        if let Some(club) = &self.club {
            clauses.push(format!("club = {}", sql_literal(club)));
        }
        if let Some(from) = self.date_from {
            clauses.push(format!("date >= '{}'", from.format("%Y-%m-%d")));
        }
        if let Some(to) = self.date_to {
            clauses.push(format!("date <= '{}'", to.format("%Y-%m-%d")));
        }
        if let Some(ids) = self.document_ids.as_ref().filter(|ids| !ids.is_empty()) {
            let list = ids
                .iter()
                .map(|id| sql_literal(id))
                .collect::<Vec<_>>()
                .join(", ");
            clauses.push(format!("document_id IN ({})", list));
        }

        if clauses.is_empty() {
            None
        } else {
            Some(clauses.join(" AND "))
        }
    }
}

/// Quote a string for use in a filter predicate
#[inline]
pub fn sql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
