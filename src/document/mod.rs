// Event documents and the chunks derived from them


use std::fmt;
use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{RagError, Result};

/// An event record as supplied by the loader
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Unique, stable identifier. Re-ingesting the same id replaces the document.
    pub id: String,
    pub title: String,
    /// Raw event text
    pub text: String,
    #[serde(default)]
    pub metadata: DocumentMetadata,
}

/// Structured event attributes stored alongside every chunk
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentMetadata {
    pub date: Option<NaiveDate>,
    pub category: Option<String>,
    pub club: Option<String>,
    pub venue: Option<String>,
}

impl Document {
    #[inline]
    pub fn new(id: impl Into<String>, title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            text: text.into(),
            metadata: DocumentMetadata::default(),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_metadata(mut self, metadata: DocumentMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    #[inline]
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(RagError::Document(format!(
                "document '{}' has an empty id",
                self.title
            )));
        }
        if self.id.contains('#') {
            // '#' separates the document id from the chunk index
            return Err(RagError::Document(format!(
                "document id '{}' must not contain '#'",
                self.id
            )));
        }
        Ok(())
    }

    #[inline]
    pub fn source_ref(&self) -> SourceRef {
        SourceRef {
            document_id: self.id.clone(),
            title: self.title.clone(),
            date: self.metadata.date,
        }
    }
}

/// A bounded slice of a document's text, the unit of retrieval
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    /// Position of this chunk within its document
    pub index: usize,
    pub text: String,
    /// Byte offset of the first character in the document text
    pub start: usize,
    /// Byte offset one past the last character in the document text
    pub end: usize,
    pub token_count: usize,
}

impl Chunk {
    #[inline]
    pub fn chunk_id(document_id: &str, index: usize) -> String {
        format!("{}#{}", document_id, index)
    }
}

/// Reference back to a source document, returned with every answer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRef {
    pub document_id: String,
    pub title: String,
    pub date: Option<NaiveDate>,
}

impl fmt::Display for SourceRef {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.date {
            Some(date) => write!(f, "{} ({}, {})", self.title, self.document_id, date),
            None => write!(f, "{} ({})", self.title, self.document_id),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DocumentFile {
    Many(Vec<Document>),
    One(Box<Document>),
}

/// Load documents from a JSON file holding either one document or an array of them
#[inline]
pub fn load_documents<P: AsRef<Path>>(path: P) -> Result<Vec<Document>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let documents = parse_documents(&content)
        .map_err(|e| RagError::Document(format!("{}: {}", path.display(), e)))?;

    debug!(
        "Loaded {} documents from {}",
        documents.len(),
        path.display()
    );
    Ok(documents)
}

/// Parse the JSON document format used by [`load_documents`]
#[inline]
pub fn parse_documents(content: &str) -> Result<Vec<Document>> {
    let parsed: DocumentFile = serde_json::from_str(content)
        .map_err(|e| RagError::Document(format!("invalid document JSON: {}", e)))?;

    let documents = match parsed {
        DocumentFile::Many(documents) => documents,
        DocumentFile::One(document) => vec![*document],
    };

    for document in &documents {
        document.validate()?;
    }

    Ok(documents)
}
