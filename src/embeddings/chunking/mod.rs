
use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::document::{Chunk, Document};

/// Configuration for document chunking
///
/// Lengths are measured in whitespace-separated words.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Target chunk length; no chunk is longer than this
    pub chunk_size: usize,
    /// Number of words shared by consecutive chunks
    pub overlap_size: usize,
    /// How far back from a hard split to look for a sentence end (0 disables snapping)
    pub sentence_lookback: usize,
    /// Whether to prefix the event title and metadata to the text sent for embedding
    pub contextual_embeddings: bool,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 400,
            overlap_size: 50,
            sentence_lookback: 40,
            contextual_embeddings: true,
        }
    }
}

/// Split a document into overlapping chunks
///
/// Windows of `chunk_size` words advance by `chunk_size - overlap_size` words.
/// A window that would end mid-sentence is pulled back to the nearest sentence
/// end within `sentence_lookback` words, so long as it still covers more than
/// the overlap. The next window always starts `overlap_size` words before the
/// previous one ended.
#[inline]
pub fn chunk_document(document: &Document, config: &ChunkingConfig) -> Result<Vec<Chunk>> {
    if config.chunk_size == 0 {
        bail!("Chunk size must be greater than zero");
    }
    if config.overlap_size >= config.chunk_size {
        bail!(
            "Overlap size ({}) must be smaller than chunk size ({})",
            config.overlap_size,
            config.chunk_size
        );
    }

    let text = document.text.as_str();
    let words = word_spans(text);
    if words.is_empty() {
        debug!("Document '{}' has no text to chunk", document.id);
        return Ok(Vec::new());
    }

    let mut chunks = Vec::new();
    let mut start_word = 0;

    loop {
        let hard_end = (start_word + config.chunk_size).min(words.len());
        let end_word = if hard_end < words.len() {
            snap_to_sentence_end(text, &words, start_word, hard_end, config)
        } else {
            hard_end
        };

        chunks.push(build_chunk(document, &words, start_word, end_word, chunks.len()));

        if end_word >= words.len() {
            break;
        }
        start_word = end_word - config.overlap_size;
    }

    debug!(
        "Chunked document '{}' ({} words) into {} chunks",
        document.id,
        words.len(),
        chunks.len()
    );

    Ok(chunks)
}

/// Byte spans of every whitespace-separated word
fn word_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut word_start = None;

    for (i, c) in text.char_indices() {
        if c.is_whitespace() {
            if let Some(start) = word_start.take() {
                spans.push((start, i));
            }
        } else if word_start.is_none() {
            word_start = Some(i);
        }
    }

    if let Some(start) = word_start {
        spans.push((start, text.len()));
    }

    spans
}

fn snap_to_sentence_end(
    text: &str,
    words: &[(usize, usize)],
    start_word: usize,
    hard_end: usize,
    config: &ChunkingConfig,
) -> usize {
    // The snapped window must keep more than `overlap_size` words or the next
    // window would not advance.
    let lowest = hard_end
        .saturating_sub(config.sentence_lookback)
        .max(start_word + config.overlap_size + 1);

    (lowest..=hard_end)
        .rev()
        .find(|&end| {
            let (word_start, word_end) = words[end - 1];
            text.get(word_start..word_end).is_some_and(ends_sentence)
        })
        .unwrap_or(hard_end)
}

fn ends_sentence(word: &str) -> bool {
    word.trim_end_matches(['"', '\'', ')', ']', '\u{201d}', '\u{2019}'])
        .ends_with(['.', '!', '?'])
}

fn build_chunk(
    document: &Document,
    words: &[(usize, usize)],
    start_word: usize,
    end_word: usize,
    index: usize,
) -> Chunk {
    let start = words[start_word].0;
    let end = words[end_word - 1].1;
    let text = document
        .text
        .get(start..end)
        .unwrap_or_default()
        .to_string();
    let token_count = estimate_token_count(&text);

    Chunk {
        id: Chunk::chunk_id(&document.id, index),
        document_id: document.id.clone(),
        index,
        text,
        start,
        end,
        token_count,
    }
}

/// Text sent to the embedder for a chunk
///
/// With contextual embeddings enabled the event title and metadata are
/// prepended, so a chunk from the middle of a long description still matches
/// questions that name the event.
#[inline]
pub fn embedding_text(document: &Document, chunk: &Chunk, config: &ChunkingConfig) -> String {
    if !config.contextual_embeddings {
        return chunk.text.clone();
    }

    let mut header = format!("Event: {}", document.title);
    let metadata = &document.metadata;
    if let Some(club) = &metadata.club {
        header.push_str("\nClub: ");
        header.push_str(club);
    }
    if let Some(category) = &metadata.category {
        header.push_str("\nCategory: ");
        header.push_str(category);
    }
    if let Some(date) = metadata.date {
        header.push_str("\nDate: ");
        header.push_str(&date.format("%Y-%m-%d").to_string());
    }

    format!("{}\n\n{}", header, chunk.text)
}

/// Estimate token count using a simple heuristic
/// This is a rough approximation - actual tokenization would be more accurate
#[inline]
pub fn estimate_token_count(text: &str) -> usize {
    // Rough heuristic: 1 token ≈ 0.75 words for English text
    // Add extra tokens for punctuation and special characters
    let word_count = text.split_whitespace().count();
    let punct_count = text.chars().filter(|c| c.is_ascii_punctuation()).count();

    (punct_count as f64).mul_add(0.1, word_count as f64 / 0.75) as usize
}
