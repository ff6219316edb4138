// Prompt assembly: context blocks with provenance markers under a character budget

#[cfg(test)]
mod tests;

use std::fmt::Write;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::database::RetrievedChunk;
use crate::document::SourceRef;
use crate::retriever::{RetrievalResult, distinct_sources};
use crate::{RagError, Result};

/// The exact reply expected when the records do not answer the question
pub const NO_INFORMATION_REPLY: &str = "I do not have that information in my records.";

const TRUNCATION_MARKER: char = '…';

const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are the Club Knowledge Search Agent. \
Answer the question using only the numbered sources in the context. \
Mention the event name and date when they matter, and cite sources as [Source N]. \
If the context does not contain the answer, reply exactly: \
\"I do not have that information in my records.\" Do not make up information.";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PromptConfig {
    /// Upper bound on the assembled prompt, in characters
    pub max_prompt_chars: usize,
    pub system_instruction: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            max_prompt_chars: 12_000,
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
        }
    }
}

/// A prompt ready for the generator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub text: String,
    /// Documents whose chunks made it into `text`, in first-appearance order
    pub sources: Vec<SourceRef>,
    /// Number of chunks included
    pub context_chunks: usize,
    /// Whether any retrieved chunk was dropped or shortened to fit the budget
    pub truncated: bool,
}

#[derive(Debug, Clone)]
pub struct PromptAssembler {
    config: PromptConfig,
}

impl PromptAssembler {
    #[inline]
    pub fn new(config: PromptConfig) -> Self {
        Self { config }
    }

    #[inline]
    pub fn budget(&self) -> usize {
        self.config.max_prompt_chars
    }

    /// Merge `question` and the retrieved chunks into one prompt
    ///
    /// Chunks keep retrieval order. Trailing chunks are dropped until the
    /// prompt fits; if not even the first chunk fits, its text is cut short.
    /// With nothing retrieved the prompt tells the model to give
    /// [`NO_INFORMATION_REPLY`].
    #[inline]
    pub fn assemble(&self, question: &str, retrieval: &RetrievalResult) -> Result<Prompt> {
        let question = question.trim();
        if question.is_empty() {
            return Err(RagError::Query("question is empty".to_string()));
        }

        let budget = self.config.max_prompt_chars;
        let head = format!("{}\n\nContext:\n", self.config.system_instruction.trim());
        let tail = format!("Question: {}\nAnswer:", question);

        if retrieval.is_empty() {
            let notice = format!(
                "No relevant records were found. Reply exactly: \"{}\"\n\n",
                NO_INFORMATION_REPLY
            );
            let text = format!("{}{}{}", head, notice, tail);
            ensure_fits(&text, budget)?;
            debug!("Assembled empty-context prompt of {} characters", char_len(&text));
            return Ok(Prompt {
                text,
                sources: Vec::new(),
                context_chunks: 0,
                truncated: false,
            });
        }

        let fixed = char_len(&head) + char_len(&tail);
        let mut used = fixed;
        let mut body = String::new();
        let mut included = 0;

        for (index, chunk) in retrieval.iter().enumerate() {
            let block = context_block(index + 1, chunk, &chunk.text);
            let block_len = char_len(&block);
            if used + block_len > budget {
                break;
            }
            body.push_str(&block);
            used += block_len;
            included += 1;
        }

        let mut truncated = included < retrieval.len();

        if included == 0 {
            let first = &retrieval.chunks[0];
            // Block with empty text plus room for at least one character and the marker
            let overhead = char_len(&context_block(1, first, ""));
            let minimum = fixed + overhead + 2;
            if minimum > budget {
                return Err(RagError::BudgetExceeded {
                    required: minimum,
                    limit: budget,
                });
            }

            let keep = budget - fixed - overhead - 1;
            let mut shortened: String = first.text.chars().take(keep).collect();
            shortened.push(TRUNCATION_MARKER);
            body = context_block(1, first, &shortened);
            included = 1;
            truncated = true;
        }

        if truncated {
            warn!(
                "Prompt budget of {} characters fits {} of {} retrieved chunks",
                budget,
                included,
                retrieval.len()
            );
        }

        let text = format!("{}{}{}", head, body, tail);
        ensure_fits(&text, budget)?;
        debug!(
            "Assembled prompt of {} characters with {} chunks",
            char_len(&text),
            included
        );

        Ok(Prompt {
            text,
            sources: distinct_sources(&retrieval.chunks[..included]),
            context_chunks: included,
            truncated,
        })
    }
}

/// `[Source N] Title (document: id, date: ..., category: ...)`
#[inline]
pub fn provenance_marker(number: usize, chunk: &RetrievedChunk) -> String {
    let mut marker = format!(
        "[Source {}] {} (document: {}",
        number, chunk.title, chunk.document_id
    );
    let metadata = &chunk.metadata;
    if let Some(date) = metadata.date {
        let _ = write!(marker, ", date: {}", date.format("%Y-%m-%d"));
    }
    if let Some(category) = &metadata.category {
        let _ = write!(marker, ", category: {}", category);
    }
    if let Some(club) = &metadata.club {
        let _ = write!(marker, ", club: {}", club);
    }
    if let Some(venue) = &metadata.venue {
        let _ = write!(marker, ", venue: {}", venue);
    }
    marker.push(')');
    marker
}

fn context_block(number: usize, chunk: &RetrievedChunk, text: &str) -> String {
    format!("{}\n{}\n\n", provenance_marker(number, chunk), text)
}

fn ensure_fits(text: &str, limit: usize) -> Result<()> {
    let required = char_len(text);
    if required > limit {
        return Err(RagError::BudgetExceeded { required, limit });
    }
    Ok(())
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}
