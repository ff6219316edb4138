// Shared fixtures for the provider-backed integration tests

use chrono::NaiveDate;
use club_rag::document::{Document, DocumentMetadata};
use club_rag::prompt::NO_INFORMATION_REPLY;

pub const DIMENSION: usize = 64;
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "at", "do", "does", "for", "in", "is", "it", "of", "on", "the",
    "to", "was", "what", "when", "where", "which", "who", "will",
];

/// Bag-of-words vectors: texts sharing words point the same way
pub fn keyword_vector(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; DIMENSION];
    let lowered = text.to_lowercase();

    for token in lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty() && !STOPWORDS.contains(token))
    {
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in token.bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        vector[(hash % DIMENSION as u64) as usize] += 1.0;
    }

    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        vector[0] = 1.0;
    } else {
        vector.iter_mut().for_each(|x| *x /= norm);
    }
    vector
}

/// Reply a model grounded in the prompt's records would give
pub fn reply_from_records(prompt: &str) -> &'static str {
    if prompt.contains("No relevant records were found") {
        NO_INFORMATION_REPLY
    } else if prompt.contains("May 3rd") {
        "The Spring Social is on May 3rd at the Student Union."
    } else {
        "Chess Club meets every Thursday."
    }
}

pub fn event_records() -> Vec<Document> {
    vec![
        Document::new(
            "spring-social",
            "Spring Social",
            "The Spring Social is on May 3rd at the Student Union.",
        )
        .with_metadata(DocumentMetadata {
            date: NaiveDate::from_ymd_opt(2025, 5, 3),
            category: Some("Social".to_string()),
            ..DocumentMetadata::default()
        }),
        Document::new(
            "chess-night",
            "Chess Night",
            "Chess Club meets for blitz tournaments every Thursday.",
        )
        .with_metadata(DocumentMetadata {
            category: Some("Games".to_string()),
            ..DocumentMetadata::default()
        }),
    ]
}

