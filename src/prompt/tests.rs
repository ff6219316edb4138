use super::*;
use crate::document::DocumentMetadata;
use chrono::NaiveDate;

fn chunk(document_id: &str, index: u32, title: &str, text: &str) -> RetrievedChunk {
    RetrievedChunk {
        chunk_id: format!("{}#{}", document_id, index),
        document_id: document_id.to_string(),
        title: title.to_string(),
        text: text.to_string(),
        chunk_index: index,
        metadata: DocumentMetadata::default(),
        score: 0.9,
    }
}

fn spring_social() -> RetrievedChunk {
    let mut social = chunk(
        "spring-social",
        0,
        "Spring Social",
        "The Spring Social is on May 3rd in the Union Hall.",
    );
    social.metadata = DocumentMetadata {
        date: NaiveDate::from_ymd_opt(2025, 5, 3),
        category: Some("Social".to_string()),
        club: None,
        venue: Some("Union Hall".to_string()),
    };
    social
}

fn assembler(max_prompt_chars: usize) -> PromptAssembler {
    PromptAssembler::new(PromptConfig {
        max_prompt_chars,
        system_instruction: "Answer from the context.".to_string(),
    })
}

#[test]
fn marker_lists_present_metadata() {
    assert_eq!(
        provenance_marker(1, &spring_social()),
        "[Source 1] Spring Social (document: spring-social, date: 2025-05-03, category: Social, venue: Union Hall)"
    );
    assert_eq!(
        provenance_marker(2, &chunk("quiz", 0, "Quiz Night", "")),
        "[Source 2] Quiz Night (document: quiz)"
    );
}

#[test]
fn layout_keeps_retrieval_order() {
    let retrieval = RetrievalResult::new(vec![
        spring_social(),
        chunk("chess", 0, "Chess Night", "Chess Club meets on Thursdays."),
    ]);

    let prompt = assembler(2_000)
        .assemble("When is the Spring Social?", &retrieval)
        .expect("prompt should assemble");

    let expected = "Answer from the context.\n\nContext:\n\
        [Source 1] Spring Social (document: spring-social, date: 2025-05-03, category: Social, venue: Union Hall)\n\
        The Spring Social is on May 3rd in the Union Hall.\n\n\
        [Source 2] Chess Night (document: chess)\n\
        Chess Club meets on Thursdays.\n\n\
        Question: When is the Spring Social?\nAnswer:";
    assert_eq!(prompt.text, expected);
    assert_eq!(prompt.context_chunks, 2);
    assert!(!prompt.truncated);
    let source_ids: Vec<&str> = prompt
        .sources
        .iter()
        .map(|s| s.document_id.as_str())
        .collect();
    assert_eq!(source_ids, vec!["spring-social", "chess"]);
    assert_eq!(prompt.sources[0].date, NaiveDate::from_ymd_opt(2025, 5, 3));
}

#[test]
fn sources_are_distinct_documents() {
    let retrieval = RetrievalResult::new(vec![
        chunk("social", 0, "Social", "part one"),
        chunk("chess", 0, "Chess", "chess"),
        chunk("social", 1, "Social", "part two"),
    ]);

    let prompt = assembler(2_000)
        .assemble("What is on?", &retrieval)
        .expect("prompt should assemble");

    assert_eq!(prompt.context_chunks, 3);
    assert_eq!(prompt.sources.len(), 2);
    assert!(prompt.text.contains("[Source 3] Social (document: social)\npart two"));
}

#[test]
fn empty_retrieval_asks_for_refusal() {
    let prompt = assembler(2_000)
        .assemble("Who won the 1987 regatta?", &RetrievalResult::default())
        .expect("prompt should assemble");

    assert!(prompt.text.contains(NO_INFORMATION_REPLY));
    assert!(prompt.text.ends_with("Question: Who won the 1987 regatta?\nAnswer:"));
    assert!(prompt.sources.is_empty());
    assert_eq!(prompt.context_chunks, 0);
}

#[test]
fn drops_trailing_chunks_over_budget() {
    let retrieval = RetrievalResult::new(vec![
        chunk("a", 0, "A", &"a".repeat(100)),
        chunk("b", 0, "B", &"b".repeat(100)),
        chunk("c", 0, "C", &"c".repeat(100)),
    ]);
    let full = assembler(10_000)
        .assemble("q?", &retrieval)
        .expect("prompt should assemble");
    let budget = full.text.chars().count() - 50;

    let prompt = assembler(budget)
        .assemble("q?", &retrieval)
        .expect("prompt should assemble");

    assert_eq!(prompt.context_chunks, 2);
    assert!(prompt.truncated);
    assert!(prompt.text.chars().count() <= budget);
    assert!(!prompt.text.contains("[Source 3]"));
    let source_ids: Vec<&str> = prompt
        .sources
        .iter()
        .map(|s| s.document_id.as_str())
        .collect();
    assert_eq!(source_ids, vec!["a", "b"]);
}

#[test]
fn truncates_first_chunk_to_fit_exactly() {
    let long_text = "é".repeat(500);
    let retrieval = RetrievalResult::new(vec![
        chunk("long", 0, "Long", &long_text),
        chunk("next", 0, "Next", "short"),
    ]);
    let budget = 300;

    let prompt = assembler(budget)
        .assemble("How long?", &retrieval)
        .expect("prompt should assemble");

    assert_eq!(prompt.text.chars().count(), budget);
    assert_eq!(prompt.context_chunks, 1);
    assert!(prompt.truncated);
    assert!(prompt.text.contains("é…\n\nQuestion: How long?"));
    assert_eq!(prompt.sources.len(), 1);
}

#[test]
fn fixed_parts_over_budget_fail() {
    let question = "Why? ".repeat(100);

    let error = assembler(256)
        .assemble(&question, &RetrievalResult::new(vec![spring_social()]))
        .expect_err("question alone should not fit");

    assert!(matches!(error, RagError::BudgetExceeded { limit: 256, .. }));

    let error = assembler(256)
        .assemble(&question, &RetrievalResult::default())
        .expect_err("question alone should not fit");
    assert!(matches!(error, RagError::BudgetExceeded { limit: 256, .. }));
}

#[test]
fn blank_question_is_rejected() {
    let result = assembler(2_000).assemble("  \n", &RetrievalResult::default());

    assert!(matches!(result, Err(RagError::Query(_))));
}

#[test]
fn default_instruction_mentions_refusal() {
    let config = PromptConfig::default();

    assert_eq!(config.max_prompt_chars, 12_000);
    assert!(config.system_instruction.contains(NO_INFORMATION_REPLY));
}
