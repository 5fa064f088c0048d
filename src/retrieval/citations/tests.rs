use super::*;
use crate::database::sqlite::models::DocumentChunk;

#[test]
fn excerpt_marks_truncation() {
    let long = "a".repeat(250);
    let cut = excerpt(&long, 200);
    assert_eq!(cut.len(), 203);
    assert!(cut.ends_with("..."));

    assert_eq!(excerpt("short quote", 200), "short quote");
    assert_eq!(excerpt(&"b".repeat(200), 200), "b".repeat(200));
}

#[test]
fn citations_follow_retrieval_order() {
    let retrieved = vec![
        ScoredChunk {
            chunk: DocumentChunk {
                id: 11,
                document_id: 4,
                chunk_index: 2,
                content: "Enzymes lower activation energy.".to_string(),
                page_number: 1,
                embedding: Some(vec![1.0]),
                token_count: 8,
            },
            similarity: 0.75,
        },
        ScoredChunk {
            chunk: DocumentChunk {
                id: 9,
                document_id: 4,
                chunk_index: 0,
                content: "x".repeat(300),
                page_number: 1,
                embedding: Some(vec![1.0]),
                token_count: 75,
            },
            similarity: 0.5,
        },
    ];

    let citations = build_citations(&retrieved, 200);
    assert_eq!(citations.len(), 2);
    assert_eq!(citations[0].chunk_id, Some(11));
    assert_eq!(citations[0].document_id, 4);
    assert_eq!(citations[0].page_number, Some(1));
    assert_eq!(citations[0].quote_text, "Enzymes lower activation energy.");
    assert_eq!(citations[0].relevance_score, 0.75);
    assert!(citations[1].quote_text.ends_with("..."));
}

#[test]
fn no_retrieval_no_citations() {
    assert!(build_citations(&[], 200).is_empty());
}
