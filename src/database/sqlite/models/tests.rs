use chrono::Utc;

use super::*;

#[test]
fn document_status_display() {
    assert_eq!(DocumentStatus::Pending.to_string(), "Pending");
    assert_eq!(DocumentStatus::Completed.to_string(), "Completed");
    assert_eq!(DocumentStatus::Failed.to_string(), "Failed");
}

#[test]
fn question_type_round_trips_through_str() {
    for kind in [
        QuestionType::MultipleChoice,
        QuestionType::ShortAnswer,
        QuestionType::Essay,
    ] {
        assert_eq!(kind.as_str().parse::<QuestionType>(), Ok(kind));
    }
    assert!("true_false".parse::<QuestionType>().is_err());
}

#[test]
fn embedding_bytes_are_little_endian() {
    let bytes = encode_embedding(&[1.0, -0.5]);
    assert_eq!(bytes.len(), 8);
    assert_eq!(&bytes[..4], &1.0f32.to_le_bytes());
    assert_eq!(decode_embedding(&bytes), Some(vec![1.0, -0.5]));
}

#[test]
fn malformed_embedding_bytes_decode_to_none() {
    assert_eq!(decode_embedding(&[]), None);
    assert_eq!(decode_embedding(&[0, 0, 128]), None);
}

#[test]
fn chunk_row_conversion_decodes_vector() {
    let row = DocumentChunkRow {
        id: 7,
        document_id: 3,
        chunk_index: 0,
        content: "Mitochondria".to_string(),
        page_number: 1,
        embedding: Some(encode_embedding(&[0.25, 0.75])),
        token_count: 3,
    };

    let chunk = DocumentChunk::from(row.clone());
    assert_eq!(chunk.embedding, Some(vec![0.25, 0.75]));

    let without_vector = DocumentChunk::from(DocumentChunkRow {
        embedding: None,
        ..row
    });
    assert_eq!(without_vector.embedding, None);
}

#[test]
fn document_text_ignores_empty_extraction() {
    let document = Document {
        id: 1,
        course_id: 1,
        title: "Notes".to_string(),
        file_type: "txt".to_string(),
        extracted_text: Some(String::new()),
        processing_status: DocumentStatus::Pending,
        page_count: None,
        error_message: None,
        uploaded_at: Utc::now().naive_utc(),
        processed_at: None,
    };

    assert_eq!(document.text(), None);
    assert!(!document.is_completed());

    let with_text = Document {
        extracted_text: Some("Cells divide.".to_string()),
        processing_status: DocumentStatus::Completed,
        ..document
    };
    assert_eq!(with_text.text(), Some("Cells divide."));
    assert!(with_text.is_completed());
    assert!(!with_text.is_failed());
}

fn multiple_choice(options: &[(&str, bool)]) -> NewQuestion {
    NewQuestion {
        course_id: None,
        topic_id: None,
        document_id: None,
        question_type: QuestionType::MultipleChoice,
        question_text: "Which organelle makes ATP?".to_string(),
        explanation: None,
        points: 10.0,
        generated_by_ai: false,
        options: options
            .iter()
            .map(|(text, is_correct)| NewQuestionOption {
                option_text: (*text).to_string(),
                is_correct: *is_correct,
            })
            .collect(),
    }
}

#[test]
fn question_validation_rules() {
    assert!(multiple_choice(&[("Mitochondria", true), ("Nucleus", false)])
        .validate()
        .is_ok());
    assert!(multiple_choice(&[("Mitochondria", false), ("Nucleus", false)])
        .validate()
        .is_ok());
    assert!(multiple_choice(&[("Mitochondria", true), ("Nucleus", true)])
        .validate()
        .is_err());
    assert!(multiple_choice(&[]).validate().is_err());

    let essay_with_options = NewQuestion {
        question_type: QuestionType::Essay,
        ..multiple_choice(&[("A", false)])
    };
    assert!(essay_with_options.validate().is_err());

    let essay = NewQuestion {
        question_type: QuestionType::Essay,
        options: Vec::new(),
        ..multiple_choice(&[])
    };
    assert!(essay.validate().is_ok());
}
