use super::*;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tempfile::TempDir;

use crate::StudyError;

async fn create_test_pool() -> (TempDir, SqlitePool) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let db_path = temp_dir.path().join("test.db");

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(
            SqliteConnectOptions::new()
                .filename(&db_path)
                .create_if_missing(true)
                .foreign_keys(true),
        )
        .await
        .expect("Failed to create test pool");

    sqlx::migrate!("src/database/sqlite/migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    (temp_dir, pool)
}

async fn seed_course(pool: &SqlitePool) -> (User, Course) {
    let user = UserQueries::create(
        pool,
        NewUser {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
        },
    )
    .await
    .expect("Failed to create user");

    let course = CourseQueries::create(
        pool,
        NewCourse {
            user_id: user.id,
            title: "Biology".to_string(),
            description: None,
        },
    )
    .await
    .expect("Failed to create course");

    (user, course)
}

fn new_document(course_id: i64) -> NewDocument {
    NewDocument {
        course_id,
        title: "Cell notes".to_string(),
        file_type: "txt".to_string(),
        extracted_text: Some("Cells are the basic unit of life.".to_string()),
        page_count: None,
    }
}

fn chunk(index: i64, embedding: Option<Vec<f32>>) -> NewDocumentChunk {
    NewDocumentChunk {
        chunk_index: index,
        content: format!("chunk {}", index),
        page_number: 1,
        embedding,
        token_count: 1,
    }
}

#[tokio::test]
async fn document_lifecycle() {
    let (_temp_dir, pool) = create_test_pool().await;
    let (_user, course) = seed_course(&pool).await;

    let document = DocumentQueries::create(&pool, new_document(course.id))
        .await
        .expect("Failed to create document");
    assert_eq!(document.processing_status, DocumentStatus::Pending);
    assert!(document.processed_at.is_none());

    let processed_at = Utc::now().naive_utc();
    DocumentQueries::mark_completed(&pool, document.id, 1, processed_at)
        .await
        .expect("Failed to mark completed");

    let completed = DocumentQueries::get_by_id(&pool, document.id)
        .await
        .expect("Query should succeed")
        .expect("Document should exist");
    assert_eq!(completed.processing_status, DocumentStatus::Completed);
    assert_eq!(completed.page_count, Some(1));
    assert!(completed.processed_at.is_some());

    DocumentQueries::mark_failed(&pool, document.id, "embedding service down")
        .await
        .expect("Failed to mark failed");
    let failed = DocumentQueries::get_by_id(&pool, document.id)
        .await
        .expect("Query should succeed")
        .expect("Document should exist");
    assert!(failed.is_failed());
    assert_eq!(failed.error_message.as_deref(), Some("embedding service down"));
}

#[tokio::test]
async fn chunk_replacement_keeps_order_and_vectors() {
    let (_temp_dir, pool) = create_test_pool().await;
    let (_user, course) = seed_course(&pool).await;
    let document = DocumentQueries::create(&pool, new_document(course.id))
        .await
        .expect("Failed to create document");

    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    ChunkQueries::replace_for_document(
        &mut conn,
        document.id,
        &[chunk(1, None), chunk(0, Some(vec![0.5, 0.5]))],
    )
    .await
    .expect("Failed to insert chunks");

    let chunks = ChunkQueries::list_by_document(&mut *conn, document.id)
        .await
        .expect("Failed to list chunks");
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].chunk_index, 0);
    assert_eq!(chunks[0].embedding, Some(vec![0.5, 0.5]));
    assert_eq!(chunks[1].embedding, None);

    ChunkQueries::replace_for_document(&mut conn, document.id, &[chunk(0, None)])
        .await
        .expect("Failed to replace chunks");
    drop(conn);

    let count = ChunkQueries::count_by_document(&pool, document.id)
        .await
        .expect("Failed to count chunks");
    assert_eq!(count, 1);
}

#[tokio::test]
async fn question_creation_rejects_two_correct_options() {
    let (_temp_dir, pool) = create_test_pool().await;
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");

    let question = NewQuestion {
        course_id: None,
        topic_id: None,
        document_id: None,
        question_type: QuestionType::MultipleChoice,
        question_text: "Pick one".to_string(),
        explanation: None,
        points: 10.0,
        generated_by_ai: false,
        options: vec![
            NewQuestionOption {
                option_text: "A".to_string(),
                is_correct: true,
            },
            NewQuestionOption {
                option_text: "B".to_string(),
                is_correct: true,
            },
        ],
    };

    let err = QuestionQueries::create(&mut conn, question.clone())
        .await
        .expect_err("Two correct options should be rejected");
    let err = StudyError::from(err);
    assert!(
        matches!(&err, StudyError::InvalidInput(message) if message.contains("2 correct options")),
        "unexpected error: {err:?}"
    );
    let stored: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM questions")
        .fetch_one(&mut *conn)
        .await
        .expect("Failed to count questions");
    assert_eq!(stored, 0);

    let valid = NewQuestion {
        options: vec![
            NewQuestionOption {
                option_text: "A".to_string(),
                is_correct: true,
            },
            NewQuestionOption {
                option_text: "B".to_string(),
                is_correct: false,
            },
        ],
        ..question
    };
    let (record, options) = QuestionQueries::create(&mut conn, valid)
        .await
        .expect("Failed to create question");
    assert_eq!(record.question_type, QuestionType::MultipleChoice);
    assert_eq!(options.len(), 2);
    assert_eq!(options[1].order_index, 1);
    assert!(options[0].is_correct);
}

#[tokio::test]
async fn attempt_completes_only_once() {
    let (_temp_dir, pool) = create_test_pool().await;
    let (user, course) = seed_course(&pool).await;

    let quiz = QuizQueries::create(
        &pool,
        NewQuiz {
            course_id: course.id,
            topic_id: None,
            created_by: user.id,
            title: "Cells".to_string(),
            description: None,
            time_limit_minutes: Some(30),
            passing_score: Some(70.0),
            is_published: false,
        },
    )
    .await
    .expect("Failed to create quiz");

    let started_at = Utc::now().naive_utc();
    let attempt = AttemptQueries::create(&pool, quiz.id, user.id, 10.0, started_at)
        .await
        .expect("Failed to create attempt");
    assert!(attempt.is_in_progress());

    let completion = AttemptCompletion {
        score: 10.0,
        percentage: 100.0,
        submitted_at: Utc::now().naive_utc(),
        time_spent_seconds: 42,
    };

    assert!(AttemptQueries::complete(&pool, attempt.id, completion)
        .await
        .expect("Update should succeed"));
    assert!(!AttemptQueries::complete(&pool, attempt.id, completion)
        .await
        .expect("Update should succeed"));

    let stored = AttemptQueries::get_by_id(&pool, attempt.id)
        .await
        .expect("Query should succeed")
        .expect("Attempt should exist");
    assert_eq!(stored.status, AttemptStatus::Completed);
    assert_eq!(stored.time_spent_seconds, Some(42));
}

#[tokio::test]
async fn chat_messages_and_citations() {
    let (_temp_dir, pool) = create_test_pool().await;
    let (user, course) = seed_course(&pool).await;
    let document = DocumentQueries::create(&pool, new_document(course.id))
        .await
        .expect("Failed to create document");

    let session = ChatQueries::create_session(
        &pool,
        NewChatSession {
            user_id: user.id,
            course_id: Some(course.id),
            document_id: Some(document.id),
            title: "Revision".to_string(),
        },
    )
    .await
    .expect("Failed to create session");
    assert!(session.last_message_at.is_none());

    let now = Utc::now().naive_utc();
    let message = ChatQueries::add_message(&pool, session.id, MessageRole::Assistant, "Answer", now)
        .await
        .expect("Failed to add message");

    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let citations = CitationQueries::create_batch(
        &mut conn,
        message.id,
        &[NewCitation {
            document_id: document.id,
            chunk_id: None,
            page_number: Some(1),
            quote_text: "Cells are...".to_string(),
            relevance_score: 0.9,
        }],
    )
    .await
    .expect("Failed to create citations");
    drop(conn);
    assert_eq!(citations.len(), 1);

    ChatQueries::touch_session(&pool, session.id, now)
        .await
        .expect("Failed to touch session");
    let touched = ChatQueries::get_session(&pool, session.id)
        .await
        .expect("Query should succeed")
        .expect("Session should exist");
    assert!(touched.last_message_at.is_some());

    let messages = ChatQueries::list_messages(&pool, session.id)
        .await
        .expect("Failed to list messages");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].role, MessageRole::Assistant);
}
