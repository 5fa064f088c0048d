#[cfg(test)]
mod tests;

use super::models::*;
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use sqlx::{SqliteConnection, SqliteExecutor, SqlitePool};
use tracing::{debug, warn};

use crate::StudyError;

const DOCUMENT_COLUMNS: &str = "id, course_id, title, file_type, extracted_text, processing_status, \
     page_count, error_message, uploaded_at, processed_at";
const CHUNK_COLUMNS: &str =
    "id, document_id, chunk_index, content, page_number, embedding, token_count";
const SESSION_COLUMNS: &str =
    "id, user_id, course_id, document_id, title, created_at, last_message_at";
const QUESTION_COLUMNS: &str = "id, course_id, topic_id, document_id, question_type, question_text, \
     explanation, points, generated_by_ai, created_at";
const QUIZ_COLUMNS: &str = "id, course_id, topic_id, created_by, title, description, \
     time_limit_minutes, passing_score, is_published, created_at";
const ATTEMPT_COLUMNS: &str = "id, quiz_id, user_id, status, total_points, score, percentage, \
     started_at, submitted_at, time_spent_seconds";
const ANSWER_COLUMNS: &str = "id, attempt_id, question_id, selected_option_id, text_answer, \
     is_correct, points_earned, ai_feedback, answered_at";

pub struct UserQueries;

impl UserQueries {
    #[inline]
    pub async fn create(pool: &SqlitePool, new_user: NewUser) -> Result<User> {
        sqlx::query_as::<_, User>(
            "INSERT INTO users (name, email) VALUES (?, ?) RETURNING id, name, email, created_at",
        )
        .bind(new_user.name)
        .bind(new_user.email)
        .fetch_one(pool)
        .await
        .context("Failed to create user")
    }

    #[inline]
    pub async fn get_by_id<'e, E: SqliteExecutor<'e>>(executor: E, id: i64) -> Result<Option<User>> {
        sqlx::query_as::<_, User>("SELECT id, name, email, created_at FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(executor)
            .await
            .context("Failed to get user by id")
    }

    #[inline]
    pub async fn get_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
        sqlx::query_as::<_, User>("SELECT id, name, email, created_at FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(pool)
            .await
            .context("Failed to get user by email")
    }
}

pub struct CourseQueries;

impl CourseQueries {
    #[inline]
    pub async fn create(pool: &SqlitePool, new_course: NewCourse) -> Result<Course> {
        sqlx::query_as::<_, Course>(
            "INSERT INTO courses (user_id, title, description) VALUES (?, ?, ?) \
             RETURNING id, user_id, title, description, created_at",
        )
        .bind(new_course.user_id)
        .bind(new_course.title)
        .bind(new_course.description)
        .fetch_one(pool)
        .await
        .context("Failed to create course")
    }

    #[inline]
    pub async fn get_by_id<'e, E: SqliteExecutor<'e>>(
        executor: E,
        id: i64,
    ) -> Result<Option<Course>> {
        sqlx::query_as::<_, Course>(
            "SELECT id, user_id, title, description, created_at FROM courses WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(executor)
        .await
        .context("Failed to get course by id")
    }

    #[inline]
    pub async fn list_by_user(pool: &SqlitePool, user_id: i64) -> Result<Vec<Course>> {
        sqlx::query_as::<_, Course>(
            "SELECT id, user_id, title, description, created_at FROM courses \
             WHERE user_id = ? ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
        .context("Failed to list courses")
    }
}

pub struct TopicQueries;

impl TopicQueries {
    #[inline]
    pub async fn create(pool: &SqlitePool, new_topic: NewTopic) -> Result<Topic> {
        sqlx::query_as::<_, Topic>(
            "INSERT INTO topics (course_id, name, description) VALUES (?, ?, ?) \
             RETURNING id, course_id, name, description",
        )
        .bind(new_topic.course_id)
        .bind(new_topic.name)
        .bind(new_topic.description)
        .fetch_one(pool)
        .await
        .context("Failed to create topic")
    }

    #[inline]
    pub async fn get_by_id<'e, E: SqliteExecutor<'e>>(executor: E, id: i64) -> Result<Option<Topic>> {
        sqlx::query_as::<_, Topic>("SELECT id, course_id, name, description FROM topics WHERE id = ?")
            .bind(id)
            .fetch_optional(executor)
            .await
            .context("Failed to get topic by id")
    }

    #[inline]
    pub async fn list_by_course(pool: &SqlitePool, course_id: i64) -> Result<Vec<Topic>> {
        sqlx::query_as::<_, Topic>(
            "SELECT id, course_id, name, description FROM topics WHERE course_id = ? ORDER BY id",
        )
        .bind(course_id)
        .fetch_all(pool)
        .await
        .context("Failed to list topics")
    }
}

pub struct DocumentQueries;

impl DocumentQueries {
    /// Insert a document in the `pending` state
    #[inline]
    pub async fn create(pool: &SqlitePool, new_document: NewDocument) -> Result<Document> {
        sqlx::query_as::<_, Document>(&format!(
            "INSERT INTO documents (course_id, title, file_type, extracted_text, page_count, processing_status) \
             VALUES (?, ?, ?, ?, ?, 'pending') RETURNING {DOCUMENT_COLUMNS}"
        ))
        .bind(new_document.course_id)
        .bind(new_document.title)
        .bind(new_document.file_type)
        .bind(new_document.extracted_text)
        .bind(new_document.page_count)
        .fetch_one(pool)
        .await
        .context("Failed to create document")
    }

    #[inline]
    pub async fn get_by_id<'e, E: SqliteExecutor<'e>>(
        executor: E,
        id: i64,
    ) -> Result<Option<Document>> {
        sqlx::query_as::<_, Document>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await
        .context("Failed to get document by id")
    }

    #[inline]
    pub async fn list_by_course(pool: &SqlitePool, course_id: i64) -> Result<Vec<Document>> {
        sqlx::query_as::<_, Document>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE course_id = ? ORDER BY id"
        ))
        .bind(course_id)
        .fetch_all(pool)
        .await
        .context("Failed to list documents")
    }

    #[inline]
    pub async fn mark_completed<'e, E: SqliteExecutor<'e>>(
        executor: E,
        id: i64,
        page_count: i64,
        processed_at: NaiveDateTime,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE documents SET processing_status = 'completed', page_count = ?, \
             processed_at = ?, error_message = NULL WHERE id = ?",
        )
        .bind(page_count)
        .bind(processed_at)
        .bind(id)
        .execute(executor)
        .await
        .context("Failed to mark document completed")?;

        Ok(())
    }

    #[inline]
    pub async fn mark_failed(pool: &SqlitePool, id: i64, error_message: &str) -> Result<()> {
        sqlx::query(
            "UPDATE documents SET processing_status = 'failed', error_message = ? WHERE id = ?",
        )
        .bind(error_message)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to mark document failed")?;

        Ok(())
    }

    #[inline]
    pub async fn reset_to_pending(pool: &SqlitePool, id: i64) -> Result<()> {
        sqlx::query(
            "UPDATE documents SET processing_status = 'pending', error_message = NULL WHERE id = ?",
        )
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to reset document status")?;

        Ok(())
    }

    #[inline]
    pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await
            .context("Failed to delete document")?;

        Ok(result.rows_affected() > 0)
    }
}

pub struct ChunkQueries;

impl ChunkQueries {
    /// Chunks of a document ordered by `chunk_index`
    #[inline]
    pub async fn list_by_document<'e, E: SqliteExecutor<'e>>(
        executor: E,
        document_id: i64,
    ) -> Result<Vec<DocumentChunk>> {
        let rows = sqlx::query_as::<_, DocumentChunkRow>(&format!(
            "SELECT {CHUNK_COLUMNS} FROM document_chunks WHERE document_id = ? ORDER BY chunk_index"
        ))
        .bind(document_id)
        .fetch_all(executor)
        .await
        .context("Failed to list document chunks")?;

        Ok(rows.into_iter().map(DocumentChunk::from).collect())
    }

    /// Delete every chunk of the document and insert the new set
    #[inline]
    pub async fn replace_for_document(
        conn: &mut SqliteConnection,
        document_id: i64,
        chunks: &[NewDocumentChunk],
    ) -> Result<Vec<DocumentChunk>> {
        let removed = sqlx::query("DELETE FROM document_chunks WHERE document_id = ?")
            .bind(document_id)
            .execute(&mut *conn)
            .await
            .context("Failed to delete previous chunks")?
            .rows_affected();
        if removed > 0 {
            debug!("Removed {} previous chunks of document {}", removed, document_id);
        }

        let mut created = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let row = sqlx::query_as::<_, DocumentChunkRow>(&format!(
                "INSERT INTO document_chunks (document_id, chunk_index, content, page_number, embedding, token_count) \
                 VALUES (?, ?, ?, ?, ?, ?) RETURNING {CHUNK_COLUMNS}"
            ))
            .bind(document_id)
            .bind(chunk.chunk_index)
            .bind(&chunk.content)
            .bind(chunk.page_number)
            .bind(chunk.embedding.as_deref().map(encode_embedding))
            .bind(chunk.token_count)
            .fetch_one(&mut *conn)
            .await
            .with_context(|| format!("Failed to insert chunk {}", chunk.chunk_index))?;
            created.push(DocumentChunk::from(row));
        }

        Ok(created)
    }

    #[inline]
    pub async fn count_by_document(pool: &SqlitePool, document_id: i64) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM document_chunks WHERE document_id = ?")
            .bind(document_id)
            .fetch_one(pool)
            .await
            .context("Failed to count document chunks")
    }
}

pub struct ChatQueries;

impl ChatQueries {
    #[inline]
    pub async fn create_session(
        pool: &SqlitePool,
        new_session: NewChatSession,
    ) -> Result<ChatSession> {
        sqlx::query_as::<_, ChatSession>(&format!(
            "INSERT INTO chat_sessions (user_id, course_id, document_id, title) VALUES (?, ?, ?, ?) \
             RETURNING {SESSION_COLUMNS}"
        ))
        .bind(new_session.user_id)
        .bind(new_session.course_id)
        .bind(new_session.document_id)
        .bind(new_session.title)
        .fetch_one(pool)
        .await
        .context("Failed to create chat session")
    }

    #[inline]
    pub async fn get_session<'e, E: SqliteExecutor<'e>>(
        executor: E,
        id: i64,
    ) -> Result<Option<ChatSession>> {
        sqlx::query_as::<_, ChatSession>(&format!(
            "SELECT {SESSION_COLUMNS} FROM chat_sessions WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await
        .context("Failed to get chat session")
    }

    #[inline]
    pub async fn add_message<'e, E: SqliteExecutor<'e>>(
        executor: E,
        session_id: i64,
        role: MessageRole,
        content: &str,
        created_at: NaiveDateTime,
    ) -> Result<ChatMessage> {
        sqlx::query_as::<_, ChatMessage>(
            "INSERT INTO chat_messages (session_id, role, content, created_at) VALUES (?, ?, ?, ?) \
             RETURNING id, session_id, role, content, created_at",
        )
        .bind(session_id)
        .bind(role)
        .bind(content)
        .bind(created_at)
        .fetch_one(executor)
        .await
        .context("Failed to add chat message")
    }

    #[inline]
    pub async fn list_messages(pool: &SqlitePool, session_id: i64) -> Result<Vec<ChatMessage>> {
        sqlx::query_as::<_, ChatMessage>(
            "SELECT id, session_id, role, content, created_at FROM chat_messages \
             WHERE session_id = ? ORDER BY id",
        )
        .bind(session_id)
        .fetch_all(pool)
        .await
        .context("Failed to list chat messages")
    }

    #[inline]
    pub async fn touch_session<'e, E: SqliteExecutor<'e>>(
        executor: E,
        session_id: i64,
        at: NaiveDateTime,
    ) -> Result<()> {
        sqlx::query("UPDATE chat_sessions SET last_message_at = ? WHERE id = ?")
            .bind(at)
            .bind(session_id)
            .execute(executor)
            .await
            .context("Failed to update session timestamp")?;

        Ok(())
    }
}

pub struct CitationQueries;

impl CitationQueries {
    #[inline]
    pub async fn create_batch(
        conn: &mut SqliteConnection,
        message_id: i64,
        citations: &[NewCitation],
    ) -> Result<Vec<Citation>> {
        let mut created = Vec::with_capacity(citations.len());
        for citation in citations {
            let row = sqlx::query_as::<_, Citation>(
                "INSERT INTO message_citations (message_id, document_id, chunk_id, page_number, quote_text, relevance_score) \
                 VALUES (?, ?, ?, ?, ?, ?) \
                 RETURNING id, message_id, document_id, chunk_id, page_number, quote_text, relevance_score",
            )
            .bind(message_id)
            .bind(citation.document_id)
            .bind(citation.chunk_id)
            .bind(citation.page_number)
            .bind(&citation.quote_text)
            .bind(citation.relevance_score)
            .fetch_one(&mut *conn)
            .await
            .context("Failed to insert citation")?;
            created.push(row);
        }

        Ok(created)
    }

    #[inline]
    pub async fn list_by_message(pool: &SqlitePool, message_id: i64) -> Result<Vec<Citation>> {
        sqlx::query_as::<_, Citation>(
            "SELECT id, message_id, document_id, chunk_id, page_number, quote_text, relevance_score \
             FROM message_citations WHERE message_id = ? ORDER BY id",
        )
        .bind(message_id)
        .fetch_all(pool)
        .await
        .context("Failed to list citations")
    }
}

pub struct QuestionQueries;

impl QuestionQueries {
    /// Insert a question and its options; rejects questions that break
    /// [`NewQuestion::validate`]
    #[inline]
    pub async fn create(
        conn: &mut SqliteConnection,
        new_question: NewQuestion,
    ) -> Result<(QuestionRecord, Vec<QuestionOption>)> {
        if let Err(reason) = new_question.validate() {
            warn!("Rejected question: {}", reason);
            return Err(StudyError::invalid_input(format!("Invalid question: {}", reason)).into());
        }

        let question = sqlx::query_as::<_, QuestionRecord>(&format!(
            "INSERT INTO questions (course_id, topic_id, document_id, question_type, question_text, explanation, points, generated_by_ai) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING {QUESTION_COLUMNS}"
        ))
        .bind(new_question.course_id)
        .bind(new_question.topic_id)
        .bind(new_question.document_id)
        .bind(new_question.question_type)
        .bind(&new_question.question_text)
        .bind(&new_question.explanation)
        .bind(new_question.points)
        .bind(new_question.generated_by_ai)
        .fetch_one(&mut *conn)
        .await
        .context("Failed to create question")?;

        let mut options = Vec::with_capacity(new_question.options.len());
        for (order_index, option) in new_question.options.iter().enumerate() {
            let created = sqlx::query_as::<_, QuestionOption>(
                "INSERT INTO question_options (question_id, option_text, is_correct, order_index) \
                 VALUES (?, ?, ?, ?) RETURNING id, question_id, option_text, is_correct, order_index",
            )
            .bind(question.id)
            .bind(&option.option_text)
            .bind(option.is_correct)
            .bind(order_index as i64)
            .fetch_one(&mut *conn)
            .await
            .context("Failed to create question option")?;
            options.push(created);
        }

        Ok((question, options))
    }

    #[inline]
    pub async fn get_by_id<'e, E: SqliteExecutor<'e>>(
        executor: E,
        id: i64,
    ) -> Result<Option<QuestionRecord>> {
        sqlx::query_as::<_, QuestionRecord>(&format!(
            "SELECT {QUESTION_COLUMNS} FROM questions WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await
        .context("Failed to get question by id")
    }

    #[inline]
    pub async fn options_for<'e, E: SqliteExecutor<'e>>(
        executor: E,
        question_id: i64,
    ) -> Result<Vec<QuestionOption>> {
        sqlx::query_as::<_, QuestionOption>(
            "SELECT id, question_id, option_text, is_correct, order_index FROM question_options \
             WHERE question_id = ? ORDER BY order_index",
        )
        .bind(question_id)
        .fetch_all(executor)
        .await
        .context("Failed to list question options")
    }
}

pub struct QuizQueries;

impl QuizQueries {
    #[inline]
    pub async fn create<'e, E: SqliteExecutor<'e>>(executor: E, new_quiz: NewQuiz) -> Result<Quiz> {
        sqlx::query_as::<_, Quiz>(&format!(
            "INSERT INTO quizzes (course_id, topic_id, created_by, title, description, time_limit_minutes, passing_score, is_published) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING {QUIZ_COLUMNS}"
        ))
        .bind(new_quiz.course_id)
        .bind(new_quiz.topic_id)
        .bind(new_quiz.created_by)
        .bind(new_quiz.title)
        .bind(new_quiz.description)
        .bind(new_quiz.time_limit_minutes)
        .bind(new_quiz.passing_score)
        .bind(new_quiz.is_published)
        .fetch_one(executor)
        .await
        .context("Failed to create quiz")
    }

    #[inline]
    pub async fn get_by_id<'e, E: SqliteExecutor<'e>>(executor: E, id: i64) -> Result<Option<Quiz>> {
        sqlx::query_as::<_, Quiz>(&format!("SELECT {QUIZ_COLUMNS} FROM quizzes WHERE id = ?"))
            .bind(id)
            .fetch_optional(executor)
            .await
            .context("Failed to get quiz by id")
    }

    #[inline]
    pub async fn add_question<'e, E: SqliteExecutor<'e>>(
        executor: E,
        quiz_id: i64,
        question_id: i64,
        order_index: i64,
        points_override: Option<f64>,
    ) -> Result<QuizQuestion> {
        sqlx::query_as::<_, QuizQuestion>(
            "INSERT INTO quiz_questions (quiz_id, question_id, order_index, points_override) \
             VALUES (?, ?, ?, ?) RETURNING id, quiz_id, question_id, order_index, points_override",
        )
        .bind(quiz_id)
        .bind(question_id)
        .bind(order_index)
        .bind(points_override)
        .fetch_one(executor)
        .await
        .context("Failed to add question to quiz")
    }

    /// Questions of a quiz in `order_index` order, with their options
    #[inline]
    pub async fn list_items(pool: &SqlitePool, quiz_id: i64) -> Result<Vec<QuizItem>> {
        let links = sqlx::query_as::<_, QuizQuestion>(
            "SELECT id, quiz_id, question_id, order_index, points_override FROM quiz_questions \
             WHERE quiz_id = ? ORDER BY order_index, id",
        )
        .bind(quiz_id)
        .fetch_all(pool)
        .await
        .context("Failed to list quiz questions")?;

        let mut items = Vec::with_capacity(links.len());
        for link in links {
            let question = QuestionQueries::get_by_id(pool, link.question_id)
                .await?
                .with_context(|| format!("Quiz question {} is missing", link.question_id))?;
            let options = QuestionQueries::options_for(pool, link.question_id).await?;
            items.push(QuizItem {
                link,
                question,
                options,
            });
        }

        Ok(items)
    }
}

pub struct AttemptQueries;

impl AttemptQueries {
    #[inline]
    pub async fn create(
        pool: &SqlitePool,
        quiz_id: i64,
        user_id: i64,
        total_points: f64,
        started_at: NaiveDateTime,
    ) -> Result<QuizAttempt> {
        sqlx::query_as::<_, QuizAttempt>(&format!(
            "INSERT INTO quiz_attempts (quiz_id, user_id, status, total_points, started_at) \
             VALUES (?, ?, 'in_progress', ?, ?) RETURNING {ATTEMPT_COLUMNS}"
        ))
        .bind(quiz_id)
        .bind(user_id)
        .bind(total_points)
        .bind(started_at)
        .fetch_one(pool)
        .await
        .context("Failed to create quiz attempt")
    }

    #[inline]
    pub async fn get_by_id<'e, E: SqliteExecutor<'e>>(
        executor: E,
        id: i64,
    ) -> Result<Option<QuizAttempt>> {
        sqlx::query_as::<_, QuizAttempt>(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM quiz_attempts WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await
        .context("Failed to get quiz attempt")
    }

    #[inline]
    pub async fn list_by_user(pool: &SqlitePool, user_id: i64) -> Result<Vec<QuizAttempt>> {
        sqlx::query_as::<_, QuizAttempt>(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM quiz_attempts WHERE user_id = ? ORDER BY id"
        ))
        .bind(user_id)
        .fetch_all(pool)
        .await
        .context("Failed to list quiz attempts")
    }

    /// Move an attempt from `in_progress` to `completed`; returns `false`
    /// when the attempt was no longer in progress
    #[inline]
    pub async fn complete<'e, E: SqliteExecutor<'e>>(
        executor: E,
        id: i64,
        completion: AttemptCompletion,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE quiz_attempts SET status = 'completed', score = ?, percentage = ?, \
             submitted_at = ?, time_spent_seconds = ? WHERE id = ? AND status = 'in_progress'",
        )
        .bind(completion.score)
        .bind(completion.percentage)
        .bind(completion.submitted_at)
        .bind(completion.time_spent_seconds)
        .bind(id)
        .execute(executor)
        .await
        .context("Failed to complete quiz attempt")?;

        Ok(result.rows_affected() == 1)
    }

    #[inline]
    pub async fn insert_answers(
        conn: &mut SqliteConnection,
        attempt_id: i64,
        answers: &[NewQuizAnswer],
        answered_at: NaiveDateTime,
    ) -> Result<Vec<QuizAnswer>> {
        let mut created = Vec::with_capacity(answers.len());
        for answer in answers {
            let row = sqlx::query_as::<_, QuizAnswer>(&format!(
                "INSERT INTO quiz_answers (attempt_id, question_id, selected_option_id, text_answer, is_correct, points_earned, ai_feedback, answered_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING {ANSWER_COLUMNS}"
            ))
            .bind(attempt_id)
            .bind(answer.question_id)
            .bind(answer.selected_option_id)
            .bind(&answer.text_answer)
            .bind(answer.is_correct)
            .bind(answer.points_earned)
            .bind(&answer.ai_feedback)
            .bind(answered_at)
            .fetch_one(&mut *conn)
            .await
            .with_context(|| format!("Failed to store answer for question {}", answer.question_id))?;
            created.push(row);
        }

        Ok(created)
    }

    #[inline]
    pub async fn answers_for(pool: &SqlitePool, attempt_id: i64) -> Result<Vec<QuizAnswer>> {
        sqlx::query_as::<_, QuizAnswer>(&format!(
            "SELECT {ANSWER_COLUMNS} FROM quiz_answers WHERE attempt_id = ? ORDER BY id"
        ))
        .bind(attempt_id)
        .fetch_all(pool)
        .await
        .context("Failed to list quiz answers")
    }
}
