#[cfg(test)]
mod tests;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Course {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCourse {
    pub user_id: i64,
    pub title: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Topic {
    pub id: i64,
    pub course_id: i64,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTopic {
    pub course_id: i64,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Document {
    pub id: i64,
    pub course_id: i64,
    pub title: String,
    pub file_type: String,
    pub extracted_text: Option<String>,
    pub processing_status: DocumentStatus,
    pub page_count: Option<i64>,
    pub error_message: Option<String>,
    pub uploaded_at: NaiveDateTime,
    pub processed_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Completed,
    Failed,
}

impl std::fmt::Display for DocumentStatus {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            DocumentStatus::Pending => write!(f, "Pending"),
            DocumentStatus::Completed => write!(f, "Completed"),
            DocumentStatus::Failed => write!(f, "Failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDocument {
    pub course_id: i64,
    pub title: String,
    pub file_type: String,
    pub extracted_text: Option<String>,
    pub page_count: Option<i64>,
}

/// A persisted chunk of a document's extracted text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: i64,
    pub document_id: i64,
    /// 0-based position within the document
    pub chunk_index: i64,
    pub content: String,
    pub page_number: i64,
    /// `None` until computed; such chunks are never retrieved
    pub embedding: Option<Vec<f32>>,
    pub token_count: i64,
}

/// Row shape of `document_chunks`, with the vector still encoded
#[derive(Debug, Clone, FromRow)]
pub(crate) struct DocumentChunkRow {
    pub id: i64,
    pub document_id: i64,
    pub chunk_index: i64,
    pub content: String,
    pub page_number: i64,
    pub embedding: Option<Vec<u8>>,
    pub token_count: i64,
}

impl From<DocumentChunkRow> for DocumentChunk {
    #[inline]
    fn from(row: DocumentChunkRow) -> Self {
        Self {
            id: row.id,
            document_id: row.document_id,
            chunk_index: row.chunk_index,
            content: row.content,
            page_number: row.page_number,
            embedding: row.embedding.as_deref().and_then(decode_embedding),
            token_count: row.token_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDocumentChunk {
    pub chunk_index: i64,
    pub content: String,
    pub page_number: i64,
    pub embedding: Option<Vec<f32>>,
    pub token_count: i64,
}

/// Encode a vector as little-endian `f32` bytes
#[inline]
pub fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Decode little-endian `f32` bytes; `None` for empty or misaligned input
#[inline]
pub fn decode_embedding(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.is_empty() || bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect(),
    )
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ChatSession {
    pub id: i64,
    pub user_id: i64,
    pub course_id: Option<i64>,
    pub document_id: Option<i64>,
    pub title: String,
    pub created_at: NaiveDateTime,
    pub last_message_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewChatSession {
    pub user_id: i64,
    pub course_id: Option<i64>,
    pub document_id: Option<i64>,
    pub title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl std::fmt::Display for MessageRole {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ChatMessage {
    pub id: i64,
    pub session_id: i64,
    pub role: MessageRole,
    pub content: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Citation {
    pub id: i64,
    pub message_id: i64,
    pub document_id: i64,
    pub chunk_id: Option<i64>,
    pub page_number: Option<i64>,
    pub quote_text: String,
    pub relevance_score: f64,
}

/// A citation waiting for its assistant message to exist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCitation {
    pub document_id: i64,
    pub chunk_id: Option<i64>,
    pub page_number: Option<i64>,
    pub quote_text: String,
    pub relevance_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    ShortAnswer,
    Essay,
}

impl QuestionType {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionType::MultipleChoice => "multiple_choice",
            QuestionType::ShortAnswer => "short_answer",
            QuestionType::Essay => "essay",
        }
    }
}

impl std::fmt::Display for QuestionType {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for QuestionType {
    type Err = String;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "multiple_choice" => Ok(QuestionType::MultipleChoice),
            "short_answer" => Ok(QuestionType::ShortAnswer),
            "essay" => Ok(QuestionType::Essay),
            other => Err(format!("unknown question type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct QuestionRecord {
    pub id: i64,
    pub course_id: Option<i64>,
    pub topic_id: Option<i64>,
    pub document_id: Option<i64>,
    pub question_type: QuestionType,
    pub question_text: String,
    pub explanation: Option<String>,
    pub points: f64,
    pub generated_by_ai: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct QuestionOption {
    pub id: i64,
    pub question_id: i64,
    pub option_text: String,
    pub is_correct: bool,
    pub order_index: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewQuestion {
    pub course_id: Option<i64>,
    pub topic_id: Option<i64>,
    pub document_id: Option<i64>,
    pub question_type: QuestionType,
    pub question_text: String,
    pub explanation: Option<String>,
    pub points: f64,
    pub generated_by_ai: bool,
    /// Options in display order; only meaningful for multiple choice
    pub options: Vec<NewQuestionOption>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewQuestionOption {
    pub option_text: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Quiz {
    pub id: i64,
    pub course_id: i64,
    pub topic_id: Option<i64>,
    pub created_by: i64,
    pub title: String,
    pub description: Option<String>,
    pub time_limit_minutes: Option<i64>,
    pub passing_score: Option<f64>,
    pub is_published: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewQuiz {
    pub course_id: i64,
    pub topic_id: Option<i64>,
    pub created_by: i64,
    pub title: String,
    pub description: Option<String>,
    pub time_limit_minutes: Option<i64>,
    pub passing_score: Option<f64>,
    pub is_published: bool,
}

/// Association of a question with a quiz
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct QuizQuestion {
    pub id: i64,
    pub quiz_id: i64,
    pub question_id: i64,
    pub order_index: i64,
    pub points_override: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    InProgress,
    Completed,
}

impl std::fmt::Display for AttemptStatus {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            AttemptStatus::InProgress => write!(f, "In progress"),
            AttemptStatus::Completed => write!(f, "Completed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct QuizAttempt {
    pub id: i64,
    pub quiz_id: i64,
    pub user_id: i64,
    pub status: AttemptStatus,
    /// Sum of effective question points when the attempt started
    pub total_points: f64,
    pub score: f64,
    pub percentage: f64,
    pub started_at: NaiveDateTime,
    pub submitted_at: Option<NaiveDateTime>,
    pub time_spent_seconds: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct QuizAnswer {
    pub id: i64,
    pub attempt_id: i64,
    pub question_id: i64,
    pub selected_option_id: Option<i64>,
    pub text_answer: Option<String>,
    pub is_correct: bool,
    pub points_earned: f64,
    pub ai_feedback: Option<String>,
    pub answered_at: NaiveDateTime,
}

/// A graded answer ready to be stored against an attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewQuizAnswer {
    pub question_id: i64,
    pub selected_option_id: Option<i64>,
    pub text_answer: Option<String>,
    pub is_correct: bool,
    pub points_earned: f64,
    pub ai_feedback: Option<String>,
}

/// Final figures written when an attempt completes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttemptCompletion {
    pub score: f64,
    pub percentage: f64,
    pub submitted_at: NaiveDateTime,
    pub time_spent_seconds: i64,
}

impl Document {
    #[inline]
    pub fn is_completed(&self) -> bool {
        self.processing_status == DocumentStatus::Completed
    }

    #[inline]
    pub fn is_failed(&self) -> bool {
        self.processing_status == DocumentStatus::Failed
    }

    /// Extracted text, or `None` when absent or empty
    #[inline]
    pub fn text(&self) -> Option<&str> {
        self.extracted_text.as_deref().filter(|t| !t.is_empty())
    }
}

impl QuizAttempt {
    #[inline]
    pub fn is_in_progress(&self) -> bool {
        self.status == AttemptStatus::InProgress
    }
}

impl NewQuestion {
    /// Authoring rules: multiple choice needs options with at most one
    /// correct; free-text kinds carry no options
    #[inline]
    pub fn validate(&self) -> Result<(), String> {
        match self.question_type {
            QuestionType::MultipleChoice => {
                if self.options.is_empty() {
                    return Err("multiple choice question has no options".to_string());
                }
                let correct = self.options.iter().filter(|o| o.is_correct).count();
                if correct > 1 {
                    return Err(format!(
                        "multiple choice question has {} correct options",
                        correct
                    ));
                }
            }
            QuestionType::ShortAnswer | QuestionType::Essay => {
                if !self.options.is_empty() {
                    return Err(format!("{} question cannot have options", self.question_type));
                }
            }
        }
        if self.question_text.trim().is_empty() {
            return Err("question text is empty".to_string());
        }
        Ok(())
    }
}

/// A question as it appears in a quiz, with its options in display order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizItem {
    pub link: QuizQuestion,
    pub question: QuestionRecord,
    pub options: Vec<QuestionOption>,
}
