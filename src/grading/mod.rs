// Grading module
// Scores individual answers: exact match for multiple choice, AI-assisted for free text

pub mod scorer;

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::database::sqlite::models::{NewQuizAnswer, QuestionOption, QuestionRecord, QuizItem};
use crate::llm::response::json_object;
use crate::llm::{AnswerGenerator, GenerationParams, prompts};

pub use crate::database::sqlite::models::QuestionType;
pub use scorer::{AttemptScore, score_attempt};

/// Feedback stored when the AI grading call or its parsing fails
pub const AI_GRADING_FAILURE_FEEDBACK: &str = "Could not grade with AI due to an error.";

pub const DEFAULT_CORRECT_THRESHOLD: u32 = 70;

/// The `[grading]` config section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradingConfig {
    /// Minimum AI score (0-100) for a free-text answer to count as correct
    pub correct_threshold: u32,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GradingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            correct_threshold: DEFAULT_CORRECT_THRESHOLD,
            temperature: 0.2,
            max_tokens: 1024,
        }
    }
}

impl GradingConfig {
    #[inline]
    pub fn params(&self) -> GenerationParams {
        GenerationParams {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

/// A question's grading strategy together with the data it needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionKind {
    /// `None` when no option is flagged correct
    MultipleChoice { correct_option_id: Option<i64> },
    ShortAnswer { explanation: Option<String> },
    Essay { explanation: Option<String> },
}

impl QuestionKind {
    /// The first option flagged correct is the answer key
    #[inline]
    pub fn from_record(question: &QuestionRecord, options: &[QuestionOption]) -> Self {
        match question.question_type {
            QuestionType::MultipleChoice => QuestionKind::MultipleChoice {
                correct_option_id: options.iter().find(|o| o.is_correct).map(|o| o.id),
            },
            QuestionType::ShortAnswer => QuestionKind::ShortAnswer {
                explanation: question.explanation.clone(),
            },
            QuestionType::Essay => QuestionKind::Essay {
                explanation: question.explanation.clone(),
            },
        }
    }

    #[inline]
    pub fn question_type(&self) -> QuestionType {
        match self {
            QuestionKind::MultipleChoice { .. } => QuestionType::MultipleChoice,
            QuestionKind::ShortAnswer { .. } => QuestionType::ShortAnswer,
            QuestionKind::Essay { .. } => QuestionType::Essay,
        }
    }
}

/// Points a question is worth inside a quiz: a positive override wins,
/// otherwise the question's base points
#[inline]
pub fn effective_points(base_points: f64, points_override: Option<f64>) -> f64 {
    match points_override {
        Some(points) if points > 0.0 => points,
        _ => base_points,
    }
}

/// Everything needed to grade one answer to a quiz question
#[derive(Debug, Clone, PartialEq)]
pub struct GradableQuestion {
    pub id: i64,
    pub text: String,
    pub kind: QuestionKind,
    /// Effective points within the quiz
    pub points: f64,
}

impl GradableQuestion {
    #[inline]
    pub fn from_item(item: &QuizItem) -> Self {
        Self {
            id: item.question.id,
            text: item.question.question_text.clone(),
            kind: QuestionKind::from_record(&item.question, &item.options),
            points: effective_points(item.question.points, item.link.points_override),
        }
    }
}

/// A learner's answer to one question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedAnswer {
    pub question_id: i64,
    #[serde(default)]
    pub selected_option_id: Option<i64>,
    #[serde(default)]
    pub text_answer: Option<String>,
}

/// Score and feedback parsed from the grading model
#[derive(Debug, Clone, PartialEq)]
pub struct AiGrade {
    /// Whole number from 0 to 100 inclusive
    pub score: f64,
    pub feedback: Option<String>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GradeParseError {
    #[error("No JSON object in grading response")]
    MissingObject,

    #[error("Invalid JSON in grading response: {0}")]
    InvalidJson(String),

    #[error("Grading response has no numeric score")]
    MissingScore,

    #[error("Score {0} is not a whole number")]
    NonIntegerScore(String),

    #[error("Score {0} is outside 0..=100")]
    ScoreOutOfRange(String),
}

/// Parse `{"score": int, "feedback": string}` out of a model response.
/// Field names match case-insensitively; feedback may be null or absent.
#[inline]
pub fn parse_ai_grade(response: &str) -> Result<AiGrade, GradeParseError> {
    let payload = json_object(response).ok_or(GradeParseError::MissingObject)?;
    let value: Value =
        serde_json::from_str(payload).map_err(|e| GradeParseError::InvalidJson(e.to_string()))?;
    let object = value.as_object().ok_or(GradeParseError::MissingObject)?;

    let field = |name: &str| {
        object
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    };

    let raw_score = field("score")
        .filter(|value| value.is_number())
        .ok_or(GradeParseError::MissingScore)?;
    let score = raw_score
        .as_i64()
        .ok_or_else(|| GradeParseError::NonIntegerScore(raw_score.to_string()))?;
    if !(0..=100).contains(&score) {
        return Err(GradeParseError::ScoreOutOfRange(score.to_string()));
    }
    let score = score as f64;

    let feedback = field("feedback")
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(AiGrade { score, feedback })
}

/// Grades answers against questions, calling the generator for free text
pub struct GradingEngine<'a, G: ?Sized> {
    generator: &'a G,
    config: &'a GradingConfig,
}

impl<'a, G: AnswerGenerator + ?Sized> GradingEngine<'a, G> {
    #[inline]
    pub fn new(generator: &'a G, config: &'a GradingConfig) -> Self {
        Self { generator, config }
    }

    /// Grade one answer. Never fails: AI trouble yields zero credit with
    /// [`AI_GRADING_FAILURE_FEEDBACK`].
    #[inline]
    pub async fn grade(&self, question: &GradableQuestion, answer: &SubmittedAnswer) -> NewQuizAnswer {
        let outcome = match &question.kind {
            QuestionKind::MultipleChoice { correct_option_id } => {
                grade_choice(question.points, *correct_option_id, answer.selected_option_id)
            }
            QuestionKind::ShortAnswer { explanation } | QuestionKind::Essay { explanation } => {
                self.grade_free_text(question, explanation.as_deref(), answer.text_answer.as_deref())
                    .await
            }
        };

        debug!(
            "Graded question {}: {} of {} points",
            question.id, outcome.points_earned, question.points
        );

        NewQuizAnswer {
            question_id: question.id,
            selected_option_id: answer.selected_option_id,
            text_answer: answer.text_answer.clone(),
            is_correct: outcome.is_correct,
            points_earned: outcome.points_earned,
            ai_feedback: outcome.feedback,
        }
    }

    async fn grade_free_text(
        &self,
        question: &GradableQuestion,
        explanation: Option<&str>,
        text_answer: Option<&str>,
    ) -> Outcome {
        let (Some(explanation), Some(text_answer)) = (
            explanation.filter(|e| !e.is_empty()),
            text_answer.filter(|a| !a.is_empty()),
        ) else {
            return Outcome::zero(None);
        };

        let prompt = prompts::grade_answer(&question.text, explanation, text_answer);
        let response = match self.generator.generate(&prompt, self.config.params()).await {
            Ok(response) => response,
            Err(e) => {
                warn!("AI grading failed for question {}: {}", question.id, e);
                return Outcome::zero(Some(AI_GRADING_FAILURE_FEEDBACK.to_string()));
            }
        };

        match parse_ai_grade(&response) {
            Ok(grade) => Outcome {
                is_correct: grade.score >= f64::from(self.config.correct_threshold),
                points_earned: question.points * grade.score / 100.0,
                feedback: grade.feedback,
            },
            Err(e) => {
                warn!(
                    "Unusable AI grading response for question {}: {}",
                    question.id, e
                );
                Outcome::zero(Some(AI_GRADING_FAILURE_FEEDBACK.to_string()))
            }
        }
    }
}

struct Outcome {
    is_correct: bool,
    points_earned: f64,
    feedback: Option<String>,
}

impl Outcome {
    fn zero(feedback: Option<String>) -> Self {
        Self {
            is_correct: false,
            points_earned: 0.0,
            feedback,
        }
    }
}

fn grade_choice(points: f64, correct_option_id: Option<i64>, selected: Option<i64>) -> Outcome {
    let is_correct = matches!((correct_option_id, selected), (Some(correct), Some(chosen)) if correct == chosen);
    Outcome {
        is_correct,
        points_earned: if is_correct { points } else { 0.0 },
        feedback: None,
    }
}
