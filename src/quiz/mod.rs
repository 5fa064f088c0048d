// Quiz module
// Attempt lifecycle (start, submit, inspect) and AI quiz generation


use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::database::sqlite::Database;
use crate::database::sqlite::models::{
    AttemptCompletion, NewQuestion, NewQuestionOption, NewQuiz, Quiz, QuizAnswer, QuizAttempt,
    QuizItem,
};
use crate::database::sqlite::queries::{
    AttemptQueries, CourseQueries, DocumentQueries, QuestionQueries, QuizQueries, TopicQueries,
    UserQueries,
};
use crate::grading::{
    GradableQuestion, GradingConfig, GradingEngine, QuestionType, SubmittedAnswer,
    effective_points, score_attempt,
};
use crate::llm::response::json_array;
use crate::llm::{AnswerGenerator, GenerationParams, prompts};
use crate::{Result, StudyError};

pub const DEFAULT_QUESTION_COUNT: u32 = 5;
const GENERATED_TIME_LIMIT_MINUTES: i64 = 30;
const GENERATED_PASSING_SCORE: f64 = 70.0;
const GENERATED_QUESTION_POINTS: f64 = 10.0;
const GENERATED_DESCRIPTION: &str = "AI-generated quiz";

/// An attempt together with its graded answers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptDetails {
    pub attempt: QuizAttempt,
    pub answers: Vec<QuizAnswer>,
}

/// Parameters for generating a quiz from a document or topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizGenerationRequest {
    pub course_id: i64,
    pub topic_id: Option<i64>,
    /// Takes precedence over the topic as the content source
    pub document_id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub question_count: u32,
    pub question_type: QuestionType,
    pub created_by: i64,
}

impl QuizGenerationRequest {
    #[inline]
    pub fn new(course_id: i64, created_by: i64, title: impl Into<String>) -> Self {
        Self {
            course_id,
            topic_id: None,
            document_id: None,
            title: title.into(),
            description: None,
            question_count: DEFAULT_QUESTION_COUNT,
            question_type: QuestionType::MultipleChoice,
            created_by,
        }
    }
}

/// A freshly generated quiz and its questions
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedQuiz {
    pub quiz: Quiz,
    pub items: Vec<QuizItem>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeneratedQuestion {
    question_text: String,
    #[serde(default)]
    options: Option<Vec<String>>,
    #[serde(default)]
    correct_answer: Option<CorrectAnswer>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
enum CorrectAnswer {
    Index(u64),
    Text(String),
}

impl CorrectAnswer {
    fn as_text(&self) -> String {
        match self {
            CorrectAnswer::Index(index) => index.to_string(),
            CorrectAnswer::Text(text) => text.clone(),
        }
    }
}

pub struct QuizService {
    database: Database,
    generator: Arc<dyn AnswerGenerator>,
    grading: GradingConfig,
}

impl QuizService {
    #[inline]
    pub fn new(
        database: Database,
        generator: Arc<dyn AnswerGenerator>,
        grading: GradingConfig,
    ) -> Self {
        Self {
            database,
            generator,
            grading,
        }
    }

    /// Open an attempt, snapshotting the quiz's total effective points
    pub async fn start_attempt(&self, quiz_id: i64, user_id: i64) -> Result<QuizAttempt> {
        let pool = self.database.pool();

        let quiz = QuizQueries::get_by_id(pool, quiz_id)
            .await?
            .ok_or_else(|| StudyError::invalid_input(format!("Unknown quiz {}", quiz_id)))?;
        if UserQueries::get_by_id(pool, user_id).await?.is_none() {
            return Err(StudyError::invalid_input(format!("Unknown user {}", user_id)));
        }

        let items = QuizQueries::list_items(pool, quiz.id).await?;
        let total_points: f64 = items
            .iter()
            .map(|item| effective_points(item.question.points, item.link.points_override))
            .sum();

        let attempt =
            AttemptQueries::create(pool, quiz.id, user_id, total_points, Utc::now().naive_utc())
                .await?;
        info!(
            "Started attempt {} on quiz {} worth {} points",
            attempt.id, quiz.id, total_points
        );
        Ok(attempt)
    }

    /// Grade and complete an in-progress attempt.
    ///
    /// Answers must each target a distinct question of the attempt's quiz.
    /// A concurrent submission that completes first wins; this call then
    /// fails with [`StudyError::AttemptNotInProgress`].
    pub async fn submit_attempt(
        &self,
        attempt_id: i64,
        answers: &[SubmittedAnswer],
    ) -> Result<AttemptDetails> {
        let pool = self.database.pool();

        let attempt = AttemptQueries::get_by_id(pool, attempt_id)
            .await?
            .ok_or_else(|| StudyError::invalid_input(format!("Unknown attempt {}", attempt_id)))?;
        if !attempt.is_in_progress() {
            return Err(StudyError::AttemptNotInProgress(attempt.id));
        }

        let items = QuizQueries::list_items(pool, attempt.quiz_id).await?;
        let questions = validate_submission(&items, answers)?;

        let engine = GradingEngine::new(self.generator.as_ref(), &self.grading);
        let mut graded = Vec::with_capacity(answers.len());
        for answer in answers {
            let question = questions
                .get(&answer.question_id)
                .ok_or_else(|| {
                    StudyError::invalid_input(format!("Unknown question {}", answer.question_id))
                })?;
            graded.push(engine.grade(question, answer).await);
        }

        let submitted_at = Utc::now().naive_utc();
        let score = score_attempt(
            graded.iter().map(|answer| answer.points_earned),
            attempt.total_points,
            attempt.started_at,
            submitted_at,
        );

        let mut tx = pool
            .begin()
            .await
            .context("Failed to begin transaction for attempt submission")?;

        let completed = AttemptQueries::complete(
            &mut *tx,
            attempt.id,
            AttemptCompletion {
                score: score.score,
                percentage: score.percentage,
                submitted_at,
                time_spent_seconds: score.time_spent_seconds,
            },
        )
        .await?;
        if !completed {
            tx.rollback()
                .await
                .context("Failed to roll back attempt submission")?;
            warn!("Attempt {} was completed concurrently", attempt.id);
            return Err(StudyError::AttemptNotInProgress(attempt.id));
        }

        let stored = AttemptQueries::insert_answers(&mut tx, attempt.id, &graded, submitted_at).await?;

        tx.commit()
            .await
            .context("Failed to commit attempt submission")?;

        info!(
            "Attempt {} completed: {} points ({:.1}%) in {}s",
            attempt.id, score.score, score.percentage, score.time_spent_seconds
        );

        let attempt = self.load_attempt(attempt.id).await?;
        Ok(AttemptDetails {
            attempt,
            answers: stored,
        })
    }

    pub async fn get_attempt(&self, attempt_id: i64) -> Result<AttemptDetails> {
        let attempt = self.load_attempt(attempt_id).await?;
        let answers = AttemptQueries::answers_for(self.database.pool(), attempt.id).await?;
        Ok(AttemptDetails { attempt, answers })
    }

    /// Ask the generator for questions about a document or topic and store
    /// them as a new unpublished quiz
    pub async fn generate_quiz(&self, request: QuizGenerationRequest) -> Result<GeneratedQuiz> {
        let pool = self.database.pool();

        if CourseQueries::get_by_id(pool, request.course_id)
            .await?
            .is_none()
        {
            return Err(StudyError::invalid_input(format!(
                "Unknown course {}",
                request.course_id
            )));
        }
        if UserQueries::get_by_id(pool, request.created_by)
            .await?
            .is_none()
        {
            return Err(StudyError::invalid_input(format!(
                "Unknown user {}",
                request.created_by
            )));
        }
        if request.question_count == 0 {
            return Err(StudyError::invalid_input("Question count must be positive"));
        }

        let content = self.generation_content(&request).await?;
        let prompt = prompts::generate_questions(
            &content,
            &request.title,
            request.question_count,
            request.question_type,
        );

        let response = self
            .generator
            .generate(&prompt, GenerationParams::default())
            .await
            .map_err(|e| {
                error!("Quiz generation failed: {}", e);
                StudyError::Upstream(e)
            })?;

        let generated = parse_generated_questions(&response, request.question_type)?;
        debug!("Model produced {} questions", generated.len());

        let mut tx = pool
            .begin()
            .await
            .context("Failed to begin transaction for generated quiz")?;

        let quiz = QuizQueries::create(
            &mut *tx,
            NewQuiz {
                course_id: request.course_id,
                topic_id: request.topic_id,
                created_by: request.created_by,
                title: request.title.clone(),
                description: Some(
                    request
                        .description
                        .clone()
                        .unwrap_or_else(|| GENERATED_DESCRIPTION.to_string()),
                ),
                time_limit_minutes: Some(GENERATED_TIME_LIMIT_MINUTES),
                passing_score: Some(GENERATED_PASSING_SCORE),
                is_published: false,
            },
        )
        .await?;

        let mut items = Vec::with_capacity(generated.len());
        for (order_index, item) in generated.into_iter().enumerate() {
            let new_question = to_new_question(item, &request);
            let (question, options) = QuestionQueries::create(&mut tx, new_question).await?;
            let link =
                QuizQueries::add_question(&mut *tx, quiz.id, question.id, order_index as i64, None)
                    .await?;
            items.push(QuizItem {
                link,
                question,
                options,
            });
        }

        tx.commit()
            .await
            .context("Failed to commit generated quiz")?;

        info!(
            "Generated quiz {} with {} questions",
            quiz.id,
            items.len()
        );
        Ok(GeneratedQuiz { quiz, items })
    }

    async fn generation_content(&self, request: &QuizGenerationRequest) -> Result<String> {
        let pool = self.database.pool();

        if let Some(document_id) = request.document_id {
            let document = DocumentQueries::get_by_id(pool, document_id).await?;
            return document
                .as_ref()
                .and_then(|d| d.text())
                .map(str::to_string)
                .ok_or_else(|| {
                    StudyError::invalid_input(format!(
                        "Document {} not found or has no extracted text",
                        document_id
                    ))
                });
        }

        if let Some(topic_id) = request.topic_id {
            let topic = TopicQueries::get_by_id(pool, topic_id).await?;
            return topic
                .and_then(|t| t.description)
                .filter(|d| !d.is_empty())
                .ok_or_else(|| {
                    StudyError::invalid_input(format!(
                        "Topic {} not found or has no description",
                        topic_id
                    ))
                });
        }

        Err(StudyError::invalid_input(
            "Either a document or a topic is required to generate a quiz",
        ))
    }

    async fn load_attempt(&self, attempt_id: i64) -> Result<QuizAttempt> {
        AttemptQueries::get_by_id(self.database.pool(), attempt_id)
            .await?
            .ok_or_else(|| StudyError::invalid_input(format!("Unknown attempt {}", attempt_id)))
    }
}

/// Check that every answer targets a distinct question of the quiz and
/// picks one of that question's own options
fn validate_submission(
    items: &[QuizItem],
    answers: &[SubmittedAnswer],
) -> Result<HashMap<i64, GradableQuestion>> {
    let by_question: HashMap<i64, &QuizItem> =
        items.iter().map(|item| (item.question.id, item)).collect();

    let mut seen = HashSet::with_capacity(answers.len());
    for answer in answers {
        let Some(item) = by_question.get(&answer.question_id) else {
            return Err(StudyError::invalid_input(format!(
                "Question {} is not part of this quiz",
                answer.question_id
            )));
        };
        if !seen.insert(answer.question_id) {
            return Err(StudyError::invalid_input(format!(
                "Question {} was answered more than once",
                answer.question_id
            )));
        }
        if let Some(option_id) = answer.selected_option_id {
            if !item.options.iter().any(|o| o.id == option_id) {
                return Err(StudyError::invalid_input(format!(
                    "Option {} does not belong to question {}",
                    option_id, answer.question_id
                )));
            }
        }
    }

    Ok(by_question
        .into_iter()
        .map(|(id, item)| (id, GradableQuestion::from_item(item)))
        .collect())
}

fn parse_generated_questions(
    response: &str,
    question_type: QuestionType,
) -> Result<Vec<GeneratedQuestion>> {
    let payload = json_array(response).ok_or_else(|| {
        warn!("Quiz generation response has no JSON array: {}", response);
        StudyError::MalformedResponse("expected a JSON array of questions".to_string())
    })?;

    let questions: Vec<GeneratedQuestion> = serde_json::from_str(payload)
        .map_err(|e| StudyError::MalformedResponse(format!("question list: {}", e)))?;

    if questions.is_empty() {
        return Err(StudyError::MalformedResponse(
            "no questions were generated".to_string(),
        ));
    }

    for (index, question) in questions.iter().enumerate() {
        if question.question_text.trim().is_empty() {
            return Err(StudyError::MalformedResponse(format!(
                "question {} has no text",
                index
            )));
        }
        if question_type == QuestionType::MultipleChoice
            && question.options.as_ref().is_none_or(Vec::is_empty)
        {
            return Err(StudyError::MalformedResponse(format!(
                "multiple choice question {} has no options",
                index
            )));
        }
    }

    Ok(questions)
}

fn to_new_question(generated: GeneratedQuestion, request: &QuizGenerationRequest) -> NewQuestion {
    let (options, explanation) = match request.question_type {
        QuestionType::MultipleChoice => {
            let texts = generated.options.unwrap_or_default();
            let correct_index = generated.correct_answer.as_ref().and_then(|answer| match answer {
                CorrectAnswer::Index(index) => usize::try_from(*index)
                    .ok()
                    .filter(|i| *i < texts.len()),
                CorrectAnswer::Text(text) => texts.iter().position(|option| option == text),
            });
            let options = texts
                .into_iter()
                .enumerate()
                .map(|(index, option_text)| NewQuestionOption {
                    option_text,
                    is_correct: Some(index) == correct_index,
                })
                .collect();
            (options, None)
        }
        QuestionType::ShortAnswer | QuestionType::Essay => (
            Vec::new(),
            generated.correct_answer.as_ref().map(CorrectAnswer::as_text),
        ),
    };

    NewQuestion {
        course_id: Some(request.course_id),
        topic_id: request.topic_id,
        document_id: request.document_id,
        question_type: request.question_type,
        question_text: generated.question_text,
        explanation,
        points: GENERATED_QUESTION_POINTS,
        generated_by_ai: true,
        options,
    }
}
