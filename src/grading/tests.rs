use super::*;
use crate::llm::UpstreamError;
use async_trait::async_trait;
use std::sync::Mutex;

/// Replies with a canned response and records the prompts it saw
struct ScriptedGenerator {
    reply: Result<String, UpstreamError>,
    prompts: Mutex<Vec<(String, GenerationParams)>>,
}

impl ScriptedGenerator {
    fn replying(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn failing() -> Self {
        Self {
            reply: Err(UpstreamError::Status(503)),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.prompts.lock().expect("lock poisoned").len()
    }
}

#[async_trait]
impl AnswerGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        prompt: &str,
        params: GenerationParams,
    ) -> Result<String, UpstreamError> {
        self.prompts
            .lock()
            .expect("lock poisoned")
            .push((prompt.to_string(), params));
        self.reply.clone()
    }
}

fn multiple_choice(points: f64, correct_option_id: Option<i64>) -> GradableQuestion {
    GradableQuestion {
        id: 1,
        text: "Which organelle produces ATP?".to_string(),
        kind: QuestionKind::MultipleChoice { correct_option_id },
        points,
    }
}

fn short_answer(points: f64, explanation: Option<&str>) -> GradableQuestion {
    GradableQuestion {
        id: 2,
        text: "Define osmosis".to_string(),
        kind: QuestionKind::ShortAnswer {
            explanation: explanation.map(str::to_string),
        },
        points,
    }
}

fn text_answer(question_id: i64, text: &str) -> SubmittedAnswer {
    SubmittedAnswer {
        question_id,
        selected_option_id: None,
        text_answer: Some(text.to_string()),
    }
}

fn choice_answer(option_id: Option<i64>) -> SubmittedAnswer {
    SubmittedAnswer {
        question_id: 1,
        selected_option_id: option_id,
        text_answer: None,
    }
}

#[test]
fn effective_points_prefers_positive_override() {
    assert_eq!(effective_points(10.0, None), 10.0);
    assert_eq!(effective_points(10.0, Some(4.0)), 4.0);
    assert_eq!(effective_points(10.0, Some(0.0)), 10.0);
    assert_eq!(effective_points(10.0, Some(-2.0)), 10.0);
}

#[test]
fn parse_plain_grade() {
    let grade = parse_ai_grade(r#"{"score": 80, "feedback": "Good"}"#).expect("parses");
    assert_eq!(grade.score, 80.0);
    assert_eq!(grade.feedback.as_deref(), Some("Good"));
}

#[test]
fn parse_tolerates_wrapping_and_case() {
    let grade = parse_ai_grade("Sure!\n```json\n{\"Score\": 55, \"Feedback\": null}\n```")
        .expect("parses");
    assert_eq!(grade.score, 55.0);
    assert_eq!(grade.feedback, None);

    let without_feedback = parse_ai_grade("Result: {\"score\": 0}").expect("parses");
    assert_eq!(without_feedback.feedback, None);
}

#[test]
fn parse_rejects_bad_payloads() {
    assert_eq!(
        parse_ai_grade("I think it deserves a B"),
        Err(GradeParseError::MissingObject)
    );
    assert_eq!(
        parse_ai_grade(r#"{"feedback": "no score"}"#),
        Err(GradeParseError::MissingScore)
    );
    assert_eq!(
        parse_ai_grade(r#"{"score": "eighty"}"#),
        Err(GradeParseError::MissingScore)
    );
    assert!(matches!(
        parse_ai_grade(r#"{"score": 120}"#),
        Err(GradeParseError::ScoreOutOfRange(_))
    ));
    assert!(matches!(
        parse_ai_grade(r#"{"score": -1}"#),
        Err(GradeParseError::ScoreOutOfRange(_))
    ));
    assert!(matches!(
        parse_ai_grade(r#"{"score": 80,}"#),
        Err(GradeParseError::InvalidJson(_))
    ));
}

#[test]
fn parse_requires_whole_number_score() {
    assert_eq!(
        parse_ai_grade(r#"{"score": 80.5, "feedback": "Close"}"#),
        Err(GradeParseError::NonIntegerScore("80.5".to_string()))
    );
    assert!(matches!(
        parse_ai_grade(r#"{"score": 80.0}"#),
        Err(GradeParseError::NonIntegerScore(_))
    ));
    assert_eq!(
        parse_ai_grade(r#"{"score": 100}"#).map(|grade| grade.score),
        Ok(100.0)
    );
}

#[tokio::test]
async fn fractional_score_gives_zero_with_feedback() {
    let generator = ScriptedGenerator::replying(r#"{"score": 72.5, "feedback": "Good"}"#);
    let config = GradingConfig::default();
    let graded = GradingEngine::new(&generator, &config)
        .grade(&short_answer(10.0, Some("key")), &text_answer(2, "answer"))
        .await;
    assert!(!graded.is_correct);
    assert_eq!(graded.points_earned, 0.0);
    assert_eq!(
        graded.ai_feedback.as_deref(),
        Some(AI_GRADING_FAILURE_FEEDBACK)
    );
}

#[tokio::test]
async fn correct_option_earns_full_points() {
    let generator = ScriptedGenerator::failing();
    let config = GradingConfig::default();
    let engine = GradingEngine::new(&generator, &config);

    let graded = engine
        .grade(&multiple_choice(10.0, Some(7)), &choice_answer(Some(7)))
        .await;
    assert!(graded.is_correct);
    assert_eq!(graded.points_earned, 10.0);
    assert_eq!(graded.ai_feedback, None);

    let wrong = engine
        .grade(&multiple_choice(10.0, Some(7)), &choice_answer(Some(8)))
        .await;
    assert!(!wrong.is_correct);
    assert_eq!(wrong.points_earned, 0.0);

    let unanswered = engine
        .grade(&multiple_choice(10.0, Some(7)), &choice_answer(None))
        .await;
    assert!(!unanswered.is_correct);

    let no_key = engine
        .grade(&multiple_choice(10.0, None), &choice_answer(Some(7)))
        .await;
    assert!(!no_key.is_correct);

    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn ai_score_scales_points() {
    let config = GradingConfig::default();

    let generator = ScriptedGenerator::replying(r#"{"score": 80, "feedback": "Nearly"}"#);
    let graded = GradingEngine::new(&generator, &config)
        .grade(
            &short_answer(10.0, Some("Diffusion of water")),
            &text_answer(2, "Water moving"),
        )
        .await;
    assert!(graded.is_correct);
    assert!((graded.points_earned - 8.0).abs() < 1e-9);
    assert_eq!(graded.ai_feedback.as_deref(), Some("Nearly"));

    let prompts = generator.prompts.lock().expect("lock poisoned");
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].0.contains("Student Answer: \"Water moving\""));
    assert_eq!(prompts[0].1.temperature, 0.2);
    drop(prompts);

    let generator = ScriptedGenerator::replying(r#"{"score": 60, "feedback": "Partly"}"#);
    let graded = GradingEngine::new(&generator, &config)
        .grade(
            &short_answer(10.0, Some("Diffusion of water")),
            &text_answer(2, "Water"),
        )
        .await;
    assert!(!graded.is_correct);
    assert!((graded.points_earned - 6.0).abs() < 1e-9);
}

#[tokio::test]
async fn threshold_is_inclusive() {
    let generator = ScriptedGenerator::replying(r#"{"score": 70, "feedback": ""}"#);
    let config = GradingConfig::default();
    let graded = GradingEngine::new(&generator, &config)
        .grade(&short_answer(5.0, Some("key")), &text_answer(2, "answer"))
        .await;
    assert!(graded.is_correct);
    assert!((graded.points_earned - 3.5).abs() < 1e-9);
}

#[tokio::test]
async fn ai_failure_gives_zero_with_feedback() {
    let config = GradingConfig::default();

    let generator = ScriptedGenerator::failing();
    let graded = GradingEngine::new(&generator, &config)
        .grade(&short_answer(10.0, Some("key")), &text_answer(2, "answer"))
        .await;
    assert!(!graded.is_correct);
    assert_eq!(graded.points_earned, 0.0);
    assert_eq!(
        graded.ai_feedback.as_deref(),
        Some(AI_GRADING_FAILURE_FEEDBACK)
    );

    let generator = ScriptedGenerator::replying("Great answer, 9/10!");
    let graded = GradingEngine::new(&generator, &config)
        .grade(&short_answer(10.0, Some("key")), &text_answer(2, "answer"))
        .await;
    assert_eq!(graded.points_earned, 0.0);
    assert_eq!(
        graded.ai_feedback.as_deref(),
        Some(AI_GRADING_FAILURE_FEEDBACK)
    );
}

#[tokio::test]
async fn empty_text_skips_ai_call() {
    let generator = ScriptedGenerator::replying(r#"{"score": 100, "feedback": "x"}"#);
    let config = GradingConfig::default();
    let engine = GradingEngine::new(&generator, &config);

    let no_answer = engine
        .grade(&short_answer(10.0, Some("key")), &text_answer(2, ""))
        .await;
    assert_eq!(no_answer.points_earned, 0.0);
    assert!(!no_answer.is_correct);
    assert_eq!(no_answer.ai_feedback, None);

    let no_key = engine
        .grade(&short_answer(10.0, None), &text_answer(2, "answer"))
        .await;
    assert_eq!(no_key.ai_feedback, None);

    let essay = GradableQuestion {
        kind: QuestionKind::Essay {
            explanation: Some(String::new()),
        },
        ..short_answer(10.0, None)
    };
    let graded = engine.grade(&essay, &text_answer(2, "answer")).await;
    assert_eq!(graded.points_earned, 0.0);

    assert_eq!(generator.calls(), 0);
}

#[test]
fn question_kind_from_record_uses_first_correct_option() {
    use chrono::Utc;

    let record = QuestionRecord {
        id: 3,
        course_id: None,
        topic_id: None,
        document_id: None,
        question_type: QuestionType::MultipleChoice,
        question_text: "Pick".to_string(),
        explanation: None,
        points: 10.0,
        generated_by_ai: false,
        created_at: Utc::now().naive_utc(),
    };
    let options = vec![
        QuestionOption {
            id: 20,
            question_id: 3,
            option_text: "A".to_string(),
            is_correct: false,
            order_index: 0,
        },
        QuestionOption {
            id: 21,
            question_id: 3,
            option_text: "B".to_string(),
            is_correct: true,
            order_index: 1,
        },
    ];

    let kind = QuestionKind::from_record(&record, &options);
    assert_eq!(
        kind,
        QuestionKind::MultipleChoice {
            correct_option_id: Some(21)
        }
    );
    assert_eq!(kind.question_type(), QuestionType::MultipleChoice);

    let essay = QuestionRecord {
        question_type: QuestionType::Essay,
        explanation: Some("Key points".to_string()),
        ..record
    };
    assert_eq!(
        QuestionKind::from_record(&essay, &[]),
        QuestionKind::Essay {
            explanation: Some("Key points".to_string())
        }
    );
}
