//! Prompt templates sent to the generation model.

use crate::grading::QuestionType;

/// Prompt for an answer grounded in retrieved document context
#[inline]
pub fn grounded_answer(question: &str, context: &str) -> String {
    format!(
        "Context: {}\n\nQuestion: {}\n\nAnswer based on the context provided. If the answer is not in the context, state that you don't know.",
        context, question
    )
}

/// Prompt asking for a 0-100 score and feedback on a free-text answer
#[inline]
pub fn grade_answer(question: &str, explanation: &str, answer: &str) -> String {
    format!(
        "Grade the following student answer for the question: \"{}\".\nCorrect Answer/Explanation: \"{}\".\nStudent Answer: \"{}\".\nProvide a score (0-100) and brief feedback as JSON {{\"score\": int, \"feedback\": string}}",
        question, explanation, answer
    )
}

/// Prompt asking for a JSON array of generated quiz questions
#[inline]
pub fn generate_questions(
    content: &str,
    topic: &str,
    count: u32,
    question_type: QuestionType,
) -> String {
    format!(
        "Generate {} {} questions about the following content and topic.\nContent: {}\nTopic: {}\n\nFormat the output as a JSON array of objects, where each object has \"questionText\", \"options\" (for multiple_choice, array of strings), and \"correctAnswer\" (string or index). For short_answer, only \"questionText\" and \"correctAnswer\".",
        count,
        question_type.as_str(),
        content,
        topic
    )
}
