use thiserror::Error;

use crate::llm::UpstreamError;

pub type Result<T> = std::result::Result<T, StudyError>;

#[derive(Error, Debug)]
pub enum StudyError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Quiz attempt {0} is not in progress")]
    AttemptNotInProgress(i64),

    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Malformed upstream response: {0}")]
    MalformedResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(anyhow::Error),
}

impl From<anyhow::Error> for StudyError {
    /// Errors raised as `StudyError` below an `anyhow` boundary keep their variant
    #[inline]
    fn from(error: anyhow::Error) -> Self {
        match error.downcast::<StudyError>() {
            Ok(study_error) => study_error,
            Err(error) => Self::Other(error),
        }
    }
}

impl StudyError {
    #[inline]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}

pub mod chat;
pub mod commands;
pub mod config;
pub mod database;
pub mod grading;
pub mod indexer;
pub mod llm;
pub mod quiz;
pub mod retrieval;
