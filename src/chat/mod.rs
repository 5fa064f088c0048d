// Chat module
// Answers questions against a session's document and records the exchange


use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::database::sqlite::Database;
use crate::database::sqlite::models::{
    ChatMessage, ChatSession, Citation, Document, MessageRole, NewChatSession, NewCitation,
};
use crate::database::sqlite::queries::{
    ChatQueries, CitationQueries, CourseQueries, DocumentQueries, UserQueries,
};
use crate::llm::{AnswerGenerator, EmbeddingGateway, UpstreamError, prompts};
use crate::retrieval::{
    AssembledContext, ChunkStore, RetrievalConfig, Retriever, assemble_context, build_citations,
};
use crate::{Result, StudyError};

/// Reply stored when an answer could not be produced
pub const FALLBACK_REPLY: &str = "Sorry, I am having trouble processing your request right now.";

#[derive(Error, Debug)]
pub enum AnswerError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("Chunk lookup failed: {0}")]
    ChunkStore(#[source] anyhow::Error),
}

/// An answer ready to be stored, with the citations backing it
#[derive(Debug, Clone, PartialEq)]
pub struct DraftAnswer {
    pub content: String,
    pub context: AssembledContext,
    pub citations: Vec<NewCitation>,
}

impl DraftAnswer {
    #[inline]
    pub fn fallback() -> Self {
        Self {
            content: FALLBACK_REPLY.to_string(),
            context: AssembledContext::empty(),
            citations: Vec::new(),
        }
    }
}

/// Retrieve, assemble context and generate an answer to `question`.
///
/// With a document attached the question is embedded and matched against
/// the document's chunks; when nothing matches, the document's raw text
/// (truncated) stands in as context. Without a document the question is
/// sent on its own.
#[inline]
pub async fn answer_question(
    embedder: &dyn EmbeddingGateway,
    generator: &dyn AnswerGenerator,
    store: &dyn ChunkStore,
    document: Option<&Document>,
    question: &str,
    config: &RetrievalConfig,
) -> std::result::Result<DraftAnswer, AnswerError> {
    let (context, citations) = match document {
        Some(document) => {
            let query = embedder.embed(question).await?;
            let outcome = Retriever::new(store, config.top_k)
                .retrieve(&query, document.id)
                .await
                .map_err(AnswerError::ChunkStore)?;
            let matches = outcome.matches();

            let context = assemble_context(matches, document.text(), config.context_char_limit);
            let citations = if context.is_retrieved() {
                build_citations(matches, config.citation_excerpt_chars)
            } else {
                Vec::new()
            };
            (context, citations)
        }
        None => (AssembledContext::empty(), Vec::new()),
    };

    let prompt = if context.is_empty() {
        question.to_string()
    } else {
        prompts::grounded_answer(question, &context.text)
    };

    debug!(
        "Generating answer with {:?} context of {} characters",
        context.source,
        context.text.len()
    );
    let content = generator.generate(&prompt, config.answer_params()).await?;

    Ok(DraftAnswer {
        content,
        context,
        citations,
    })
}

/// One stored question/answer exchange
#[derive(Debug, Clone, PartialEq)]
pub struct ChatTurn {
    pub user_message: ChatMessage,
    pub assistant_message: ChatMessage,
    pub citations: Vec<Citation>,
}

pub struct ChatService {
    database: Database,
    store: Arc<dyn ChunkStore>,
    embedder: Arc<dyn EmbeddingGateway>,
    generator: Arc<dyn AnswerGenerator>,
    config: RetrievalConfig,
}

impl ChatService {
    #[inline]
    pub fn new(
        database: Database,
        embedder: Arc<dyn EmbeddingGateway>,
        generator: Arc<dyn AnswerGenerator>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            store: Arc::new(database.clone()),
            database,
            embedder,
            generator,
            config,
        }
    }

    /// Read chunks from `store` instead of the database
    #[inline]
    #[must_use]
    pub fn with_chunk_store(mut self, store: Arc<dyn ChunkStore>) -> Self {
        self.store = store;
        self
    }

    /// Open a session after checking that its references exist
    pub async fn start_session(&self, new_session: NewChatSession) -> Result<ChatSession> {
        let pool = self.database.pool();

        if UserQueries::get_by_id(pool, new_session.user_id)
            .await?
            .is_none()
        {
            return Err(StudyError::invalid_input(format!(
                "Unknown user {}",
                new_session.user_id
            )));
        }
        if let Some(course_id) = new_session.course_id {
            if CourseQueries::get_by_id(pool, course_id).await?.is_none() {
                return Err(StudyError::invalid_input(format!(
                    "Unknown course {}",
                    course_id
                )));
            }
        }
        if let Some(document_id) = new_session.document_id {
            if DocumentQueries::get_by_id(pool, document_id)
                .await?
                .is_none()
            {
                return Err(StudyError::invalid_input(format!(
                    "Unknown document {}",
                    document_id
                )));
            }
        }

        let session = ChatQueries::create_session(pool, new_session).await?;
        info!("Started chat session {}", session.id);
        Ok(session)
    }

    /// Record a user message, answer it and record the reply.
    ///
    /// Generation failures do not fail the call: the stored reply becomes
    /// [`FALLBACK_REPLY`] without citations.
    pub async fn post_message(&self, session_id: i64, content: &str) -> Result<ChatTurn> {
        let pool = self.database.pool();

        let session = ChatQueries::get_session(pool, session_id)
            .await?
            .ok_or_else(|| StudyError::invalid_input(format!("Unknown session {}", session_id)))?;
        if content.trim().is_empty() {
            return Err(StudyError::invalid_input("Message is empty"));
        }

        let user_message = ChatQueries::add_message(
            pool,
            session.id,
            MessageRole::User,
            content,
            Utc::now().naive_utc(),
        )
        .await?;

        let document = match session.document_id {
            Some(document_id) => DocumentQueries::get_by_id(pool, document_id).await?,
            None => None,
        };

        let draft = match answer_question(
            self.embedder.as_ref(),
            self.generator.as_ref(),
            self.store.as_ref(),
            document.as_ref(),
            content,
            &self.config,
        )
        .await
        {
            Ok(draft) => draft,
            Err(e) => {
                error!("Answer generation failed for session {}: {}", session.id, e);
                DraftAnswer::fallback()
            }
        };

        let replied_at = Utc::now().naive_utc();
        let mut tx = pool
            .begin()
            .await
            .context("Failed to begin transaction for assistant reply")?;

        let assistant_message = ChatQueries::add_message(
            &mut *tx,
            session.id,
            MessageRole::Assistant,
            &draft.content,
            replied_at,
        )
        .await?;
        let citations =
            CitationQueries::create_batch(&mut tx, assistant_message.id, &draft.citations).await?;
        ChatQueries::touch_session(&mut *tx, session.id, replied_at).await?;

        tx.commit()
            .await
            .context("Failed to commit assistant reply")?;

        debug!(
            "Stored reply {} with {} citations in session {}",
            assistant_message.id,
            citations.len(),
            session.id
        );

        Ok(ChatTurn {
            user_message,
            assistant_message,
            citations,
        })
    }

    #[inline]
    pub async fn history(&self, session_id: i64) -> Result<Vec<ChatMessage>> {
        Ok(ChatQueries::list_messages(self.database.pool(), session_id).await?)
    }

    #[inline]
    pub async fn citations_for(&self, message_id: i64) -> Result<Vec<Citation>> {
        Ok(CitationQueries::list_by_message(self.database.pool(), message_id).await?)
    }
}
