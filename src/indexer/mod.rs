// Indexer module
// Turns a document's extracted text into embedded, searchable chunks


use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::database::sqlite::Database;
use crate::database::sqlite::models::{Document, NewDocument, NewDocumentChunk};
use crate::database::sqlite::queries::{CourseQueries, DocumentQueries};
use crate::llm::{EmbeddingGateway, UpstreamError};
use crate::retrieval::{ChunkStore, TextChunk, chunk_text};
use crate::{Result, StudyError};

/// Page count recorded when extraction could not tell
const UNKNOWN_PAGE_COUNT: i64 = 1;

/// Counts from one indexing run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexingStats {
    pub chunks_created: usize,
    pub embeddings_stored: usize,
}

/// Indexing path: chunk, embed, store, mark the document completed
pub struct DocumentIndexer {
    database: Database,
    embedder: Arc<dyn EmbeddingGateway>,
    chunk_size: usize,
}

impl DocumentIndexer {
    #[inline]
    pub fn new(database: Database, embedder: Arc<dyn EmbeddingGateway>, chunk_size: usize) -> Self {
        Self {
            database,
            embedder,
            chunk_size,
        }
    }

    /// Store a new document as `pending` and index it
    pub async fn ingest(&self, new_document: NewDocument) -> Result<(Document, IndexingStats)> {
        let pool = self.database.pool();
        if CourseQueries::get_by_id(pool, new_document.course_id)
            .await?
            .is_none()
        {
            return Err(StudyError::invalid_input(format!(
                "Unknown course {}",
                new_document.course_id
            )));
        }

        let document = DocumentQueries::create(pool, new_document).await?;
        info!("Ingested document {} ({})", document.id, document.title);

        let stats = self.index_document(&document).await?;
        let indexed = self.reload(document.id).await?;
        Ok((indexed, stats))
    }

    /// Re-run indexing for an existing document, replacing its chunks
    pub async fn reindex(&self, document_id: i64) -> Result<(Document, IndexingStats)> {
        let pool = self.database.pool();
        let document = DocumentQueries::get_by_id(pool, document_id)
            .await?
            .ok_or_else(|| StudyError::invalid_input(format!("Unknown document {}", document_id)))?;

        DocumentQueries::reset_to_pending(pool, document.id).await?;
        let stats = self.index_document(&document).await?;
        let indexed = self.reload(document.id).await?;
        Ok((indexed, stats))
    }

    /// Chunk and embed the document's text, then store the chunks and mark
    /// the document completed. Upstream failures mark it failed instead.
    ///
    /// Empty text skips chunking and embedding but still clears any chunks
    /// from an earlier run and marks the document completed.
    pub async fn index_document(&self, document: &Document) -> Result<IndexingStats> {
        let chunks: Vec<TextChunk<'_>> = match document.text() {
            Some(text) => chunk_text(text, self.chunk_size).collect(),
            None => Vec::new(),
        };
        debug!(
            "Document {} split into {} chunks",
            document.id,
            chunks.len()
        );

        let embeddings = if chunks.is_empty() {
            Vec::new()
        } else {
            let texts: Vec<String> = chunks.iter().map(|c| c.content.to_string()).collect();
            match self.embed_all(&texts).await {
                Ok(embeddings) => embeddings,
                Err(e) => {
                    error!("Indexing of document {} failed: {}", document.id, e);
                    DocumentQueries::mark_failed(self.database.pool(), document.id, &e.to_string())
                        .await?;
                    return Err(e.into());
                }
            }
        };

        let new_chunks: Vec<NewDocumentChunk> = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| NewDocumentChunk {
                chunk_index: chunk.index as i64,
                content: chunk.content.to_string(),
                page_number: i64::from(chunk.page_number),
                embedding: (!embedding.is_empty()).then_some(embedding),
                token_count: chunk.token_count as i64,
            })
            .collect();

        let missing = new_chunks.iter().filter(|c| c.embedding.is_none()).count();
        if missing > 0 {
            warn!(
                "{} chunks of document {} have no embedding and will not be retrievable",
                missing, document.id
            );
        }

        let stored = match self.database.save_chunks(document.id, &new_chunks).await {
            Ok(stored) => stored,
            Err(e) => {
                error!("Storing chunks of document {} failed: {:#}", document.id, e);
                DocumentQueries::mark_failed(self.database.pool(), document.id, &e.to_string())
                    .await?;
                return Err(e.into());
            }
        };

        DocumentQueries::mark_completed(
            self.database.pool(),
            document.id,
            document.page_count.unwrap_or(UNKNOWN_PAGE_COUNT),
            Utc::now().naive_utc(),
        )
        .await?;

        let stats = IndexingStats {
            chunks_created: stored.len(),
            embeddings_stored: stored.len() - missing,
        };
        info!(
            "Indexed document {}: {} chunks, {} embeddings",
            document.id, stats.chunks_created, stats.embeddings_stored
        );
        Ok(stats)
    }

    async fn embed_all(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, UpstreamError> {
        let embeddings = self.embedder.embed_batch(texts).await?;
        if embeddings.len() != texts.len() {
            return Err(UpstreamError::Decode(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                embeddings.len()
            )));
        }
        Ok(embeddings)
    }

    async fn reload(&self, document_id: i64) -> Result<Document> {
        DocumentQueries::get_by_id(self.database.pool(), document_id)
            .await?
            .ok_or_else(|| StudyError::invalid_input(format!("Unknown document {}", document_id)))
    }
}
