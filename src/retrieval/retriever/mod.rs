#[cfg(test)]
mod tests;

use anyhow::Result;
use async_trait::async_trait;
use std::cmp::Ordering;
use tracing::debug;

use crate::database::sqlite::models::{DocumentChunk, NewDocumentChunk};

/// Persistent home of document chunks and their vectors
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// All chunks of a document ordered by chunk index
    async fn chunks_of(&self, document_id: i64) -> Result<Vec<DocumentChunk>>;

    /// Atomically replace the chunks of a document
    async fn save_chunks(
        &self,
        document_id: i64,
        chunks: &[NewDocumentChunk],
    ) -> Result<Vec<DocumentChunk>>;
}

/// A retrieved chunk with its cosine similarity to the query
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: DocumentChunk,
    pub similarity: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RetrievalOutcome {
    /// Best matches, most similar first
    Matches(Vec<ScoredChunk>),
    /// The document has no chunk with a vector
    NoRelevantChunks,
}

impl RetrievalOutcome {
    #[inline]
    pub fn matches(&self) -> &[ScoredChunk] {
        match self {
            RetrievalOutcome::Matches(matches) => matches,
            RetrievalOutcome::NoRelevantChunks => &[],
        }
    }
}

/// Cosine similarity of two vectors. Vectors of different length, or with
/// a zero norm, score 0.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let similarity = dot / (norm_a.sqrt() * norm_b.sqrt());
    if similarity.is_finite() {
        similarity
    } else {
        0.0
    }
}

/// Score every chunk that has a vector and keep the `top_k` best, ties
/// going to the lower chunk index
#[inline]
pub fn rank_chunks(query: &[f32], chunks: Vec<DocumentChunk>, top_k: usize) -> Vec<ScoredChunk> {
    let mut scored: Vec<ScoredChunk> = chunks
        .into_iter()
        .filter_map(|chunk| {
            let similarity = cosine_similarity(query, chunk.embedding.as_deref()?);
            Some(ScoredChunk { chunk, similarity })
        })
        .collect();

    scored.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.chunk.chunk_index.cmp(&b.chunk.chunk_index))
    });
    scored.truncate(top_k);
    scored
}

/// Top-K similarity search over one document's chunks
pub struct Retriever<'a, S: ?Sized> {
    store: &'a S,
    top_k: usize,
}

impl<'a, S: ChunkStore + ?Sized> Retriever<'a, S> {
    #[inline]
    pub fn new(store: &'a S, top_k: usize) -> Self {
        Self {
            store,
            top_k: top_k.max(1),
        }
    }

    /// Rank the document's chunks against `query`
    #[inline]
    pub async fn retrieve(&self, query: &[f32], document_id: i64) -> Result<RetrievalOutcome> {
        let chunks = self.store.chunks_of(document_id).await?;
        let candidates = chunks.len();
        let ranked = rank_chunks(query, chunks, self.top_k);

        debug!(
            "Retrieved {} of {} chunks for document {}",
            ranked.len(),
            candidates,
            document_id
        );

        if ranked.is_empty() {
            Ok(RetrievalOutcome::NoRelevantChunks)
        } else {
            Ok(RetrievalOutcome::Matches(ranked))
        }
    }
}
