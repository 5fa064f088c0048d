// Retrieval module
// Chunking on the indexing path; ranking, context and citations on the query path

pub mod chunking;
pub mod citations;
pub mod context;
pub mod retriever;


use serde::{Deserialize, Serialize};

use crate::llm::GenerationParams;

pub use chunking::{TextChunk, chunk_text};
pub use citations::build_citations;
pub use context::{AssembledContext, ContextSource, assemble_context};
pub use retriever::{
    ChunkStore, RetrievalOutcome, Retriever, ScoredChunk, cosine_similarity, rank_chunks,
};

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_CONTEXT_CHAR_LIMIT: usize = 4000;
pub const DEFAULT_CITATION_EXCERPT_CHARS: usize = 200;

/// Tunables for the indexing and query paths, the `[retrieval]` config section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Chunk length in characters
    pub chunk_size: usize,
    /// Number of chunks handed to the context assembler
    pub top_k: usize,
    /// Cap on raw document text used when nothing was retrieved
    pub context_char_limit: usize,
    /// Cap on a citation excerpt, before the `...` suffix
    pub citation_excerpt_chars: usize,
    pub answer_temperature: f32,
    pub answer_max_tokens: u32,
}

impl Default for RetrievalConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            top_k: DEFAULT_TOP_K,
            context_char_limit: DEFAULT_CONTEXT_CHAR_LIMIT,
            citation_excerpt_chars: DEFAULT_CITATION_EXCERPT_CHARS,
            answer_temperature: 0.7,
            answer_max_tokens: 1024,
        }
    }
}

impl RetrievalConfig {
    #[inline]
    pub fn answer_params(&self) -> GenerationParams {
        GenerationParams {
            temperature: self.answer_temperature,
            max_tokens: self.answer_max_tokens,
        }
    }
}

/// First `limit` characters of `text`; borrows when nothing is cut
#[inline]
pub fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}
