#[cfg(test)]
mod tests;

use super::retriever::ScoredChunk;
use super::truncate_chars;
use crate::database::sqlite::models::NewCitation;

const TRUNCATION_MARKER: &str = "...";

/// One citation per retrieved chunk, in rank order, scored with the
/// chunk's similarity
#[inline]
pub fn build_citations(retrieved: &[ScoredChunk], excerpt_chars: usize) -> Vec<NewCitation> {
    retrieved
        .iter()
        .map(|scored| NewCitation {
            document_id: scored.chunk.document_id,
            chunk_id: Some(scored.chunk.id),
            page_number: Some(scored.chunk.page_number),
            quote_text: excerpt(&scored.chunk.content, excerpt_chars),
            relevance_score: f64::from(scored.similarity),
        })
        .collect()
}

/// `content` capped at `limit` characters, with `...` appended when cut
#[inline]
pub fn excerpt(content: &str, limit: usize) -> String {
    let kept = truncate_chars(content, limit);
    if kept.len() == content.len() {
        kept.to_string()
    } else {
        format!("{}{}", kept, TRUNCATION_MARKER)
    }
}
