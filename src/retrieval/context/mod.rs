
use super::retriever::ScoredChunk;
use super::truncate_chars;

const CHUNK_SEPARATOR: &str = "\n\n";

/// Where the context text came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextSource {
    /// Retrieved chunks joined in rank order
    Retrieved,
    /// The document's raw text, truncated
    DocumentText,
    /// Nothing to ground the answer on
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledContext {
    pub text: String,
    pub source: ContextSource,
}

impl AssembledContext {
    #[inline]
    pub fn empty() -> Self {
        Self {
            text: String::new(),
            source: ContextSource::Empty,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Citations are only produced for retrieved context
    #[inline]
    pub fn is_retrieved(&self) -> bool {
        self.source == ContextSource::Retrieved
    }
}

/// Build the prompt context from retrieval results, falling back to the
/// first `char_limit` characters of `document_text` when nothing was
/// retrieved
#[inline]
pub fn assemble_context(
    retrieved: &[ScoredChunk],
    document_text: Option<&str>,
    char_limit: usize,
) -> AssembledContext {
    if !retrieved.is_empty() {
        let text = retrieved
            .iter()
            .map(|scored| scored.chunk.content.as_str())
            .collect::<Vec<_>>()
            .join(CHUNK_SEPARATOR);
        return AssembledContext {
            text,
            source: ContextSource::Retrieved,
        };
    }

    match document_text.filter(|text| !text.is_empty()) {
        Some(text) => AssembledContext {
            text: truncate_chars(text, char_limit).to_string(),
            source: ContextSource::DocumentText,
        },
        None => AssembledContext::empty(),
    }
}
