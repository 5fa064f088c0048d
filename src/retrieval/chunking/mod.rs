#[cfg(test)]
mod tests;

/// Approximate characters per model token
const CHARS_PER_TOKEN: usize = 4;

/// A contiguous slice of a document's text, ready for embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk<'a> {
    /// 0-based position within the document
    pub index: usize,
    pub content: &'a str,
    /// Always 1; page boundaries are not known after extraction
    pub page_number: u32,
    /// Estimated token count
    pub token_count: usize,
}

/// Lazy splitter over a text, yielding chunks of at most `chunk_size`
/// characters in document order
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    remaining: &'a str,
    chunk_size: usize,
    next_index: usize,
}

impl<'a> Iterator for Chunks<'a> {
    type Item = TextChunk<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining.is_empty() {
            return None;
        }

        let split_at = self
            .remaining
            .char_indices()
            .nth(self.chunk_size)
            .map_or(self.remaining.len(), |(byte_index, _)| byte_index);
        let (content, rest) = self.remaining.split_at(split_at);
        self.remaining = rest;

        let index = self.next_index;
        self.next_index += 1;

        Some(TextChunk {
            index,
            content,
            page_number: 1,
            token_count: estimate_token_count(content),
        })
    }
}

impl std::iter::FusedIterator for Chunks<'_> {}

/// Split `text` into consecutive chunks of `chunk_size` characters; the
/// last chunk may be shorter. A zero size is treated as 1.
#[inline]
pub fn chunk_text(text: &str, chunk_size: usize) -> Chunks<'_> {
    Chunks {
        remaining: text,
        chunk_size: chunk_size.max(1),
        next_index: 0,
    }
}

/// Estimate token count as characters / 4
#[inline]
pub fn estimate_token_count(text: &str) -> usize {
    text.chars().count() / CHARS_PER_TOKEN
}
