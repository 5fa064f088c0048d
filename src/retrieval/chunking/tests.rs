use super::*;

#[test]
fn chunks_cover_text_exactly_once() {
    let text = "abcdefghij".repeat(25);
    let chunks: Vec<_> = chunk_text(&text, 60).collect();

    assert_eq!(chunks.len(), 5);
    let rebuilt: String = chunks.iter().map(|c| c.content).collect();
    assert_eq!(rebuilt, text);

    for (expected_index, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.index, expected_index);
        assert_eq!(chunk.page_number, 1);
        assert!(chunk.content.chars().count() <= 60);
    }
    assert_eq!(chunks[4].content.len(), 10);
}

#[test]
fn empty_text_yields_nothing() {
    assert_eq!(chunk_text("", 1000).count(), 0);
}

#[test]
fn text_shorter_than_chunk_size_is_one_chunk() {
    let chunks: Vec<_> = chunk_text("Photosynthesis", 1000).collect();
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].content, "Photosynthesis");
    assert_eq!(chunks[0].token_count, 3);
}

#[test]
fn multibyte_text_splits_on_char_boundaries() {
    let text = "ç".repeat(7);
    let chunks: Vec<_> = chunk_text(&text, 3).collect();

    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[0].content, "ççç");
    assert_eq!(chunks[2].content, "ç");
}

#[test]
fn zero_chunk_size_still_progresses() {
    assert_eq!(chunk_text("abc", 0).count(), 3);
}

#[test]
fn chunking_is_lazy() {
    let text = "x".repeat(10_000);
    let mut chunks = chunk_text(&text, 1000);
    let first = chunks.next().expect("first chunk");
    assert_eq!(first.token_count, 250);
    assert_eq!(chunks.count(), 9);
}

#[test]
fn token_estimate() {
    assert_eq!(estimate_token_count(""), 0);
    assert_eq!(estimate_token_count("abc"), 0);
    assert_eq!(estimate_token_count("abcdefgh"), 2);
}
