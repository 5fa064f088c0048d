use super::*;
use std::sync::Mutex;

fn chunk(index: i64, embedding: Option<Vec<f32>>) -> DocumentChunk {
    DocumentChunk {
        id: index + 100,
        document_id: 1,
        chunk_index: index,
        content: format!("chunk {}", index),
        page_number: 1,
        embedding,
        token_count: 2,
    }
}

#[derive(Default)]
struct MemoryStore {
    chunks: Mutex<Vec<DocumentChunk>>,
}

#[async_trait]
impl ChunkStore for MemoryStore {
    async fn chunks_of(&self, document_id: i64) -> Result<Vec<DocumentChunk>> {
        let chunks = self.chunks.lock().expect("lock poisoned");
        Ok(chunks
            .iter()
            .filter(|c| c.document_id == document_id)
            .cloned()
            .collect())
    }

    async fn save_chunks(
        &self,
        document_id: i64,
        chunks: &[NewDocumentChunk],
    ) -> Result<Vec<DocumentChunk>> {
        let created: Vec<DocumentChunk> = chunks
            .iter()
            .map(|c| DocumentChunk {
                id: c.chunk_index,
                document_id,
                chunk_index: c.chunk_index,
                content: c.content.clone(),
                page_number: c.page_number,
                embedding: c.embedding.clone(),
                token_count: c.token_count,
            })
            .collect();
        *self.chunks.lock().expect("lock poisoned") = created.clone();
        Ok(created)
    }
}

#[test]
fn cosine_similarity_basics() {
    assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-6);
    assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
}

#[test]
fn degenerate_vectors_score_zero() {
    assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
    assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    assert_eq!(cosine_similarity(&[], &[]), 0.0);
}

#[test]
fn ranking_keeps_top_k_in_descending_order() {
    let chunks = (0..8)
        .map(|i| chunk(i, Some(vec![1.0, i as f32])))
        .collect::<Vec<_>>();

    let ranked = rank_chunks(&[1.0, 0.0], chunks, 5);
    let indices: Vec<i64> = ranked.iter().map(|s| s.chunk.chunk_index).collect();
    assert_eq!(indices, vec![0, 1, 2, 3, 4]);
    assert!(ranked.windows(2).all(|w| w[0].similarity >= w[1].similarity));
}

#[test]
fn ties_go_to_lower_index() {
    let chunks = vec![
        chunk(3, Some(vec![1.0, 0.0])),
        chunk(1, Some(vec![1.0, 0.0])),
        chunk(2, Some(vec![2.0, 0.0])),
    ];

    let ranked = rank_chunks(&[1.0, 0.0], chunks, 2);
    let indices: Vec<i64> = ranked.iter().map(|s| s.chunk.chunk_index).collect();
    assert_eq!(indices, vec![1, 2]);
}

#[test]
fn chunks_without_vectors_are_never_ranked() {
    let chunks = vec![chunk(0, None), chunk(1, Some(vec![0.0, 1.0]))];
    let ranked = rank_chunks(&[1.0, 0.0], chunks, 5);
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].chunk.chunk_index, 1);
    assert_eq!(ranked[0].similarity, 0.0);
}

#[tokio::test]
async fn retriever_reports_no_relevant_chunks() {
    let store = MemoryStore::default();
    let retriever = Retriever::new(&store, 5);

    let empty = retriever
        .retrieve(&[1.0, 0.0], 1)
        .await
        .expect("retrieval succeeds");
    assert_eq!(empty, RetrievalOutcome::NoRelevantChunks);
    assert!(empty.matches().is_empty());

    store
        .save_chunks(
            1,
            &[NewDocumentChunk {
                chunk_index: 0,
                content: "unembedded".to_string(),
                page_number: 1,
                embedding: None,
                token_count: 2,
            }],
        )
        .await
        .expect("save succeeds");

    let still_empty = retriever
        .retrieve(&[1.0, 0.0], 1)
        .await
        .expect("retrieval succeeds");
    assert_eq!(still_empty, RetrievalOutcome::NoRelevantChunks);
}

#[tokio::test]
async fn retriever_returns_scored_matches() {
    let store = MemoryStore::default();
    store
        .save_chunks(
            1,
            &[
                NewDocumentChunk {
                    chunk_index: 0,
                    content: "far".to_string(),
                    page_number: 1,
                    embedding: Some(vec![0.0, 1.0]),
                    token_count: 0,
                },
                NewDocumentChunk {
                    chunk_index: 1,
                    content: "near".to_string(),
                    page_number: 1,
                    embedding: Some(vec![1.0, 0.1]),
                    token_count: 1,
                },
            ],
        )
        .await
        .expect("save succeeds");

    let outcome = Retriever::new(&store, 5)
        .retrieve(&[1.0, 0.0], 1)
        .await
        .expect("retrieval succeeds");

    let matches = outcome.matches();
    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].chunk.content, "near");
    assert!(matches[0].similarity > 0.9);
}
