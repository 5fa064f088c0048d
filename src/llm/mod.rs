// Model gateway module
// Narrow async interfaces over the embedding and text-generation models

pub mod ollama;
pub mod prompts;
pub mod response;

use async_trait::async_trait;
use thiserror::Error;

pub use ollama::OllamaClient;

/// Failure of a call to an external model
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Upstream returned HTTP {0}")]
    Status(u16),

    #[error("Could not decode upstream response: {0}")]
    Decode(String),

    #[error("Upstream task failed: {0}")]
    Task(String),
}

/// Sampling parameters for a generation call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationParams {
    #[inline]
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 1024,
        }
    }
}

/// Maps text to a fixed-length vector
#[async_trait]
pub trait EmbeddingGateway: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, UpstreamError>;

    /// Embed several texts, preserving order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, UpstreamError> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }
}

/// Produces natural-language text for a prompt
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, params: GenerationParams)
    -> Result<String, UpstreamError>;
}
