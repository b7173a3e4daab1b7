// Embeddings module
// Passage chunking and the embedding service adapters (Ollama, OpenAI-compatible)

pub mod chunking;
pub mod ollama;
pub mod openai;


use std::sync::Arc;

use thiserror::Error;

use crate::config::{EmbeddingConfig, Provider};
use crate::http::TransportError;

pub use chunking::{
    CharacterSplitter, ChunkingConfig, ChunkingError, HfTokenizer, TextChunk, TokenSplitter,
    Tokenizer, WordTokenizer,
};
pub use ollama::OllamaClient;
pub use openai::OpenAiEmbeddingClient;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("Embedding request failed: {0}")]
    Transport(#[from] TransportError),
    #[error("Malformed embedding response: {0}")]
    MalformedResponse(String),
    #[error("Mismatch between request and response counts: {expected} vs {actual}")]
    CountMismatch { expected: usize, actual: usize },
    #[error("Embedding service returned an empty vector")]
    EmptyVector,
    #[error("Embedding dimension {actual} does not match expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("API key environment variable {0} is not set")]
    MissingApiKey(String),
    #[error("Invalid embedding configuration: {0}")]
    Config(String),
}

/// Turns text into fixed-length vectors
///
/// Every vector placed in one index must come from the same `model_id`.
pub trait Embedder: Send + Sync {
    /// Stable identifier of the model, recorded in index headers
    fn model_id(&self) -> &str;

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Embed several texts, returning vectors in input order
    #[inline]
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

impl<T: Embedder + ?Sized> Embedder for Box<T> {
    #[inline]
    fn model_id(&self) -> &str {
        (**self).model_id()
    }

    #[inline]
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        (**self).embed(text)
    }

    #[inline]
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        (**self).embed_batch(texts)
    }
}

impl<T: Embedder + ?Sized> Embedder for Arc<T> {
    #[inline]
    fn model_id(&self) -> &str {
        (**self).model_id()
    }

    #[inline]
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        (**self).embed(text)
    }

    #[inline]
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        (**self).embed_batch(texts)
    }
}

/// Build the embedder selected by `config.provider`
#[inline]
pub fn embedder_from_config(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>, EmbeddingError> {
    let embedder: Arc<dyn Embedder> = match config.provider {
        Provider::Ollama => Arc::new(OllamaClient::new(config)?),
        Provider::OpenAi => Arc::new(OpenAiEmbeddingClient::new(config)?),
    };
    Ok(embedder)
}

/// Check that the configured service answers and serves `config.model`
#[inline]
pub fn check_service(config: &EmbeddingConfig) -> Result<(), EmbeddingError> {
    match config.provider {
        Provider::Ollama => OllamaClient::new(config)?.health_check(),
        Provider::OpenAi => OpenAiEmbeddingClient::new(config)?.health_check(),
    }
}

/// Identifier written to index headers: `<provider>:<model>`
#[inline]
pub fn model_id(provider: Provider, model: &str) -> String {
    format!("{provider}:{model}")
}
