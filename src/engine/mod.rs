// Engine module
// Online question answering: retrieve, ground, prompt, generate


use std::fmt;
use std::sync::Arc;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::ConfigError;
use crate::embeddings::{Embedder, EmbeddingError};
use crate::generation::{ChatCompleter, ChatMessage, CompletionError};
use crate::index::{DistanceMetric, IndexError, ScoredPassage, SharedIndex, VectorIndex};

/// Separator placed between passage texts in the prompt context
pub const CONTEXT_SEPARATOR: &str = "; ";

/// Answer returned without calling the model when nothing was retrieved
pub const NO_CONTEXT_ANSWER: &str =
    "I could not find any information about that in the indexed report.";

/// What to do when retrieval returns no passages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyContextPolicy {
    /// Ask the model anyway with an empty context
    #[default]
    PassThrough,
    /// Return [`NO_CONTEXT_ANSWER`] without a network call
    ShortCircuit,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Passages retrieved per question
    pub top_k: usize,
    /// Distance used for newly built indexes
    pub metric: DistanceMetric,
    pub empty_context: EmptyContextPolicy,
}

impl Default for RetrievalConfig {
    #[inline]
    fn default() -> Self {
        Self {
            top_k: 5,
            metric: DistanceMetric::Cosine,
            empty_context: EmptyContextPolicy::PassThrough,
        }
    }
}

impl RetrievalConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.top_k) {
            return Err(ConfigError::InvalidTopK(self.top_k));
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("k must be at least 1")]
    ZeroK,
    #[error("Query embedding model {query} does not match index model {index}")]
    ModelMismatch { query: String, index: String },
    #[error("Failed to embed query: {0}")]
    Embedding(#[from] EmbeddingError),
    #[error("Index search failed: {0}")]
    Index(#[from] IndexError),
}

/// Step of answering that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStage {
    Retrieval,
    Generation,
}

impl fmt::Display for QueryStage {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Retrieval => f.write_str("retrieval"),
            Self::Generation => f.write_str("generation"),
        }
    }
}

/// The single failure type of [`AnswerEngine::answer`]
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Error generating response: {message}")]
pub struct GenerationError {
    pub stage: QueryStage,
    pub message: String,
}

impl From<RetrievalError> for GenerationError {
    #[inline]
    fn from(error: RetrievalError) -> Self {
        Self {
            stage: QueryStage::Retrieval,
            message: error.to_string(),
        }
    }
}

impl From<CompletionError> for GenerationError {
    #[inline]
    fn from(error: CompletionError) -> Self {
        Self {
            stage: QueryStage::Generation,
            message: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
    /// Passages used as context, in retrieval order
    pub sources: Vec<ScoredPassage>,
}

/// Finds the passages most relevant to a query
pub trait Retriever: Send + Sync {
    fn retrieve(&self, query: &str, k: usize) -> Result<Vec<ScoredPassage>, RetrievalError>;
}

/// Source of the index a retriever searches
pub trait IndexSource: Send + Sync {
    fn snapshot(&self) -> Arc<VectorIndex>;
}

impl IndexSource for Arc<VectorIndex> {
    #[inline]
    fn snapshot(&self) -> Arc<VectorIndex> {
        Arc::clone(self)
    }
}

impl IndexSource for SharedIndex {
    #[inline]
    fn snapshot(&self) -> Arc<VectorIndex> {
        self.current()
    }
}

impl IndexSource for Arc<SharedIndex> {
    #[inline]
    fn snapshot(&self) -> Arc<VectorIndex> {
        self.current()
    }
}

/// Embeds the query with the index's model and searches the index exhaustively
pub struct IndexRetriever<S, E> {
    source: S,
    embedder: E,
}

impl<S: IndexSource, E: Embedder> IndexRetriever<S, E> {
    #[inline]
    pub fn new(source: S, embedder: E) -> Self {
        Self { source, embedder }
    }
}

impl<S: IndexSource, E: Embedder> Retriever for IndexRetriever<S, E> {
    #[inline]
    fn retrieve(&self, query: &str, k: usize) -> Result<Vec<ScoredPassage>, RetrievalError> {
        if k == 0 {
            return Err(RetrievalError::ZeroK);
        }

        let index = self.source.snapshot();
        if index.is_empty() {
            debug!("Index for {} is empty, nothing to retrieve", index.document_id());
            return Ok(Vec::new());
        }
        if index.model() != self.embedder.model_id() {
            return Err(RetrievalError::ModelMismatch {
                query: self.embedder.model_id().to_string(),
                index: index.model().to_string(),
            });
        }

        let query_vector = self.embedder.embed(query)?;
        Ok(index.search(&query_vector, k)?)
    }
}

/// Answers questions from retrieved passages with a chat model
pub struct AnswerEngine<R, C> {
    retriever: R,
    completer: C,
    domain: String,
    temperature: f32,
    empty_context: EmptyContextPolicy,
}

impl<R: Retriever, C: ChatCompleter> AnswerEngine<R, C> {
    #[inline]
    pub fn new(retriever: R, completer: C, domain: impl Into<String>) -> Self {
        Self {
            retriever,
            completer,
            domain: domain.into(),
            temperature: 0.7,
            empty_context: EmptyContextPolicy::default(),
        }
    }

    #[inline]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    #[inline]
    pub fn with_empty_context(mut self, policy: EmptyContextPolicy) -> Self {
        self.empty_context = policy;
        self
    }

    /// Answer `query` from the `k` closest passages
    ///
    /// Nothing is kept between calls.
    #[inline]
    pub fn answer(&self, query: &str, k: usize) -> Result<Answer, GenerationError> {
        debug!("Query received: {:?}", query);

        debug!("Retrieving up to {} passages", k);
        let sources = self.retriever.retrieve(query, k).map_err(|e| {
            warn!("Query failed during retrieval: {}", e);
            GenerationError::from(e)
        })?;

        if sources.is_empty() && self.empty_context == EmptyContextPolicy::ShortCircuit {
            info!("No passages retrieved, answering without the model");
            return Ok(Answer {
                text: NO_CONTEXT_ANSWER.to_string(),
                sources,
            });
        }

        let context = ground(&sources);
        let messages = self.prompt(query, &context);

        debug!(
            "Generating from {} passages ({} context characters)",
            sources.len(),
            context.chars().count()
        );
        let text = self
            .completer
            .complete(&messages, self.temperature)
            .map_err(|e| {
                warn!("Query failed during generation: {}", e);
                GenerationError::from(e)
            })?;

        info!("Query completed with {} sources", sources.len());
        Ok(Answer { text, sources })
    }

    /// System instruction followed by the question and its context
    #[inline]
    pub fn prompt(&self, query: &str, context: &str) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(format!(
                "You are an expert assistant on {}. Answer only from the supplied context. \
                 If the context does not contain the answer, say that you do not know.",
                self.domain
            )),
            ChatMessage::user(format!("Question: {query}\nContext: {context}")),
        ]
    }
}

/// Join passage texts in retrieval order
#[inline]
pub fn ground(sources: &[ScoredPassage]) -> String {
    sources
        .iter()
        .map(|source| source.passage.text.as_str())
        .join(CONTEXT_SEPARATOR)
}
