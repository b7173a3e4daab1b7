// Generation module
// Chat-completion adapters used to phrase answers from retrieved context

pub mod ollama;
pub mod openai;


use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{GenerationConfig, Provider};
use crate::http::TransportError;

pub use ollama::OllamaChatClient;
pub use openai::OpenAiChatClient;

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("Completion request failed: {0}")]
    Transport(#[from] TransportError),
    #[error("Malformed completion response: {0}")]
    MalformedResponse(String),
    #[error("API key environment variable {0} is not set")]
    MissingApiKey(String),
    #[error("Invalid generation configuration: {0}")]
    Config(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    #[inline]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A hosted chat model producing one non-streamed reply
pub trait ChatCompleter: Send + Sync {
    fn complete(&self, messages: &[ChatMessage], temperature: f32)
    -> Result<String, CompletionError>;
}

impl<T: ChatCompleter + ?Sized> ChatCompleter for &T {
    #[inline]
    fn complete(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<String, CompletionError> {
        (**self).complete(messages, temperature)
    }
}

impl<T: ChatCompleter + ?Sized> ChatCompleter for Box<T> {
    #[inline]
    fn complete(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<String, CompletionError> {
        (**self).complete(messages, temperature)
    }
}

impl<T: ChatCompleter + ?Sized> ChatCompleter for Arc<T> {
    #[inline]
    fn complete(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<String, CompletionError> {
        (**self).complete(messages, temperature)
    }
}

/// Build the completer selected by `config.provider`
#[inline]
pub fn completer_from_config(
    config: &GenerationConfig,
) -> Result<Arc<dyn ChatCompleter>, CompletionError> {
    let completer: Arc<dyn ChatCompleter> = match config.provider {
        Provider::Ollama => Arc::new(OllamaChatClient::new(config)?),
        Provider::OpenAi => Arc::new(OpenAiChatClient::new(config)?),
    };
    Ok(completer)
}

fn non_empty(content: Option<String>) -> Result<String, CompletionError> {
    content
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| CompletionError::MalformedResponse("completion is empty".to_string()))
}
