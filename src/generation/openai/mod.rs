#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::{ChatCompleter, ChatMessage, CompletionError, non_empty};
use crate::config::GenerationConfig;
use crate::http::{JsonClient, api_key_from_env};

/// Client for OpenAI-compatible `chat/completions` endpoints
#[derive(Debug, Clone)]
pub struct OpenAiChatClient {
    endpoint: Url,
    model: String,
    http: JsonClient,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl OpenAiChatClient {
    /// Create a client, reading the API key from `config.api_key_env`
    #[inline]
    pub fn new(config: &GenerationConfig) -> Result<Self, CompletionError> {
        let api_key = api_key_from_env(&config.api_key_env)
            .ok_or_else(|| CompletionError::MissingApiKey(config.api_key_env.clone()))?;
        Self::with_api_key(config, api_key)
    }

    #[inline]
    pub fn with_api_key(config: &GenerationConfig, api_key: String) -> Result<Self, CompletionError> {
        let endpoint = config
            .endpoint("chat/completions")
            .map_err(|e| CompletionError::Config(e.to_string()))?;

        Ok(Self {
            endpoint,
            model: config.model.clone(),
            http: JsonClient::new(config.timeout(), config.retry_attempts)
                .with_bearer_token(api_key),
        })
    }
}

impl ChatCompleter for OpenAiChatClient {
    #[inline]
    fn complete(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<String, CompletionError> {
        let request_json = serde_json::to_string(&CompletionRequest {
            model: &self.model,
            messages,
            temperature,
        })
        .map_err(|e| CompletionError::MalformedResponse(e.to_string()))?;

        debug!("Requesting completion from {} ({})", self.endpoint, self.model);
        let response_text = self.http.post_json(&self.endpoint, &request_json)?;
        let response: CompletionResponse = serde_json::from_str(&response_text)
            .map_err(|e| CompletionError::MalformedResponse(e.to_string()))?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content);
        non_empty(content)
    }
}
