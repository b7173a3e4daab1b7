#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::{ChatCompleter, ChatMessage, CompletionError, non_empty};
use crate::config::GenerationConfig;
use crate::http::JsonClient;

/// Client for the Ollama native `/api/chat` endpoint, without streaming
#[derive(Debug, Clone)]
pub struct OllamaChatClient {
    endpoint: Url,
    model: String,
    http: JsonClient,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl OllamaChatClient {
    #[inline]
    pub fn new(config: &GenerationConfig) -> Result<Self, CompletionError> {
        let endpoint = config
            .endpoint("api/chat")
            .map_err(|e| CompletionError::Config(e.to_string()))?;

        Ok(Self {
            endpoint,
            model: config.model.clone(),
            http: JsonClient::new(config.timeout(), config.retry_attempts),
        })
    }
}

impl ChatCompleter for OllamaChatClient {
    #[inline]
    fn complete(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<String, CompletionError> {
        let request_json = serde_json::to_string(&ChatRequest {
            model: &self.model,
            messages,
            stream: false,
            options: ChatOptions { temperature },
        })
        .map_err(|e| CompletionError::MalformedResponse(e.to_string()))?;

        debug!("Requesting chat reply from {} ({})", self.endpoint, self.model);
        let response_text = self.http.post_json(&self.endpoint, &request_json)?;
        let response: ChatResponse = serde_json::from_str(&response_text)
            .map_err(|e| CompletionError::MalformedResponse(e.to_string()))?;

        non_empty(response.message.and_then(|message| message.content))
    }
}
