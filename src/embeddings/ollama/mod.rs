
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use super::{Embedder, EmbeddingError, model_id};
use crate::config::{EmbeddingConfig, Provider};
use crate::http::JsonClient;

#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: Url,
    model: String,
    model_id: String,
    batch_size: u32,
    http: JsonClient,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
pub struct ModelInfo {
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

impl OllamaClient {
    #[inline]
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let base_url = config
            .base_url()
            .map_err(|e| EmbeddingError::Config(e.to_string()))?;

        Ok(Self {
            base_url,
            model: config.model.clone(),
            model_id: model_id(Provider::Ollama, &config.model),
            batch_size: config.batch_size.max(1),
            http: JsonClient::new(config.timeout(), config.retry_attempts),
        })
    }

    /// Test connection to the Ollama server and verify model availability
    #[inline]
    pub fn health_check(&self) -> Result<(), EmbeddingError> {
        debug!("Performing health check for Ollama at {}", self.base_url);

        let models = self.list_models()?;

        if models.iter().any(|m| m.name == self.model) {
            info!(
                "Health check passed for Ollama server at {} with model {}",
                self.base_url, self.model
            );
            Ok(())
        } else {
            let available_models: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
            warn!(
                "Model {} not found. Available models: {:?}",
                self.model, available_models
            );
            Err(EmbeddingError::Config(format!(
                "Model '{}' is not available. Available models: {:?}",
                self.model, available_models
            )))
        }
    }

    /// List all available models
    #[inline]
    pub fn list_models(&self) -> Result<Vec<ModelInfo>, EmbeddingError> {
        let url = self.endpoint("api/tags")?;
        debug!("Fetching available models from {}", url);

        let response_text = self.http.get(&url)?;
        let models_response: ModelsResponse = serde_json::from_str(&response_text)
            .map_err(|e| EmbeddingError::MalformedResponse(e.to_string()))?;

        debug!("Found {} models", models_response.models.len());
        Ok(models_response.models)
    }

    fn endpoint(&self, path: &str) -> Result<Url, EmbeddingError> {
        self.base_url
            .join(path)
            .map_err(|e| EmbeddingError::Config(format!("Failed to build URL: {e}")))
    }

    fn embed_single_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let request = EmbedRequest {
            model: &self.model,
            input: texts,
        };
        let request_json = serde_json::to_string(&request)
            .map_err(|e| EmbeddingError::MalformedResponse(e.to_string()))?;

        let url = self.endpoint("api/embed")?;
        let response_text = self.http.post_json(&url, &request_json)?;

        let response: EmbedResponse = serde_json::from_str(&response_text)
            .map_err(|e| EmbeddingError::MalformedResponse(e.to_string()))?;

        if response.embeddings.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: texts.len(),
                actual: response.embeddings.len(),
            });
        }
        if response.embeddings.iter().any(Vec::is_empty) {
            return Err(EmbeddingError::EmptyVector);
        }

        Ok(response.embeddings)
    }
}

impl Embedder for OllamaClient {
    #[inline]
    fn model_id(&self) -> &str {
        &self.model_id
    }

    #[inline]
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        debug!("Generating embedding for text (length: {})", text.len());
        let mut vectors = self.embed_single_batch(&[text.to_string()])?;
        vectors.pop().ok_or(EmbeddingError::EmptyVector)
    }

    #[inline]
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let mut results = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size as usize) {
            results.extend(self.embed_single_batch(chunk)?);
        }

        debug!("Generated {} embeddings total", results.len());
        Ok(results)
    }
}
