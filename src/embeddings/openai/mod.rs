
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::{Embedder, EmbeddingError, model_id};
use crate::config::{EmbeddingConfig, Provider};
use crate::http::{JsonClient, api_key_from_env};

/// Client for OpenAI-compatible `/v1/embeddings` endpoints
#[derive(Debug, Clone)]
pub struct OpenAiEmbeddingClient {
    endpoint: Url,
    models_endpoint: Url,
    model: String,
    model_id: String,
    batch_size: u32,
    http: JsonClient,
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiEmbeddingClient {
    /// Create a client, reading the API key from `config.api_key_env`
    #[inline]
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let api_key = api_key_from_env(&config.api_key_env)
            .ok_or_else(|| EmbeddingError::MissingApiKey(config.api_key_env.clone()))?;
        Self::with_api_key(config, api_key)
    }

    #[inline]
    pub fn with_api_key(config: &EmbeddingConfig, api_key: String) -> Result<Self, EmbeddingError> {
        let base = config
            .base_url()
            .map_err(|e| EmbeddingError::Config(e.to_string()))?;
        let join = |path: &str| {
            base.join(path)
                .map_err(|e| EmbeddingError::Config(format!("Failed to build URL: {e}")))
        };

        Ok(Self {
            endpoint: join("v1/embeddings")?,
            models_endpoint: join("v1/models")?,
            model: config.model.clone(),
            model_id: model_id(Provider::OpenAi, &config.model),
            batch_size: config.batch_size.max(1),
            http: JsonClient::new(config.timeout(), config.retry_attempts)
                .with_bearer_token(api_key),
        })
    }

    /// Check that the service accepts the key and serves the configured model
    #[inline]
    pub fn health_check(&self) -> Result<(), EmbeddingError> {
        debug!("Performing health check at {}", self.models_endpoint);

        let response_text = self.http.get(&self.models_endpoint)?;
        let models: ModelList = serde_json::from_str(&response_text)
            .map_err(|e| EmbeddingError::MalformedResponse(e.to_string()))?;

        if models.data.iter().any(|m| m.id == self.model) {
            Ok(())
        } else {
            Err(EmbeddingError::Config(format!(
                "Model '{}' is not offered by {}",
                self.model, self.models_endpoint
            )))
        }
    }

    fn embed_single_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let request_json = serde_json::to_string(&EmbeddingsRequest {
            model: &self.model,
            input: texts,
        })
        .map_err(|e| EmbeddingError::MalformedResponse(e.to_string()))?;

        let response_text = self.http.post_json(&self.endpoint, &request_json)?;
        let mut response: EmbeddingsResponse = serde_json::from_str(&response_text)
            .map_err(|e| EmbeddingError::MalformedResponse(e.to_string()))?;

        if response.data.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: texts.len(),
                actual: response.data.len(),
            });
        }

        // The API may return items out of order; `index` refers to the input position
        response.data.sort_by_key(|item| item.index);
        if response
            .data
            .iter()
            .enumerate()
            .any(|(position, item)| item.index != position)
        {
            return Err(EmbeddingError::MalformedResponse(
                "embedding indices do not cover the request".to_string(),
            ));
        }

        let vectors: Vec<Vec<f32>> = response.data.into_iter().map(|d| d.embedding).collect();
        if vectors.iter().any(Vec::is_empty) {
            return Err(EmbeddingError::EmptyVector);
        }
        Ok(vectors)
    }
}

impl Embedder for OpenAiEmbeddingClient {
    #[inline]
    fn model_id(&self) -> &str {
        &self.model_id
    }

    #[inline]
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.embed_single_batch(&[text.to_string()])?;
        vectors.pop().ok_or(EmbeddingError::EmptyVector)
    }

    #[inline]
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        debug!("Requesting {} embeddings from {}", texts.len(), self.endpoint);
        let mut results = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size as usize) {
            results.extend(self.embed_single_batch(chunk)?);
        }
        Ok(results)
    }
}
