
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::corpus::CorpusConfig;
use crate::embeddings::chunking::ChunkingConfig;
use crate::engine::RetrievalConfig;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// Which HTTP API a client speaks
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Ollama native endpoints (`/api/embed`, `/api/chat`)
    Ollama,
    /// OpenAI-compatible endpoints (`/v1/embeddings`, `/v1/chat/completions`)
    OpenAi,
}

impl std::fmt::Display for Provider {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ollama => f.write_str("ollama"),
            Self::OpenAi => f.write_str("openai"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: Provider,
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub model: String,
    pub batch_size: u32,
    /// Environment variable holding the API key, read only for `openai`
    pub api_key_env: String,
    pub timeout_seconds: u64,
    pub retry_attempts: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: Provider::Ollama,
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            model: "nomic-embed-text:latest".to_string(),
            batch_size: 16,
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_seconds: 30,
            retry_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationConfig {
    pub provider: Provider,
    pub base_url: Url,
    pub model: String,
    pub api_key_env: String,
    pub temperature: f32,
    /// Subject the assistant declares expertise in, used in the system prompt
    pub domain: String,
    pub timeout_seconds: u64,
    pub retry_attempts: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: Provider::OpenAi,
            base_url: Url::parse("https://api.openai.com/v1/").expect("static URL is valid"),
            model: "gpt-3.5-turbo".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            temperature: 0.7,
            domain: "the indexed report".to_string(),
            timeout_seconds: 60,
            retry_attempts: 1,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(u32),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid timeout: {0} (must be between 1 and 600 seconds)")]
    InvalidTimeout(u64),
    #[error("Invalid retry attempts: {0} (must be between 1 and 10)")]
    InvalidRetryAttempts(u32),
    #[error("Invalid temperature: {0} (must be between 0.0 and 2.0)")]
    InvalidTemperature(f32),
    #[error("Invalid API key variable name: {0:?} (cannot be empty)")]
    InvalidApiKeyEnv(String),
    #[error("Invalid chunk size: {0} (must be between 100 and 8000 characters)")]
    InvalidChunkSize(usize),
    #[error("Chunk overlap ({0}) must be smaller than chunk size ({1})")]
    OverlapTooLarge(usize, usize),
    #[error("Invalid tokens per chunk: {0} (must be between 16 and 8192)")]
    InvalidTokensPerChunk(usize),
    #[error("Invalid token overlap ratio: {0} (must be in [0.0, 0.9])")]
    InvalidTokenOverlapRatio(f32),
    #[error("Invalid noise pattern {0:?}: {1}")]
    InvalidNoisePattern(String, String),
    #[error("Invalid top_k: {0} (must be between 1 and 100)")]
    InvalidTopK(usize),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Default for Config {
    #[inline]
    fn default() -> Self {
        Self {
            embedding: EmbeddingConfig::default(),
            generation: GenerationConfig::default(),
            chunking: ChunkingConfig::default(),
            corpus: CorpusConfig::default(),
            retrieval: RetrievalConfig::default(),
            base_dir: Self::config_dir().unwrap_or_else(|_| PathBuf::from(".report-qa")),
        }
    }
}

impl Config {
    /// Default base directory, `~/.report-qa`
    #[inline]
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::home_dir()
            .map(|home| home.join(".report-qa"))
            .or_else(|| dirs::data_dir().map(|data| data.join("report-qa")))
            .ok_or(ConfigError::DirectoryError)
    }

    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        if !config_path.exists() {
            return Ok(Self {
                base_dir: config_dir.as_ref().to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();
        config.generation.base_url = with_trailing_slash(config.generation.base_url);

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    /// Load from the default base directory
    #[inline]
    pub fn load_default() -> Result<Self> {
        let dir = Self::config_dir().context("Failed to locate configuration directory")?;
        Self::load(dir)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    /// Get the base directory for the application
    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.embedding.validate()?;
        self.generation.validate()?;
        self.chunking.validate()?;
        self.corpus.validate()?;
        self.retrieval.validate()?;
        Ok(())
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join("config.toml")
    }

    /// Directory holding persisted indexes, one file per document
    #[inline]
    pub fn index_dir_path(&self) -> PathBuf {
        self.get_base_dir().join("indexes")
    }
}

fn validate_protocol(protocol: &str) -> Result<(), ConfigError> {
    if protocol != "http" && protocol != "https" {
        return Err(ConfigError::InvalidProtocol(protocol.to_string()));
    }
    Ok(())
}

// Relative joins drop the last segment unless the path ends with '/'
fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn validate_transport(timeout_seconds: u64, retry_attempts: u32) -> Result<(), ConfigError> {
    if !(1..=600).contains(&timeout_seconds) {
        return Err(ConfigError::InvalidTimeout(timeout_seconds));
    }
    if !(1..=10).contains(&retry_attempts) {
        return Err(ConfigError::InvalidRetryAttempts(retry_attempts));
    }
    Ok(())
}

impl EmbeddingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_protocol(&self.protocol)?;
        self.base_url()?;

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        if self.batch_size == 0 || self.batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }

        if self.provider == Provider::OpenAi && self.api_key_env.trim().is_empty() {
            return Err(ConfigError::InvalidApiKeyEnv(self.api_key_env.clone()));
        }

        validate_transport(self.timeout_seconds, self.retry_attempts)
    }

    pub fn base_url(&self) -> Result<Url, ConfigError> {
        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn set_protocol(&mut self, protocol: String) -> Result<(), ConfigError> {
        validate_protocol(&protocol)?;
        self.protocol = protocol;
        Ok(())
    }

    pub fn set_host(&mut self, host: String) -> Result<(), ConfigError> {
        let temp_config = EmbeddingConfig {
            host: host.clone(),
            ..self.clone()
        };
        temp_config.base_url()?;
        self.host = host;
        Ok(())
    }

    pub fn set_port(&mut self, port: u16) -> Result<(), ConfigError> {
        if port == 0 {
            return Err(ConfigError::InvalidPort(port));
        }
        self.port = port;
        Ok(())
    }

    pub fn set_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(model));
        }
        self.model = model;
        Ok(())
    }

    pub fn set_batch_size(&mut self, batch_size: u32) -> Result<(), ConfigError> {
        if batch_size == 0 || batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(batch_size));
        }
        self.batch_size = batch_size;
        Ok(())
    }
}

impl GenerationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_protocol(self.base_url.scheme())?;

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::InvalidTemperature(self.temperature));
        }

        if self.provider == Provider::OpenAi && self.api_key_env.trim().is_empty() {
            return Err(ConfigError::InvalidApiKeyEnv(self.api_key_env.clone()));
        }

        validate_transport(self.timeout_seconds, self.retry_attempts)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn set_base_url(&mut self, base_url: &str) -> Result<(), ConfigError> {
        let url = Url::parse(base_url).map_err(|_| ConfigError::InvalidUrl(base_url.to_string()))?;
        validate_protocol(url.scheme())?;
        self.base_url = with_trailing_slash(url);
        Ok(())
    }

    /// Resolve `path` below `base_url`, keeping its last segment
    #[inline]
    pub fn endpoint(&self, path: &str) -> Result<Url, ConfigError> {
        let base = with_trailing_slash(self.base_url.clone());
        base.join(path)
            .map_err(|_| ConfigError::InvalidUrl(format!("{base}{path}")))
    }

    pub fn set_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(model));
        }
        self.model = model;
        Ok(())
    }

    pub fn set_temperature(&mut self, temperature: f32) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ConfigError::InvalidTemperature(temperature));
        }
        self.temperature = temperature;
        Ok(())
    }
}
