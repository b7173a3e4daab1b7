// Shared blocking HTTP transport for the embedding and generation clients


use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error, warn};
use url::Url;

const EXPONENTIAL_BACKOFF_BASE: u64 = 2;
const MAX_BACKOFF: Duration = Duration::from_secs(8);

/// Failure of a JSON request after retries were exhausted or deemed pointless
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Client error: HTTP {status}")]
    Client { status: u16 },
    #[error("Server error: HTTP {status}")]
    Server { status: u16 },
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Non-retryable error: {0}")]
    Other(String),
}

impl TransportError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Server { .. } | Self::Transport(_))
    }
}

impl From<ureq::Error> for TransportError {
    fn from(error: ureq::Error) -> Self {
        match error {
            ureq::Error::StatusCode(status) if status >= 500 => Self::Server { status },
            ureq::Error::StatusCode(status) => Self::Client { status },
            ureq::Error::ConnectionFailed
            | ureq::Error::HostNotFound
            | ureq::Error::Timeout(_)
            | ureq::Error::Io(_) => Self::Transport(error.to_string()),
            other => Self::Other(other.to_string()),
        }
    }
}

/// A ureq agent with a global timeout and capped exponential backoff retries
#[derive(Debug, Clone)]
pub struct JsonClient {
    agent: ureq::Agent,
    retry_attempts: u32,
    bearer_token: Option<String>,
}

impl JsonClient {
    #[inline]
    pub fn new(timeout: Duration, retry_attempts: u32) -> Self {
        Self {
            agent: build_agent(timeout),
            retry_attempts: retry_attempts.max(1),
            bearer_token: None,
        }
    }

    /// Send `Authorization: Bearer <token>` with every request
    #[inline]
    pub fn with_bearer_token(mut self, token: String) -> Self {
        self.bearer_token = Some(token);
        self
    }

    #[inline]
    pub fn retry_attempts(&self) -> u32 {
        self.retry_attempts
    }

    /// GET `url` and return the response body
    #[inline]
    pub fn get(&self, url: &Url) -> Result<String, TransportError> {
        self.with_retry(url, || {
            let mut request = self.agent.get(url.as_str());
            if let Some(token) = &self.bearer_token {
                request = request.header("Authorization", format!("Bearer {token}"));
            }
            request
                .call()
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
    }

    /// POST a JSON body to `url` and return the response body
    #[inline]
    pub fn post_json(&self, url: &Url, body: &str) -> Result<String, TransportError> {
        self.with_retry(url, || {
            let mut request = self
                .agent
                .post(url.as_str())
                .header("Content-Type", "application/json");
            if let Some(token) = &self.bearer_token {
                request = request.header("Authorization", format!("Bearer {token}"));
            }
            request
                .send(body)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
    }

    fn with_retry<F>(&self, url: &Url, mut request_fn: F) -> Result<String, TransportError>
    where
        F: FnMut() -> Result<String, ureq::Error>,
    {
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!("HTTP request attempt {}/{}", attempt, self.retry_attempts);

            match request_fn() {
                Ok(response_text) => {
                    debug!("Request succeeded on attempt {}", attempt);
                    return Ok(response_text);
                }
                Err(error) => {
                    let error = TransportError::from(error);
                    if !error.is_retryable() {
                        warn!("{}, not retrying", error);
                        return Err(error);
                    }

                    warn!("{}, attempt {}/{}", error, attempt, self.retry_attempts);
                    last_error = Some(error);

                    if attempt < self.retry_attempts {
                        let delay = backoff_delay(attempt);
                        debug!("Waiting {:?} before retry", delay);
                        std::thread::sleep(delay);
                    }
                }
            }
        }

        error!("All retry attempts failed for request to {}", url);

        Err(last_error
            .unwrap_or_else(|| TransportError::Other("Request failed after retries".to_string())))
    }
}

/// Non-blank API key held in the environment variable `variable`
pub(crate) fn api_key_from_env(variable: &str) -> Option<String> {
    std::env::var(variable)
        .ok()
        .filter(|key| !key.trim().is_empty())
}

fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into()
}

/// Delay before the retry following `attempt` (1-based)
fn backoff_delay(attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    Duration::from_millis(EXPONENTIAL_BACKOFF_BASE.pow(exponent) * 1000).min(MAX_BACKOFF)
}
