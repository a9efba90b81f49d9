use async_trait::async_trait;
use futures::Stream;
use perspec_common::{Failure, FailureKind};
use perspec_http::HttpError;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// Incremental completion text. Lazy, finite, and not restartable.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub text: String,
    pub model: Option<String>,
    pub tokens_used: Option<u32>,
}

/// A single completion call, fully parameterised.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub system_prompt: Option<String>,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub presence_penalty: Option<f32>,
    pub frequency_penalty: Option<f32>,
}

#[derive(thiserror::Error, Debug)]
pub enum LlmError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Malformed response: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<HttpError> for LlmError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Api {
                status, message, ..
            } if status.as_u16() == 429 => LlmError::RateLimit(message),
            HttpError::Api {
                status, message, ..
            } => LlmError::Api {
                status: status.as_u16(),
                message,
            },
            HttpError::Network(m) => LlmError::Network(m),
            HttpError::Timeout(m) => LlmError::Timeout(m),
            HttpError::Decode(e, snippet) => LlmError::Decode(format!("{e} ({snippet})")),
            HttpError::Url(m) | HttpError::Build(m) => LlmError::Config(m),
        }
    }
}

impl LlmError {
    pub fn to_failure(&self) -> Failure {
        let kind = match self {
            LlmError::Network(_) => FailureKind::Network,
            LlmError::Timeout(_) => FailureKind::Timeout,
            LlmError::Api { status: 404, .. } => FailureKind::NotFound,
            LlmError::Api { .. } => FailureKind::Upstream,
            LlmError::RateLimit(_) => FailureKind::RateLimited,
            LlmError::Decode(_) => FailureKind::Malformed,
            LlmError::Config(_) => FailureKind::Configuration,
        };
        Failure::new(kind, self.to_string())
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Run a completion and wait for the whole answer.
    async fn complete(&self, req: &CompletionRequest) -> Result<LlmResponse, LlmError>;

    /// Run a completion and hand back text deltas as they arrive.
    async fn complete_stream(&self, req: &CompletionRequest) -> Result<TextStream, LlmError>;

    /// Check if the LLM service is reachable with the configured key.
    async fn health_check(&self) -> bool;

    /// Default model for requests built from configuration.
    fn model_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use perspec_http::HttpError;

    #[test]
    fn http_429_becomes_rate_limit() {
        let err = LlmError::from(HttpError::Api {
            status: reqwest_status(429),
            message: "slow down".into(),
            request_id: "-".into(),
        });
        assert!(matches!(err, LlmError::RateLimit(ref m) if m == "slow down"));
        assert_eq!(err.to_failure().kind, FailureKind::RateLimited);
    }

    #[test]
    fn server_errors_are_upstream_failures() {
        let err = LlmError::from(HttpError::Api {
            status: reqwest_status(503),
            message: "overloaded".into(),
            request_id: "-".into(),
        });
        assert_eq!(err.to_failure().kind, FailureKind::Upstream);
    }

    fn reqwest_status(code: u16) -> perspec_http::StatusCode {
        perspec_http::StatusCode::from_u16(code).unwrap()
    }
}
