use crate::streaming::text_stream;
use crate::traits::{CompletionRequest, LlmClient, LlmError, LlmResponse, TextStream};
use async_trait::async_trait;
use perspec_http::{Auth, HttpClient, RequestOpts};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const STREAM_TIMEOUT: Duration = Duration::from_secs(120);

pub struct OpenAiClient {
    client: HttpClient,
    api_key: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

impl<'a> ChatRequest<'a> {
    fn from_completion(req: &'a CompletionRequest, stream: bool) -> Self {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = req.system_prompt.as_deref() {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &req.prompt,
        });
        Self {
            model: &req.model,
            messages,
            temperature: req.temperature,
            max_tokens: req.max_tokens,
            presence_penalty: req.presence_penalty,
            frequency_penalty: req.frequency_penalty,
            stream,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    total_tokens: Option<u32>,
}

impl OpenAiClient {
    /// Create a client for any endpoint that speaks the chat completions API.
    pub fn new(api_key: String, endpoint: &str, model: String) -> Result<Self, LlmError> {
        let client = HttpClient::new(endpoint)
            .map_err(|e| LlmError::Config(format!("HttpClient init failed: {e}")))?;

        Ok(Self {
            client,
            api_key,
            model,
        })
    }

    /// Replace the HTTP client (timeouts, retry budget).
    pub fn with_http(mut self, client: HttpClient) -> Self {
        self.client = client;
        self
    }

    fn opts(&self) -> RequestOpts<'_> {
        RequestOpts {
            auth: Some(Auth::Bearer(&self.api_key)),
            ..Default::default()
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, req: &CompletionRequest) -> Result<LlmResponse, LlmError> {
        tracing::debug!(
            model = %req.model,
            max_tokens = req.max_tokens,
            temperature = req.temperature,
            prompt_chars = req.prompt.len(),
            "llm.complete.start"
        );

        let body = ChatRequest::from_completion(req, false);
        let resp: ChatResponse = self
            .client
            .post_json("chat/completions", &body, self.opts())
            .await?;

        let text = resp
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        tracing::debug!(chars = text.len(), "llm.complete.done");
        Ok(LlmResponse {
            text,
            model: resp.model,
            tokens_used: resp.usage.and_then(|u| u.total_tokens),
        })
    }

    async fn complete_stream(&self, req: &CompletionRequest) -> Result<TextStream, LlmError> {
        tracing::debug!(model = %req.model, max_tokens = req.max_tokens, "llm.stream.start");

        let body = ChatRequest::from_completion(req, true);
        let bytes = self
            .client
            .post_stream(
                "chat/completions",
                &body,
                RequestOpts {
                    timeout: Some(STREAM_TIMEOUT),
                    ..self.opts()
                },
            )
            .await?;
        Ok(text_stream(bytes))
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn health_check(&self) -> bool {
        match self
            .client
            .get_json::<serde_json::Value>(
                "models",
                RequestOpts {
                    timeout: Some(Duration::from_secs(5)),
                    retries: Some(0),
                    ..self.opts()
                },
            )
            .await
        {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %e, "llm.health_check.failed");
                false
            }
        }
    }
}
