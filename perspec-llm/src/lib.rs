//! LLM integration for Perspec.
//!
//! [`traits::LlmClient`] is the provider seam, [`openai::OpenAiClient`] the
//! only implementation (any chat-completions compatible endpoint works).
//! [`prompts::PromptBook`] holds the per-use-case templates and parameters,
//! and [`gateway::PromptedGateway`] combines both into the fail-soft
//! [`gateway::LlmGateway`] the pipeline talks to.
//!
//! # Examples
//! ```no_run
//! use perspec_config::LlmConfig;
//! use perspec_llm::connect;
//!
//! let cfg = LlmConfig::default();
//! let gateway = connect(&cfg, "sk-...").expect("valid endpoint");
//! # let _ = gateway;
//! ```
pub mod gateway;
pub mod openai;
pub mod prompts;
pub mod streaming;
pub mod traits;

use gateway::PromptedGateway;
use openai::OpenAiClient;
use perspec_config::{LlmConfig, LlmProvider};
use prompts::PromptBook;
use std::sync::Arc;
use traits::{LlmClient, LlmError};

pub use gateway::{LlmGateway, Subject};
pub use traits::{CompletionRequest, LlmResponse, TextStream};

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// Build the client for the configured provider.
pub fn build_client(cfg: &LlmConfig, api_key: &str) -> Result<Arc<dyn LlmClient>, LlmError> {
    match cfg.provider {
        LlmProvider::Openai => {
            let model = if cfg.model.trim().is_empty() {
                DEFAULT_OPENAI_MODEL.to_string()
            } else {
                cfg.model.clone()
            };
            let client = OpenAiClient::new(api_key.to_string(), &cfg.endpoint, model)?;
            Ok(Arc::new(client))
        }
    }
}

/// Client plus prompt book, ready for the pipeline.
pub fn connect(cfg: &LlmConfig, api_key: &str) -> Result<PromptedGateway, LlmError> {
    let client = build_client(cfg, api_key)?;
    let book = PromptBook::new(client.model_name()).with_overrides(&cfg.overrides);
    tracing::info!(model = client.model_name(), endpoint = %cfg.endpoint, "llm.ready");
    Ok(PromptedGateway::new(client, book))
}
