//! LLM integration for claim extraction and judgment.
//!
//! Defines the `ReasoningOracle` trait and provides implementations for
//! GPT (OpenAI) and Claude (Anthropic), plus the prompt templates and the
//! structured-output parser shared by every pipeline step.

pub mod anthropic;
pub mod openai;
pub mod prompts;
pub mod structured;

use anyhow::Result;
use async_trait::async_trait;
use secrecy::SecretString;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::LlmConfig;

/// Abstraction over a text-completion model.
///
/// Implementors send a single user prompt and return the raw reply.
/// Replies are usually JSON, sometimes wrapped in code fences.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReasoningOracle: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Build the configured oracle.
pub fn build_oracle(cfg: &LlmConfig, api_key: SecretString) -> Result<Arc<dyn ReasoningOracle>> {
    let oracle: Arc<dyn ReasoningOracle> = match cfg.provider.as_str() {
        "anthropic" => {
            let client = anthropic::AnthropicClient::new(api_key, cfg.model.clone(), cfg.max_tokens)?;
            info!(model = client.model_name(), "Using Anthropic LLM provider");
            Arc::new(client)
        }
        other => {
            if other != "openai" {
                warn!(provider = other, "Unknown LLM provider, defaulting to OpenAI");
            }
            let client = openai::OpenAiClient::new(api_key, cfg.model.clone(), cfg.max_tokens)?;
            info!(model = client.model_name(), "Using OpenAI LLM provider");
            Arc::new(client)
        }
    };
    Ok(oracle)
}
