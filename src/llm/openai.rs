//! OpenAI chat-completions integration.
//!
//! Implements the `ReasoningOracle` trait against the OpenAI Chat
//! Completions API with retry on rate limits and server errors.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

use super::ReasoningOracle;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_MAX_TOKENS: u32 = 1024;

const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 1000;

const SYSTEM_PROMPT: &str = "You are CryptoSage, an assistant that analyses betting \
    propositions. Follow the requested output format exactly and add no extra commentary.";

// ---------------------------------------------------------------------------
// API types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    total_tokens: u64,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct OpenAiClient {
    http: Client,
    api_key: SecretString,
    model: String,
    max_tokens: u32,
    total_tokens: AtomicU64,
    total_calls: AtomicU64,
}

impl OpenAiClient {
    pub fn new(api_key: SecretString, model: Option<String>, max_tokens: Option<u32>) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .context("Failed to build OpenAI HTTP client")?;

        Ok(Self {
            http,
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            total_tokens: AtomicU64::new(0),
            total_calls: AtomicU64::new(0),
        })
    }

    fn build_request(&self, user_message: &str) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_message.to_string(),
                },
            ],
        }
    }

    async fn call_api(&self, user_message: &str) -> Result<String> {
        let request = self.build_request(user_message);
        let mut last_error = None;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let delay = BASE_BACKOFF_MS * 2u64.pow(attempt - 1);
                debug!(attempt, delay_ms = delay, "Retrying OpenAI API call");
                tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
            }

            let resp = self.http
                .post(OPENAI_API_URL)
                .header("Authorization", format!("Bearer {}", self.api_key.expose_secret()))
                .header("Content-Type", "application/json")
                .json(&request)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let body: ChatResponse = response.json().await
                            .context("Failed to parse OpenAI response")?;

                        let text = body.choices.first()
                            .and_then(|c| c.message.as_ref())
                            .map(|m| m.content.clone())
                            .unwrap_or_default();

                        let tokens = body.usage.map(|u| u.total_tokens).unwrap_or(0);
                        self.total_tokens.fetch_add(tokens, Ordering::Relaxed);
                        self.total_calls.fetch_add(1, Ordering::Relaxed);
                        debug!(
                            tokens,
                            total_tokens = self.total_tokens(),
                            total_calls = self.total_calls(),
                            "OpenAI usage"
                        );

                        return Ok(text);
                    }

                    if status.as_u16() == 429 || status.as_u16() >= 500 {
                        let error_text = response.text().await.unwrap_or_default();
                        warn!(status = %status, attempt, "Retryable OpenAI error");
                        last_error = Some(format!("HTTP {status}: {error_text}"));
                        continue;
                    }

                    let error_text = response.text().await.unwrap_or_default();
                    anyhow::bail!("OpenAI API error {status}: {error_text}");
                }
                Err(e) => {
                    warn!(attempt, error = %e, "OpenAI request failed");
                    last_error = Some(format!("Request error: {e}"));
                    continue;
                }
            }
        }

        anyhow::bail!("OpenAI API failed after {MAX_RETRIES} retries: {}", last_error.unwrap_or_default())
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }

    pub fn total_tokens(&self) -> u64 {
        self.total_tokens.load(Ordering::Relaxed)
    }

    pub fn total_calls(&self) -> u64 {
        self.total_calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ReasoningOracle for OpenAiClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        debug!(model = %self.model, prompt_len = prompt.len(), "OpenAI completion");
        self.call_api(prompt).await.context("OpenAI completion failed")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
