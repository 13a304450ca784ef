//! Anthropic Claude LLM integration.
//!
//! Implements the `ReasoningOracle` trait using the Anthropic Messages API.
//! Handles request construction, response text extraction, usage tracking,
//! and rate limiting with exponential backoff.

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

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Maximum retries on rate limit / server errors.
const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff (ms).
const BASE_BACKOFF_MS: u64 = 1000;

const SYSTEM_PROMPT: &str = "You analyse betting propositions for an on-chain betting bot. \
    Follow the requested output format exactly. When JSON is requested, output only the JSON \
    object.";

// ---------------------------------------------------------------------------
// API types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct AnthropicClient {
    http: Client,
    api_key: SecretString,
    model: String,
    max_tokens: u32,
    total_tokens: AtomicU64,
    total_calls: AtomicU64,
}

impl AnthropicClient {
    pub fn new(api_key: SecretString, model: Option<String>, max_tokens: Option<u32>) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .context("Failed to build Anthropic HTTP client")?;

        Ok(Self {
            http,
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            total_tokens: AtomicU64::new(0),
            total_calls: AtomicU64::new(0),
        })
    }

    fn build_request(&self, user_message: &str) -> MessagesRequest {
        MessagesRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages: vec![Message {
                role: "user".to_string(),
                content: user_message.to_string(),
            }],
            system: Some(SYSTEM_PROMPT.to_string()),
        }
    }

    /// Concatenate the text blocks of a Messages API response.
    fn extract_text(body: &MessagesResponse) -> String {
        body.content.iter()
            .filter_map(|b| b.text.as_deref())
            .collect::<Vec<_>>()
            .join("")
    }

    /// Send a messages request with retry + backoff.
    async fn call_api(&self, user_message: &str) -> Result<String> {
        let request = self.build_request(user_message);
        let mut last_error = None;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let delay = BASE_BACKOFF_MS * 2u64.pow(attempt - 1);
                debug!(attempt, delay_ms = delay, "Retrying Anthropic API call");
                tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
            }

            let resp = self.http
                .post(ANTHROPIC_API_URL)
                .header("x-api-key", self.api_key.expose_secret())
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json")
                .json(&request)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let body: MessagesResponse = response.json().await
                            .context("Failed to parse Anthropic response")?;

                        let text = Self::extract_text(&body);
                        let tokens = body.usage
                            .map(|u| u.input_tokens + u.output_tokens)
                            .unwrap_or(0);

                        self.total_tokens.fetch_add(tokens, Ordering::Relaxed);
                        self.total_calls.fetch_add(1, Ordering::Relaxed);
                        debug!(
                            tokens,
                            total_tokens = self.total_tokens(),
                            total_calls = self.total_calls(),
                            "Anthropic usage"
                        );

                        return Ok(text);
                    }

                    // Retryable errors: 429 (rate limit), 500+, 529 (overloaded)
                    if status.as_u16() == 429 || status.as_u16() >= 500 {
                        let error_text = response.text().await.unwrap_or_default();
                        warn!(status = %status, attempt, error = %error_text, "Retryable Anthropic API error");
                        last_error = Some(format!("HTTP {status}: {error_text}"));
                        continue;
                    }

                    let error_text = response.text().await.unwrap_or_default();
                    anyhow::bail!("Anthropic API error {status}: {error_text}");
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Anthropic request failed");
                    last_error = Some(format!("Request error: {e}"));
                    continue;
                }
            }
        }

        anyhow::bail!(
            "Anthropic API failed after {} retries: {}",
            MAX_RETRIES,
            last_error.unwrap_or_default()
        )
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }

    /// Total tokens consumed across all calls.
    pub fn total_tokens(&self) -> u64 {
        self.total_tokens.load(Ordering::Relaxed)
    }

    /// Total number of API calls made.
    pub fn total_calls(&self) -> u64 {
        self.total_calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ReasoningOracle for AnthropicClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        debug!(model = %self.model, prompt_len = prompt.len(), "Anthropic completion");
        self.call_api(prompt).await.context("Anthropic completion failed")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
