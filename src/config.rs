//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (API keys, bearer tokens) are referenced by env-var name in the
//! config and resolved at runtime. Every section has defaults so a partial
//! file is enough.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;
use std::time::Duration;

use crate::engine::retry::RetryPolicy;
use crate::types::VerdictMode;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub agent: AgentConfig,
    pub llm: LlmConfig,
    pub search: SearchConfig,
    pub social: SocialConfig,
    pub ledger: LedgerConfig,
    pub poller: PollerConfig,
    pub analyzer: AnalyzerConfig,
    pub storage: StorageConfig,
    pub api: ApiConfig,
    pub feedback: FeedbackConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AgentConfig {
    pub name: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self { name: "CryptoSage".into() }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LlmConfig {
    /// "openai" or "anthropic".
    pub provider: String,
    pub model: Option<String>,
    pub api_key_env: String,
    pub max_tokens: Option<u32>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".into(),
            model: None,
            api_key_env: "OPENAI_API_KEY".into(),
            max_tokens: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SearchConfig {
    pub api_key_env: String,
    pub search_depth: Option<String>,
    pub max_results: Option<u32>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key_env: "TAVILY_API_KEY".into(),
            search_depth: None,
            max_results: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SocialConfig {
    pub bearer_token_env: String,
    /// Account whose threads are polled for replies.
    pub account_id: String,
}

impl Default for SocialConfig {
    fn default() -> Self {
        Self {
            bearer_token_env: "TWITTER_BEARER_TOKEN".into(),
            account_id: String::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LedgerConfig {
    /// Stake token address; the zero address means the native coin.
    pub token: String,
    pub judge: String,
    pub min_value: Decimal,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            token: "0x0000000000000000000000000000000000000000".into(),
            judge: "0x0000000000000000000000000000000000000000".into(),
            min_value: Decimal::ONE,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 10_000,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PollerConfig {
    /// Prefix of the watermark keys in the store.
    pub namespace: String,
    pub poll_interval_secs: u64,
    pub error_backoff_secs: u64,
    pub seed_lookback_days: i64,
    /// Pause between reply pages.
    pub page_delay_ms: u64,
    /// Pause between processed replies.
    pub reply_delay_ms: u64,
    pub reply_retry: RetryConfig,
    /// Settlement sweep period; 0 disables the sweep.
    pub settle_interval_secs: u64,
    /// Start polling as soon as the process boots.
    pub autostart: bool,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            namespace: "csb_last_processed_time".into(),
            poll_interval_secs: 20,
            error_backoff_secs: 10,
            seed_lookback_days: 365,
            page_delay_ms: 1000,
            reply_delay_ms: 1000,
            reply_retry: RetryConfig::default(),
            settle_interval_secs: 600,
            autostart: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub verdict_mode: VerdictMode,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    /// JSON store file; `None` keeps state in memory only.
    pub path: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: Some(crate::storage::DEFAULT_STORE_FILE.into()),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ApiConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { enabled: true, port: 8080 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FeedbackConfig {
    /// Ring-buffer size for submitted feedback.
    pub capacity: usize,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self { capacity: 100 }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Resolve an environment variable name to its value.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }

    /// Resolve an environment variable into a secret.
    pub fn secret(env_name: &str) -> Result<SecretString> {
        Self::resolve_env(env_name).map(SecretString::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_empty_config_uses_defaults() {
        let cfg = AppConfig::parse("").unwrap();
        assert_eq!(cfg.agent.name, "CryptoSage");
        assert_eq!(cfg.llm.provider, "openai");
        assert_eq!(cfg.poller.namespace, "csb_last_processed_time");
        assert_eq!(cfg.poller.poll_interval_secs, 20);
        assert_eq!(cfg.poller.error_backoff_secs, 10);
        assert_eq!(cfg.poller.seed_lookback_days, 365);
        assert_eq!(cfg.analyzer.verdict_mode, VerdictMode::Permissive);
        assert_eq!(cfg.feedback.capacity, 100);
        assert!(cfg.api.enabled);
    }

    #[test]
    fn test_partial_sections() {
        let cfg = AppConfig::parse(
            r#"
            [llm]
            provider = "anthropic"
            api_key_env = "ANTHROPIC_API_KEY"

            [analyzer]
            verdict_mode = "strict"

            [ledger]
            min_value = 2.5

            [poller.reply_retry]
            max_attempts = 5
            "#,
        ).unwrap();
        assert_eq!(cfg.llm.provider, "anthropic");
        assert!(cfg.llm.model.is_none());
        assert_eq!(cfg.analyzer.verdict_mode, VerdictMode::Strict);
        assert_eq!(cfg.ledger.min_value, dec!(2.5));
        assert_eq!(cfg.poller.reply_retry.max_attempts, 5);
        assert_eq!(cfg.poller.reply_retry.base_delay_ms, 1000);
        assert_eq!(cfg.poller.poll_interval_secs, 20);
    }

    #[test]
    fn test_retry_policy_floor() {
        let policy = RetryConfig { max_attempts: 0, base_delay_ms: 10, max_delay_ms: 50 }.policy();
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.max_delay, Duration::from_millis(50));
    }

    #[test]
    fn test_load_repo_config() {
        let result = AppConfig::load("config.toml");
        if let Ok(cfg) = result {
            assert!(!cfg.poller.namespace.is_empty());
            assert!(cfg.feedback.capacity > 0);
        }
    }

    #[test]
    fn test_resolve_missing_env() {
        assert!(AppConfig::resolve_env("CRYPTOSAGE_DEFINITELY_UNSET_VAR").is_err());
    }
}
