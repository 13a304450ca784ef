//! Shared types for the CryptoSage bot.
//!
//! These types form the data model used across all modules so that the
//! adapters, the validation pipeline, and the HTTP surface can depend on
//! them without circular references.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

/// Structured verdict produced by the market analyzer for one claim.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub has_due_date: bool,
    /// ISO-8601 due date. Only set when `has_due_date` holds and the
    /// oracle's date string could be parsed.
    pub due_date: Option<String>,
    pub has_two_outcomes: bool,
    /// Outcome labels reported by the oracle (at most two).
    pub outcomes: Vec<String>,
    /// Final verdict.
    pub is_valid: bool,
}

impl fmt::Display for AnalysisResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "valid={} due={} binary={} outcomes=[{}]",
            self.is_valid,
            self.due_date.as_deref().unwrap_or("-"),
            self.has_two_outcomes,
            self.outcomes.join(", "),
        )
    }
}

impl AnalysisResult {
    /// Both structural checks passed (due date + binary outcome).
    pub fn is_structurally_valid(&self) -> bool {
        self.has_due_date && self.has_two_outcomes
    }
}

/// Pipeline stage an audit record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    StructuralExtraction,
    Skipped,
    EvidenceGathering,
    Verdict,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineStage::StructuralExtraction => write!(f, "structural extraction"),
            PipelineStage::Skipped => write!(f, "skipped"),
            PipelineStage::EvidenceGathering => write!(f, "evidence gathering"),
            PipelineStage::Verdict => write!(f, "verdict"),
        }
    }
}

/// One audit entry per pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// 1-based position in the trail.
    pub step_number: u32,
    pub stage: PipelineStage,
    pub input: serde_json::Value,
    pub output: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl fmt::Display for StepRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error {
            Some(e) => write!(f, "#{} {} failed: {}", self.step_number, self.stage, e),
            None => write!(f, "#{} {} -> {}", self.step_number, self.stage, self.output),
        }
    }
}

impl StepRecord {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// How the verdict oracle's free-text answer is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerdictMode {
    /// Accept any reply containing "true" (case-insensitive).
    #[default]
    Permissive,
    /// Accept only a reply that is exactly "true" after trimming.
    Strict,
}

impl VerdictMode {
    /// Interpret an oracle reply as a boolean verdict.
    pub fn interpret(&self, reply: &str) -> bool {
        let normalized = reply.trim().to_lowercase();
        match self {
            VerdictMode::Permissive => normalized.contains("true"),
            VerdictMode::Strict => {
                normalized.trim_matches(|c: char| c == '"' || c == '\'' || c == '.') == "true"
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Evidence
// ---------------------------------------------------------------------------

/// A single web-search hit.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub content: String,
}

// ---------------------------------------------------------------------------
// Social
// ---------------------------------------------------------------------------

/// A reply under a tracked thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub id: String,
    pub text: String,
    pub author_id: String,
    pub created_at: DateTime<Utc>,
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] @{} {}: {}",
            self.created_at.format("%Y-%m-%d %H:%M"),
            self.author_id,
            self.id,
            self.text,
        )
    }
}

/// One page of replies plus the provider's continuation cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyPage {
    pub replies: Vec<Reply>,
    pub next_cursor: Option<String>,
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Parameters for an on-chain bet contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetRequest {
    pub message: String,
    /// Stake token address (zero address for the native coin).
    pub token: String,
    pub min_value: Decimal,
    /// Address allowed to set the result.
    pub judge: String,
    /// Bet closes at this UNIX timestamp (seconds).
    pub end_time: i64,
}

impl fmt::Display for BetRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "\"{}\" token={} min={} judge={} ends={}",
            self.message, self.token, self.min_value, self.judge, self.end_time,
        )
    }
}

/// Settled outcome of a bet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BetOutcome {
    Yes,
    No,
}

impl BetOutcome {
    /// Code passed to the contract's result setter.
    pub fn code(&self) -> u8 {
        match self {
            BetOutcome::Yes => 1,
            BetOutcome::No => 2,
        }
    }

    pub fn from_verdict(verdict: bool) -> Self {
        if verdict {
            BetOutcome::Yes
        } else {
            BetOutcome::No
        }
    }
}

impl fmt::Display for BetOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BetOutcome::Yes => write!(f, "YES"),
            BetOutcome::No => write!(f, "NO"),
        }
    }
}

/// A bet created by the bot, tracked until it has been judged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetRecord {
    pub address: String,
    pub message: String,
    pub end_time: i64,
    pub source_reply_id: String,
    #[serde(default)]
    pub judged: bool,
    #[serde(default)]
    pub outcome: Option<BetOutcome>,
}

impl BetRecord {
    /// Whether the bet has closed and still awaits a result.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        !self.judged && self.end_time < now.timestamp()
    }
}

// ---------------------------------------------------------------------------
// Poller
// ---------------------------------------------------------------------------

/// Lifecycle of the reply poller task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Idle,
    Running,
    StopRequested,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Idle => write!(f, "IDLE"),
            TaskStatus::Running => write!(f, "RUNNING"),
            TaskStatus::StopRequested => write!(f, "STOP_REQUESTED"),
        }
    }
}

/// Summary of a single polling cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollReport {
    pub cycle_number: u64,
    pub threads_scanned: usize,
    pub replies_seen: usize,
    pub replies_skipped: usize,
    pub claims_analyzed: usize,
    pub claims_valid: usize,
    pub bets_created: usize,
    pub failures: usize,
    /// The cycle was cut short by a stop request.
    pub interrupted: bool,
}

impl fmt::Display for PollReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Cycle #{}: threads={} replies={} skipped={} analyzed={} valid={} bets={} failures={}{}",
            self.cycle_number,
            self.threads_scanned,
            self.replies_seen,
            self.replies_skipped,
            self.claims_analyzed,
            self.claims_valid,
            self.bets_created,
            self.failures,
            if self.interrupted { " (interrupted)" } else { "" },
        )
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for the validation pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Malformed oracle output ({message}): {cleaned}")]
    Parse { cleaned: String, message: String },

    #[error("Unparseable due date: {0}")]
    DateParse(String),

    #[error("Adapter error ({adapter}): {message}")]
    Adapter { adapter: String, message: String },

    #[error("{operation} failed after {attempts} attempts: {message}")]
    TransientPost {
        operation: String,
        attempts: u32,
        message: String,
    },

    #[error("Reply poller is already running")]
    AlreadyRunning,
}

impl PipelineError {
    pub fn adapter(adapter: &str, err: impl fmt::Display) -> Self {
        PipelineError::Adapter {
            adapter: adapter.to_string(),
            message: err.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
