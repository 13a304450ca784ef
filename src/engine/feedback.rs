//! User feedback on claim validation.
//!
//! Feedback is kept in a bounded ring buffer; the oldest entry is dropped
//! once capacity is reached. `improve` asks the oracle to condense recent
//! feedback into a summary and a revised validation prompt.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::RwLock;
use tracing::info;

use crate::llm::{prompts, structured, ReasoningOracle};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackEntry {
    pub text: String,
    pub submitted_at: DateTime<Utc>,
}

/// Oracle digest of collected feedback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackDigest {
    pub feedback_summary: String,
    pub improved_prompt: String,
}

pub struct FeedbackDesk {
    capacity: usize,
    entries: RwLock<VecDeque<FeedbackEntry>>,
}

impl FeedbackDesk {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: RwLock::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Store a feedback entry, evicting the oldest when full. Returns the new length.
    pub async fn submit(&self, text: &str) -> usize {
        let mut entries = self.entries.write().await;
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(FeedbackEntry {
            text: text.trim().to_string(),
            submitted_at: Utc::now(),
        });
        entries.len()
    }

    /// Entries in submission order, oldest first.
    pub async fn recent(&self) -> Vec<FeedbackEntry> {
        self.entries.read().await.iter().cloned().collect()
    }

    pub async fn improve(&self, oracle: &dyn ReasoningOracle) -> Result<FeedbackDigest> {
        let texts: Vec<String> = self.recent().await.into_iter().map(|e| e.text).collect();
        if texts.is_empty() {
            anyhow::bail!("No feedback collected yet");
        }

        let raw = oracle
            .complete(&prompts::feedback_prompt(&texts))
            .await
            .context("Feedback oracle call failed")?;
        let digest: FeedbackDigest = structured::parse_as(&raw)?;

        info!(entries = texts.len(), summary = %digest.feedback_summary, "Feedback condensed");
        Ok(digest)
    }
}
