//! Deterministic in-memory services for integration testing.
//!
//! Each mock implements one of the crate's adapter traits and records what
//! it was asked to do, so tests can drive the analyzer, poller and settler
//! end to end without any network access.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use cryptosage::data::EvidenceSearch;
use cryptosage::llm::ReasoningOracle;
use cryptosage::social::SocialFeed;
use cryptosage::types::{Reply, ReplyPage, SearchResult};

// ---------------------------------------------------------------------------
// Oracle
// ---------------------------------------------------------------------------

/// Answers prompts by keyword. The first rule whose needle appears in the
/// prompt wins; unmatched prompts fail.
pub struct ScriptedOracle {
    rules: Vec<(String, String)>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self { rules: Vec::new(), prompts: Mutex::new(Vec::new()) }
    }

    pub fn on(mut self, needle: &str, answer: &str) -> Self {
        self.rules.push((needle.to_string(), answer.to_string()));
        self
    }

    /// Extraction for a well-formed binary claim, verdict "true".
    pub fn bettable(due_date: &str) -> Self {
        Self::new()
            .on("has_due_date", &extraction(true, due_date))
            .on("Relevant Information", "true")
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

pub fn extraction(has_due_date: bool, due_date: &str) -> String {
    format!(
        "```json\n{{\"has_due_date\": {has_due_date}, \"due_date\": \"{due_date}\", \
         \"has_two_outcomes\": true, \"outcomes\": [\"Yes\", \"No\"]}}\n```"
    )
}

#[async_trait]
impl ReasoningOracle for ScriptedOracle {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.rules
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map(|(_, answer)| answer.clone())
            .ok_or_else(|| anyhow!("no scripted answer for prompt"))
    }
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

pub struct StaticSearch {
    hits: Vec<SearchResult>,
    calls: AtomicUsize,
}

impl StaticSearch {
    pub fn new(hits: Vec<SearchResult>) -> Self {
        Self { hits, calls: AtomicUsize::new(0) }
    }

    pub fn bitcoin() -> Self {
        Self::new(vec![
            SearchResult {
                title: "BTC price".into(),
                url: "https://news.example/btc".into(),
                content: "Bitcoin traded above $42,000 on Tuesday.".into(),
            },
            SearchResult {
                title: "Market wrap".into(),
                url: "https://markets.example/wrap".into(),
                content: "Crypto markets rallied.".into(),
            },
        ])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EvidenceSearch for StaticSearch {
    async fn search(&self, _query: &str) -> Result<Vec<SearchResult>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.hits.clone())
    }
}

// ---------------------------------------------------------------------------
// Social feed
// ---------------------------------------------------------------------------

/// A single account with scripted threads and paged replies.
///
/// Pages are keyed by `(thread_id, cursor)`; the first page uses an empty
/// cursor. A page scripted as `Err` fails that fetch.
pub struct ScriptedFeed {
    threads: Vec<String>,
    pages: Mutex<HashMap<(String, String), Result<ReplyPage, String>>>,
    /// Number of upcoming `post_reply` calls that should fail.
    post_failures: AtomicUsize,
    posted: Mutex<Vec<(String, String)>>,
    statuses: Mutex<Vec<String>>,
    fetches: Mutex<Vec<(String, DateTime<Utc>)>>,
}

impl ScriptedFeed {
    pub fn new(threads: &[&str]) -> Self {
        Self {
            threads: threads.iter().map(|t| t.to_string()).collect(),
            pages: Mutex::new(HashMap::new()),
            post_failures: AtomicUsize::new(0),
            posted: Mutex::new(Vec::new()),
            statuses: Mutex::new(Vec::new()),
            fetches: Mutex::new(Vec::new()),
        }
    }

    pub fn page(self, thread: &str, cursor: &str, replies: Vec<Reply>, next: Option<&str>) -> Self {
        self.pages.lock().unwrap().insert(
            (thread.to_string(), cursor.to_string()),
            Ok(ReplyPage { replies, next_cursor: next.map(str::to_string) }),
        );
        self
    }

    pub fn failing_page(self, thread: &str, cursor: &str, message: &str) -> Self {
        self.pages
            .lock()
            .unwrap()
            .insert((thread.to_string(), cursor.to_string()), Err(message.to_string()));
        self
    }

    pub fn fail_next_posts(&self, n: usize) {
        self.post_failures.store(n, Ordering::SeqCst);
    }

    pub fn posted(&self) -> Vec<(String, String)> {
        self.posted.lock().unwrap().clone()
    }

    pub fn statuses(&self) -> Vec<String> {
        self.statuses.lock().unwrap().clone()
    }

    /// `(thread_id, since)` of every fetch, in order.
    pub fn fetches(&self) -> Vec<(String, DateTime<Utc>)> {
        self.fetches.lock().unwrap().clone()
    }
}

pub fn reply(id: &str, author: &str, text: &str, created_at: DateTime<Utc>) -> Reply {
    Reply {
        id: id.to_string(),
        text: text.to_string(),
        author_id: author.to_string(),
        created_at,
    }
}

#[async_trait]
impl SocialFeed for ScriptedFeed {
    async fn recent_threads(&self, _account_id: &str) -> Result<Vec<String>> {
        Ok(self.threads.clone())
    }

    async fn fetch_replies(
        &self,
        thread_id: &str,
        since: DateTime<Utc>,
        cursor: Option<String>,
    ) -> Result<ReplyPage> {
        self.fetches.lock().unwrap().push((thread_id.to_string(), since));
        let key = (thread_id.to_string(), cursor.unwrap_or_default());
        match self.pages.lock().unwrap().get(&key) {
            Some(Ok(page)) => Ok(ReplyPage {
                replies: page.replies.iter().filter(|r| r.created_at > since).cloned().collect(),
                next_cursor: page.next_cursor.clone(),
            }),
            Some(Err(message)) => Err(anyhow!("{message}")),
            None => Ok(ReplyPage::default()),
        }
    }

    async fn post_reply(&self, reply_id: &str, text: &str) -> Result<()> {
        let pending = self.post_failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.post_failures.store(pending - 1, Ordering::SeqCst);
            return Err(anyhow!("503 Service Unavailable"));
        }
        self.posted.lock().unwrap().push((reply_id.to_string(), text.to_string()));
        Ok(())
    }

    async fn post_status(&self, text: &str) -> Result<()> {
        self.statuses.lock().unwrap().push(text.to_string());
        Ok(())
    }
}
