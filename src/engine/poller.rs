//! Reply poller.
//!
//! Walks the replies under the account's recent threads, skips anything
//! at or before the thread's persisted watermark, runs new claims through
//! the analyzer and, for valid ones, creates a bet and answers the reply
//! with its address.
//!
//! Cancellation is checked before every thread and every reply. A stop
//! that lands mid-thread leaves that thread's watermark untouched so the
//! remaining replies are picked up on the next run.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::{LedgerConfig, PollerConfig};
use crate::engine::analyzer::MarketAnalyzer;
use crate::engine::dates;
use crate::engine::retry::RetryPolicy;
use crate::engine::task::PollerHandle;
use crate::ledger::LedgerService;
use crate::llm::prompts;
use crate::social::{self, SocialFeed};
use crate::storage::{self, KeyValueStore};
use crate::types::{AnalysisResult, BetRecord, BetRequest, PipelineError, PollReport, Reply};

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Fixed terms applied to every bet the poller creates.
#[derive(Debug, Clone)]
pub struct BetTerms {
    pub token: String,
    pub judge: String,
    pub min_value: Decimal,
}

#[derive(Debug, Clone)]
pub struct PollerSettings {
    pub namespace: String,
    pub poll_interval: Duration,
    pub error_backoff: Duration,
    pub seed_lookback_days: i64,
    pub page_delay: Duration,
    pub reply_delay: Duration,
    pub reply_retry: RetryPolicy,
    pub terms: BetTerms,
}

impl PollerSettings {
    pub fn from_config(poller: &PollerConfig, ledger: &LedgerConfig) -> Self {
        Self {
            namespace: poller.namespace.clone(),
            poll_interval: Duration::from_secs(poller.poll_interval_secs),
            error_backoff: Duration::from_secs(poller.error_backoff_secs),
            seed_lookback_days: poller.seed_lookback_days,
            page_delay: Duration::from_millis(poller.page_delay_ms),
            reply_delay: Duration::from_millis(poller.reply_delay_ms),
            reply_retry: poller.reply_retry.policy(),
            terms: BetTerms {
                token: ledger.token.clone(),
                judge: ledger.judge.clone(),
                min_value: ledger.min_value,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Poller
// ---------------------------------------------------------------------------

pub struct ReplyPoller {
    analyzer: Arc<MarketAnalyzer>,
    feed: Arc<dyn SocialFeed>,
    ledger: Arc<dyn LedgerService>,
    store: Arc<dyn KeyValueStore>,
    settings: PollerSettings,
    cycles: AtomicU64,
    last_report: RwLock<Option<PollReport>>,
}

impl ReplyPoller {
    pub fn new(
        analyzer: Arc<MarketAnalyzer>,
        feed: Arc<dyn SocialFeed>,
        ledger: Arc<dyn LedgerService>,
        store: Arc<dyn KeyValueStore>,
        settings: PollerSettings,
    ) -> Self {
        Self {
            analyzer,
            feed,
            ledger,
            store,
            settings,
            cycles: AtomicU64::new(0),
            last_report: RwLock::new(None),
        }
    }

    pub async fn last_report(&self) -> Option<PollReport> {
        self.last_report.read().await.clone()
    }

    /// Poll until stopped. Fails when the handle is already running.
    pub async fn run(&self, account_id: &str, handle: &PollerHandle) -> Result<(), PipelineError> {
        handle.try_start()?;
        self.run_loop(account_id, handle).await;
        Ok(())
    }

    /// Claim the handle and poll on a background task.
    pub fn spawn(
        self: Arc<Self>,
        account_id: String,
        handle: PollerHandle,
    ) -> Result<JoinHandle<()>, PipelineError> {
        handle.try_start()?;
        Ok(tokio::spawn(async move {
            self.run_loop(&account_id, &handle).await;
        }))
    }

    async fn run_loop(&self, account_id: &str, handle: &PollerHandle) {
        info!(account_id, interval_secs = self.settings.poll_interval.as_secs(), "Reply poller started");

        while !handle.is_cancelled() {
            let pause = match self.poll_once(account_id, handle).await {
                Ok(report) => {
                    info!(report = %report, "Poll cycle complete");
                    let interrupted = report.interrupted;
                    *self.last_report.write().await = Some(report);
                    if interrupted {
                        break;
                    }
                    self.settings.poll_interval
                }
                Err(e) => {
                    error!(error = %format!("{e:#}"), "Poll cycle failed, backing off");
                    self.settings.error_backoff
                }
            };
            if !handle.sleep(pause).await {
                break;
            }
        }

        handle.finish();
        info!(account_id, "Reply poller stopped");
    }

    /// One pass over every tracked thread.
    pub async fn poll_once(&self, account_id: &str, handle: &PollerHandle) -> Result<PollReport> {
        let mut report = PollReport {
            cycle_number: self.cycles.fetch_add(1, Ordering::Relaxed) + 1,
            ..Default::default()
        };

        let threads = self.feed
            .recent_threads(account_id)
            .await
            .context("Failed to list tracked threads")?;
        debug!(threads = threads.len(), "Tracked threads");

        for thread_id in &threads {
            if handle.is_cancelled() {
                report.interrupted = true;
                break;
            }
            let completed = self.process_thread(account_id, thread_id, handle, &mut report).await?;
            report.threads_scanned += 1;
            if !completed {
                report.interrupted = true;
                break;
            }
        }

        Ok(report)
    }

    /// Process one thread. Returns false when stopped before the end.
    async fn process_thread(
        &self,
        account_id: &str,
        thread_id: &str,
        handle: &PollerHandle,
        report: &mut PollReport,
    ) -> Result<bool> {
        let ns = &self.settings.namespace;
        let watermark = storage::load_watermark(
            self.store.as_ref(),
            ns,
            thread_id,
            Utc::now(),
            self.settings.seed_lookback_days,
        )
        .await?;
        let mut newest = watermark;

        let mut pages = std::pin::pin!(social::reply_pages(self.feed.as_ref(), thread_id, watermark));
        while let Some(page) = pages.next().await {
            let page = match page {
                Ok(page) => page,
                Err(e) => {
                    warn!(thread_id, error = %format!("{e:#}"), "Reply page fetch failed, ending thread");
                    report.failures += 1;
                    break;
                }
            };
            let more = page.next_cursor.is_some();

            for reply in &page.replies {
                if handle.is_cancelled() {
                    debug!(thread_id, "Stop requested mid-thread");
                    // Watermark stays put: replies handled in this pass are seen again next run.
                    return Ok(false);
                }
                report.replies_seen += 1;
                if reply.created_at <= watermark {
                    report.replies_skipped += 1;
                    continue;
                }
                newest = newest.max(reply.created_at);

                self.process_reply(account_id, reply, report).await;
                if !handle.sleep(self.settings.reply_delay).await {
                    return Ok(false);
                }
            }

            if more && !handle.sleep(self.settings.page_delay).await {
                return Ok(false);
            }
        }

        let advanced = advance_watermark(watermark, newest, Utc::now());
        storage::save_watermark(self.store.as_ref(), ns, thread_id, advanced).await?;
        debug!(thread_id, watermark = %advanced, "Watermark advanced");
        Ok(true)
    }

    async fn process_reply(&self, account_id: &str, reply: &Reply, report: &mut PollReport) {
        if reply.author_id == account_id {
            report.replies_skipped += 1;
            return;
        }
        let claim = social::strip_mentions(&reply.text);
        if claim.is_empty() {
            report.replies_skipped += 1;
            return;
        }

        report.claims_analyzed += 1;
        let analysis = self.analyzer.analyze(&claim).await;
        if !analysis.result.is_valid {
            debug!(reply_id = %reply.id, result = %analysis.result, "Claim not bettable");
            return;
        }
        report.claims_valid += 1;

        let address = match self.create_bet(&claim, reply, &analysis.result).await {
            Ok(address) => address,
            Err(e) => {
                warn!(reply_id = %reply.id, error = %format!("{e:#}"), "Bet creation failed");
                report.failures += 1;
                return;
            }
        };
        report.bets_created += 1;

        let text = prompts::bet_created_reply(&address);
        let posted = self.settings.reply_retry
            .retry("post_reply", || self.feed.post_reply(&reply.id, &text))
            .await;
        if let Err(e) = posted {
            warn!(reply_id = %reply.id, address = %address, error = %e, "Acknowledgement not posted");
            report.failures += 1;
        }
    }

    async fn create_bet(&self, claim: &str, reply: &Reply, result: &AnalysisResult) -> Result<String> {
        let end_time = result.due_date
            .as_deref()
            .and_then(dates::due_date_to_unix)
            .ok_or_else(|| PipelineError::DateParse(result.due_date.clone().unwrap_or_default()))?;

        let terms = &self.settings.terms;
        let request = BetRequest {
            message: claim.to_string(),
            token: terms.token.clone(),
            min_value: terms.min_value,
            judge: terms.judge.clone(),
            end_time,
        };
        let address = self.ledger.create_bet(request).await.context("Ledger create_bet failed")?;
        info!(reply_id = %reply.id, address = %address, end_time, "Bet created");

        let record = BetRecord {
            address: address.clone(),
            message: claim.to_string(),
            end_time,
            source_reply_id: reply.id.clone(),
            judged: false,
            outcome: None,
        };
        if let Err(e) = storage::register_bet(self.store.as_ref(), &record).await {
            warn!(address = %address, error = %e, "Bet not registered for settlement");
        }
        Ok(address)
    }
}

/// New watermark after a full pass: never behind the old one or any processed reply.
pub fn advance_watermark(
    previous: DateTime<Utc>,
    newest_processed: DateTime<Utc>,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    now.max(previous).max(newest_processed)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
