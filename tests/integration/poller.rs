//! Reply poller cycles against a scripted feed and the dry-run ledger.

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

use cryptosage::engine::poller::BetTerms;
use cryptosage::engine::retry::RetryPolicy;
use cryptosage::engine::{MarketAnalyzer, PollerHandle, PollerSettings, ReplyPoller};
use cryptosage::ledger::DryRunLedger;
use cryptosage::storage::{self, KeyValueStore, MemoryStore};
use cryptosage::types::{TaskStatus, VerdictMode};

use crate::mock_services::{reply, ScriptedFeed, ScriptedOracle, StaticSearch};

const ACCOUNT: &str = "cryptosage_bot";
const NAMESPACE: &str = "csb_test";

struct Harness {
    poller: Arc<ReplyPoller>,
    feed: Arc<ScriptedFeed>,
    ledger: Arc<DryRunLedger>,
    store: Arc<MemoryStore>,
}

fn settings() -> PollerSettings {
    PollerSettings {
        namespace: NAMESPACE.into(),
        poll_interval: Duration::from_secs(60),
        error_backoff: Duration::from_secs(60),
        seed_lookback_days: 365,
        page_delay: Duration::ZERO,
        reply_delay: Duration::ZERO,
        reply_retry: RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        },
        terms: BetTerms {
            token: "0x0000000000000000000000000000000000000000".into(),
            judge: "0x00000000000000000000000000000000000000aa".into(),
            min_value: Decimal::ONE,
        },
    }
}

fn harness(feed: ScriptedFeed) -> Harness {
    let oracle = Arc::new(ScriptedOracle::bettable("2024-11-18T15:30:00"));
    let analyzer = Arc::new(MarketAnalyzer::new(
        oracle,
        Arc::new(StaticSearch::bitcoin()),
        VerdictMode::Permissive,
    ));
    let feed = Arc::new(feed);
    let ledger = Arc::new(DryRunLedger::new());
    let store = Arc::new(MemoryStore::new());
    let poller = Arc::new(ReplyPoller::new(
        analyzer,
        feed.clone(),
        ledger.clone(),
        store.clone(),
        settings(),
    ));
    Harness { poller, feed, ledger, store }
}

fn an_hour_ago() -> DateTime<Utc> {
    Utc::now() - ChronoDuration::hours(1)
}

/// One claim, one own reply, and a mention-only reply on a second page.
fn busy_thread() -> ScriptedFeed {
    ScriptedFeed::new(&["t1"])
        .page(
            "t1",
            "",
            vec![
                reply("r1", "alice", "@cryptosage_bot Bitcoin above $40k on Nov 18, 2024 3:30 PM", an_hour_ago()),
                reply("r2", ACCOUNT, "Thanks for playing!", an_hour_ago()),
            ],
            Some("c2"),
        )
        .page("t1", "c2", vec![reply("r3", "bob", "@cryptosage_bot", an_hour_ago())], None)
}

async fn watermark(store: &MemoryStore, thread: &str) -> Option<String> {
    store.get(&storage::watermark_key(NAMESPACE, thread)).await.unwrap()
}

#[tokio::test]
async fn test_poll_creates_bet_and_acknowledges() {
    let h = harness(busy_thread());
    let handle = PollerHandle::new();

    let report = h.poller.poll_once(ACCOUNT, &handle).await.unwrap();

    assert_eq!(report.cycle_number, 1);
    assert_eq!(report.threads_scanned, 1);
    assert_eq!(report.replies_seen, 3);
    assert_eq!(report.replies_skipped, 2);
    assert_eq!(report.claims_analyzed, 1);
    assert_eq!(report.claims_valid, 1);
    assert_eq!(report.bets_created, 1);
    assert_eq!(report.failures, 0);
    assert!(!report.interrupted);

    let created = h.ledger.created();
    assert_eq!(created.len(), 1);
    let (address, request) = &created[0];
    assert_eq!(request.message, "Bitcoin above $40k on Nov 18, 2024 3:30 PM");
    assert_eq!(
        request.end_time,
        Utc.with_ymd_and_hms(2024, 11, 18, 15, 30, 0).unwrap().timestamp()
    );
    assert_eq!(request.min_value, Decimal::ONE);

    let posted = h.feed.posted();
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0].0, "r1");
    assert!(posted[0].1.ends_with(address.as_str()));

    let bets = storage::load_bets(h.store.as_ref()).await.unwrap();
    assert_eq!(bets.len(), 1);
    assert_eq!(bets[0].source_reply_id, "r1");
    assert!(!bets[0].judged);
}

#[tokio::test]
async fn test_watermark_prevents_reprocessing() {
    let h = harness(busy_thread());
    let handle = PollerHandle::new();
    let started = Utc::now();

    h.poller.poll_once(ACCOUNT, &handle).await.unwrap();
    assert!(watermark(&h.store, "t1").await.is_some());

    let second = h.poller.poll_once(ACCOUNT, &handle).await.unwrap();
    assert_eq!(second.cycle_number, 2);
    assert_eq!(second.bets_created, 0);
    assert_eq!(h.ledger.created().len(), 1);
    assert_eq!(h.feed.posted().len(), 1);

    // First fetch starts from the seeded lookback, the next from the advanced watermark.
    let fetches = h.feed.fetches();
    assert!(fetches[0].1 < started - ChronoDuration::days(364));
    let last = fetches.last().unwrap();
    assert!(last.1 >= started);
}

#[tokio::test]
async fn test_transient_post_failure_is_retried() {
    let h = harness(busy_thread());
    h.feed.fail_next_posts(2);

    let report = h.poller.poll_once(ACCOUNT, &PollerHandle::new()).await.unwrap();

    assert_eq!(report.bets_created, 1);
    assert_eq!(report.failures, 0);
    assert_eq!(h.feed.posted().len(), 1);
}

#[tokio::test]
async fn test_exhausted_post_retries_counted_as_failure() {
    let h = harness(busy_thread());
    h.feed.fail_next_posts(10);

    let report = h.poller.poll_once(ACCOUNT, &PollerHandle::new()).await.unwrap();

    assert_eq!(report.bets_created, 1);
    assert_eq!(report.failures, 1);
    assert!(h.feed.posted().is_empty());
    // The thread still completes.
    assert!(watermark(&h.store, "t1").await.is_some());
}

#[tokio::test]
async fn test_page_error_ends_thread_but_advances_watermark() {
    let feed = ScriptedFeed::new(&["broken", "t2"])
        .failing_page("broken", "", "429 Too Many Requests")
        .page(
            "t2",
            "",
            vec![reply("r9", "carol", "ETH above $3k on 2024-12-01?", an_hour_ago())],
            None,
        );
    let h = harness(feed);
    let before = Utc::now();

    let report = h.poller.poll_once(ACCOUNT, &PollerHandle::new()).await.unwrap();

    assert_eq!(report.threads_scanned, 2);
    assert_eq!(report.failures, 1);
    assert_eq!(report.bets_created, 1);

    let raw = watermark(&h.store, "broken").await.unwrap();
    let secs: f64 = raw.parse().unwrap();
    assert!(secs >= before.timestamp() as f64);
}

#[tokio::test]
async fn test_spawned_poller_stops_on_cancel() {
    let h = harness(busy_thread());
    let handle = PollerHandle::new();

    let task = h.poller.clone().spawn(ACCOUNT.into(), handle.clone()).unwrap();
    assert!(h.poller.clone().spawn(ACCOUNT.into(), handle.clone()).is_err());

    for _ in 0..200 {
        if h.poller.last_report().await.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(h.poller.last_report().await.unwrap().bets_created, 1);

    assert!(handle.cancel());
    tokio::time::timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
    assert_eq!(handle.status(), TaskStatus::Idle);

    // The handle can be claimed again once idle.
    assert!(handle.try_start().is_ok());
    handle.finish();
}
