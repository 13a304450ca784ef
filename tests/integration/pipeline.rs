//! Claim validation, settlement and outreach through the public API.

use chrono::{TimeZone, Utc};
use std::sync::Arc;

use cryptosage::engine::feedback::FeedbackDesk;
use cryptosage::engine::introduction;
use cryptosage::engine::settler::Settler;
use cryptosage::engine::MarketAnalyzer;
use cryptosage::ledger::DryRunLedger;
use cryptosage::storage::{self, MemoryStore};
use cryptosage::types::{BetOutcome, BetRecord, PipelineStage, VerdictMode};

use crate::mock_services::{extraction, ScriptedFeed, ScriptedOracle, StaticSearch};

const BITCOIN_CLAIM: &str = "Bitcoin will be above $40,000 on November 18, 2024 at 3:30 PM UTC";

#[tokio::test]
async fn test_bitcoin_claim_is_bettable() {
    let oracle = Arc::new(ScriptedOracle::bettable("November 18, 2024 3:30 PM UTC"));
    let search = Arc::new(StaticSearch::bitcoin());
    let analyzer = MarketAnalyzer::new(oracle.clone(), search.clone(), VerdictMode::Permissive);

    let analysis = analyzer.analyze(BITCOIN_CLAIM).await;

    assert!(analysis.result.is_valid);
    assert_eq!(analysis.result.due_date.as_deref(), Some("2024-11-18T15:30:00"));
    assert_eq!(analysis.result.outcomes, vec!["Yes", "No"]);

    let stages: Vec<_> = analysis.steps.iter().map(|s| s.stage).collect();
    assert_eq!(
        stages,
        vec![
            PipelineStage::StructuralExtraction,
            PipelineStage::EvidenceGathering,
            PipelineStage::Verdict,
        ]
    );
    assert!(analysis.steps.iter().all(|s| !s.is_error()));
    assert_eq!(
        analysis.steps.iter().map(|s| s.step_number).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );

    let urls = &analysis.steps[1].output["urls"];
    assert_eq!(urls[0], "https://news.example/btc");
    assert_eq!(search.calls(), 1);

    // The verdict prompt carries the joined evidence.
    let prompts = oracle.prompts();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[1].contains("Bitcoin traded above $42,000 on Tuesday. Crypto markets rallied."));
}

#[tokio::test]
async fn test_claim_without_due_date_stops_at_gate() {
    let oracle = Arc::new(
        ScriptedOracle::new().on(
            "has_due_date",
            r#"{"has_due_date": false, "due_date": null, "has_two_outcomes": true, "outcomes": ["Yes", "No"]}"#,
        ),
    );
    let search = Arc::new(StaticSearch::bitcoin());
    let analyzer = MarketAnalyzer::new(oracle.clone(), search.clone(), VerdictMode::Permissive);

    let analysis = analyzer.analyze("Bitcoin will moon eventually").await;

    assert!(!analysis.result.is_valid);
    assert_eq!(analysis.steps.len(), 1);
    assert_eq!(analysis.steps[0].stage, PipelineStage::Skipped);
    assert_eq!(analysis.steps[0].output["reason"], "no resolvable due date");
    assert_eq!(search.calls(), 0);
    assert_eq!(oracle.prompts().len(), 1);
}

#[tokio::test]
async fn test_unparseable_due_date_downgrades() {
    let oracle = Arc::new(
        ScriptedOracle::new()
            .on("has_due_date", &extraction(true, "when pigs fly"))
            .on("Relevant Information", "true"),
    );
    let search = Arc::new(StaticSearch::bitcoin());
    let analyzer = MarketAnalyzer::new(oracle, search.clone(), VerdictMode::Permissive);

    let analysis = analyzer.analyze("Bitcoin above $40k when pigs fly").await;

    assert!(!analysis.result.has_due_date);
    assert!(analysis.result.due_date.is_none());
    assert!(!analysis.result.is_valid);
    assert_eq!(analysis.steps[0].stage, PipelineStage::Skipped);
    assert_eq!(search.calls(), 0);
}

#[tokio::test]
async fn test_unrealistic_claim_rejected_by_verdict() {
    let oracle = Arc::new(
        ScriptedOracle::new()
            .on("has_due_date", &extraction(true, "2024-11-18"))
            .on("Relevant Information", "false. Nothing supports this."),
    );
    let analyzer = MarketAnalyzer::new(oracle, Arc::new(StaticSearch::bitcoin()), VerdictMode::Permissive);

    let analysis = analyzer.analyze("Bitcoin will reach $10M on Nov 18, 2024").await;

    assert!(analysis.result.is_structurally_valid());
    assert!(!analysis.result.is_valid);
    assert_eq!(analysis.steps.len(), 3);
    assert_eq!(analysis.steps[2].output["is_valid"], false);
}

#[tokio::test]
async fn test_strict_mode_rejects_hedged_verdict() {
    let oracle = Arc::new(
        ScriptedOracle::new()
            .on("has_due_date", &extraction(true, "2024-11-18"))
            .on("Relevant Information", "probably true, but unclear"),
    );
    let search = Arc::new(StaticSearch::bitcoin());

    let permissive = MarketAnalyzer::new(oracle.clone(), search.clone(), VerdictMode::Permissive);
    let strict = MarketAnalyzer::new(oracle, search, VerdictMode::Strict);

    assert!(permissive.analyze(BITCOIN_CLAIM).await.result.is_valid);
    assert!(!strict.analyze(BITCOIN_CLAIM).await.result.is_valid);
}

#[tokio::test]
async fn test_malformed_extraction_yields_error_record() {
    let oracle = Arc::new(ScriptedOracle::new().on("has_due_date", "Sure! Here is the analysis."));
    let analyzer = MarketAnalyzer::new(oracle, Arc::new(StaticSearch::bitcoin()), VerdictMode::Permissive);

    let analysis = analyzer.analyze(BITCOIN_CLAIM).await;

    assert!(!analysis.result.is_valid);
    assert_eq!(analysis.steps.len(), 1);
    assert_eq!(analysis.steps[0].stage, PipelineStage::StructuralExtraction);
    assert!(analysis.steps[0].is_error());
}

#[tokio::test]
async fn test_settle_expired_bets() {
    let oracle = Arc::new(ScriptedOracle::new().on("reached its due date", "true"));
    let ledger = Arc::new(DryRunLedger::new());
    let store = Arc::new(MemoryStore::new());

    let closed = BetRecord {
        address: "0xclosed".into(),
        message: BITCOIN_CLAIM.into(),
        end_time: Utc.with_ymd_and_hms(2024, 11, 18, 15, 30, 0).unwrap().timestamp(),
        source_reply_id: "r1".into(),
        judged: false,
        outcome: None,
    };
    let open = BetRecord {
        address: "0xopen".into(),
        end_time: Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap().timestamp(),
        ..closed.clone()
    };
    storage::register_bet(store.as_ref(), &closed).await.unwrap();
    storage::register_bet(store.as_ref(), &open).await.unwrap();

    let settler = Settler::new(
        oracle,
        Arc::new(StaticSearch::bitcoin()),
        ledger.clone(),
        store.clone(),
        VerdictMode::Permissive,
    );
    let now = Utc.with_ymd_and_hms(2024, 11, 20, 0, 0, 0).unwrap();

    assert_eq!(settler.settle_expired(now).await.unwrap(), 1);
    assert_eq!(ledger.settled(), vec![("0xclosed".to_string(), BetOutcome::Yes)]);

    let bets = storage::load_bets(store.as_ref()).await.unwrap();
    let judged = bets.iter().find(|b| b.address == "0xclosed").unwrap();
    assert!(judged.judged);
    assert_eq!(judged.outcome, Some(BetOutcome::Yes));

    // A second sweep finds nothing left to do.
    assert_eq!(settler.settle_expired(now).await.unwrap(), 0);
    assert_eq!(ledger.settled().len(), 1);
}

#[tokio::test]
async fn test_introduction_posts_tweet() {
    let oracle = ScriptedOracle::new().on("IDENTITY", r#"{"tweet": "CryptoSage here. Bring me your boldest bets!"}"#);
    let feed = ScriptedFeed::new(&[]);

    let tweet = introduction::introduce(&oracle, &feed).await.unwrap();

    assert_eq!(tweet, "CryptoSage here. Bring me your boldest bets!");
    assert_eq!(feed.statuses(), vec![tweet]);
}

#[tokio::test]
async fn test_feedback_digest() {
    let oracle = ScriptedOracle::new().on(
        "User Feedback",
        r#"{"feedback_summary": "Users want explicit timezones.", "improved_prompt": "Always state the timezone."}"#,
    );
    let desk = FeedbackDesk::new(5);
    desk.submit("Say which timezone the deadline is in").await;
    desk.submit("UTC please").await;

    let digest = desk.improve(&oracle).await.unwrap();

    assert_eq!(digest.feedback_summary, "Users want explicit timezones.");
    assert_eq!(digest.improved_prompt, "Always state the timezone.");
    let prompt = &oracle.prompts()[0];
    assert!(prompt.contains("Say which timezone the deadline is in"));
    assert!(prompt.contains("UTC please"));
}

#[tokio::test]
async fn test_analysis_is_deterministic() {
    let analyzer = MarketAnalyzer::new(
        Arc::new(ScriptedOracle::bettable("2024-11-18T15:30:00")),
        Arc::new(StaticSearch::bitcoin()),
        VerdictMode::Permissive,
    );

    let first = analyzer.analyze(BITCOIN_CLAIM).await;
    let second = analyzer.analyze(BITCOIN_CLAIM).await;

    assert_eq!(first.result, second.result);
    assert_eq!(first.steps, second.steps);
}
