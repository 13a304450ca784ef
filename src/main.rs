//! CryptoSage: on-chain betting bot.
//!
//! Entry point. Loads configuration, initialises structured logging,
//! wires the adapters into the analyzer, poller and settler, serves the
//! HTTP API and runs until Ctrl+C.

use anyhow::Result;
use chrono::Utc;
use secrecy::SecretString;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use cryptosage::api::{self, ApiContext};
use cryptosage::config::AppConfig;
use cryptosage::data::tavily::TavilySearch;
use cryptosage::data::EvidenceSearch;
use cryptosage::engine::feedback::FeedbackDesk;
use cryptosage::engine::settler::Settler;
use cryptosage::engine::{MarketAnalyzer, PollerHandle, PollerSettings, ReplyPoller};
use cryptosage::ledger::{DryRunLedger, LedgerService};
use cryptosage::llm;
use cryptosage::social::twitter::TwitterClient;
use cryptosage::social::SocialFeed;
use cryptosage::storage::{JsonFileStore, KeyValueStore, MemoryStore};

const BANNER: &str = r#"
  ____                  _        ____
 / ___|_ __ _   _ _ __ | |_ ___ / ___|  __ _  __ _  ___
| |   | '__| | | | '_ \| __/ _ \\___ \ / _` |/ _` |/ _ \
| |___| |  | |_| | |_) | || (_) |___) | (_| | (_| |  __/
 \____|_|   \__, | .__/ \__\___/|____/ \__,_|\__, |\___|
            |___/|_|                         |___/
  v0.1.0 - claims in, bets out
"#;

const DEFAULT_CONFIG: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path = std::env::var("CRYPTOSAGE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG.into());
    let cfg = if Path::new(&config_path).exists() {
        AppConfig::load(&config_path)?
    } else {
        AppConfig::default()
    };

    init_logging();

    println!("{BANNER}");
    info!(
        agent_name = %cfg.agent.name,
        config = %config_path,
        provider = %cfg.llm.provider,
        verdict_mode = ?cfg.analyzer.verdict_mode,
        "CryptoSage starting up"
    );

    // -- Adapters --------------------------------------------------------

    let oracle = llm::build_oracle(&cfg.llm, secret_or_empty(&cfg.llm.api_key_env))?;

    let search: Arc<dyn EvidenceSearch> = Arc::new(TavilySearch::new(
        secret_or_empty(&cfg.search.api_key_env),
        cfg.search.search_depth.clone(),
        cfg.search.max_results,
    )?);

    let feed: Arc<dyn SocialFeed> =
        Arc::new(TwitterClient::new(secret_or_empty(&cfg.social.bearer_token_env))?);

    // Contract deployment is not wired up; every bet goes through the dry-run ledger.
    let ledger: Arc<dyn LedgerService> = Arc::new(DryRunLedger::new());

    let store: Arc<dyn KeyValueStore> = match &cfg.storage.path {
        Some(path) => Arc::new(JsonFileStore::open(path)?),
        None => {
            warn!("No storage path configured, watermarks will not survive a restart");
            Arc::new(MemoryStore::new())
        }
    };

    // -- Engine ----------------------------------------------------------

    let analyzer = Arc::new(MarketAnalyzer::new(
        oracle.clone(),
        search.clone(),
        cfg.analyzer.verdict_mode,
    ));
    let poller = Arc::new(ReplyPoller::new(
        analyzer.clone(),
        feed.clone(),
        ledger.clone(),
        store.clone(),
        PollerSettings::from_config(&cfg.poller, &cfg.ledger),
    ));
    let settler = Arc::new(Settler::new(
        oracle.clone(),
        search.clone(),
        ledger.clone(),
        store.clone(),
        cfg.analyzer.verdict_mode,
    ));
    let feedback = Arc::new(FeedbackDesk::new(cfg.feedback.capacity));
    let handle = PollerHandle::new();

    // -- Background tasks ------------------------------------------------

    if cfg.api.enabled {
        let state = Arc::new(ApiContext {
            analyzer: analyzer.clone(),
            poller: poller.clone(),
            handle: handle.clone(),
            account_id: cfg.social.account_id.clone(),
            feed: feed.clone(),
            oracle: oracle.clone(),
            settler: settler.clone(),
            feedback: feedback.clone(),
        });
        let port = cfg.api.port;
        tokio::spawn(async move {
            if let Err(e) = api::serve(state, port).await {
                error!(error = %format!("{e:#}"), "API server stopped");
            }
        });
    }

    if cfg.poller.autostart {
        if cfg.social.account_id.is_empty() {
            warn!("poller.autostart is set but social.account_id is empty; not starting");
        } else {
            poller.clone().spawn(cfg.social.account_id.clone(), handle.clone())?;
        }
    }

    if cfg.poller.settle_interval_secs > 0 {
        let settler = settler.clone();
        let every = Duration::from_secs(cfg.poller.settle_interval_secs);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                match settler.settle_expired(Utc::now()).await {
                    Ok(0) => {}
                    Ok(n) => info!(settled = n, "Settlement sweep complete"),
                    Err(e) => error!(error = %format!("{e:#}"), "Settlement sweep failed"),
                }
            }
        });
    }

    // -- Wait for shutdown -----------------------------------------------

    info!("Running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received.");

    if handle.cancel() {
        for _ in 0..100 {
            if !handle.is_running() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    if let Some(report) = poller.last_report().await {
        info!(report = %report, "Last poll cycle");
    }
    info!("CryptoSage shut down cleanly.");
    Ok(())
}

/// Resolve a secret, falling back to an empty key so the bot can still
/// start and serve the API; calls needing the key will fail upstream.
fn secret_or_empty(env_name: &str) -> SecretString {
    AppConfig::secret(env_name).unwrap_or_else(|_| {
        warn!(env = env_name, "Secret not set");
        SecretString::new(String::new())
    })
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("cryptosage=info"));

    let json_logging = std::env::var("CRYPTOSAGE_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
