//! Persistence layer.
//!
//! A small key-value store holds the per-thread reply watermarks and the
//! registry of bets awaiting settlement. `JsonFileStore` keeps the whole map
//! in memory and rewrites a JSON file on every update; `MemoryStore` is the
//! non-persistent variant used by tests and ephemeral runs.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::types::{BetOutcome, BetRecord};

/// Default store file path.
pub const DEFAULT_STORE_FILE: &str = "cryptosage_state.json";

const BET_PREFIX: &str = "bet:";

/// String key-value store with atomic per-key reads and writes.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// All keys starting with `prefix`, sorted.
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>>;
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn prefixed_keys(entries: &HashMap<String, String>, prefix: &str) -> Vec<String> {
    let mut keys: Vec<String> = entries.keys()
        .filter(|k| k.starts_with(prefix))
        .cloned()
        .collect();
    keys.sort();
    keys
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.write().await.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(prefixed_keys(&*self.entries.read().await, prefix))
    }
}

// ---------------------------------------------------------------------------
// JSON file store
// ---------------------------------------------------------------------------

pub struct JsonFileStore {
    path: PathBuf,
    entries: RwLock<HashMap<String, String>>,
}

impl JsonFileStore {
    /// Open the store at `path`, loading existing entries if the file exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let entries = if path.exists() {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read store from {}", path.display()))?;
            let entries: HashMap<String, String> = serde_json::from_str(&json)
                .with_context(|| format!("Failed to parse store from {}", path.display()))?;
            info!(path = %path.display(), keys = entries.len(), "Store loaded from disk");
            entries
        } else {
            info!(path = %path.display(), "No saved store found, starting fresh");
            HashMap::new()
        };

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    fn persist(&self, entries: &HashMap<String, String>) -> Result<()> {
        let json = serde_json::to_string_pretty(entries)
            .context("Failed to serialise store")?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write store to {}", self.path.display()))?;
        debug!(path = %self.path.display(), keys = entries.len(), "Store saved");
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries)
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(prefixed_keys(&*self.entries.read().await, prefix))
    }
}

// ---------------------------------------------------------------------------
// Reply watermarks
// ---------------------------------------------------------------------------

pub fn watermark_key(namespace: &str, thread_id: &str) -> String {
    format!("{namespace}:{thread_id}")
}

fn encode_timestamp(ts: DateTime<Utc>) -> String {
    format!("{:.6}", ts.timestamp_micros() as f64 / 1_000_000.0)
}

fn decode_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let secs: f64 = raw.trim().parse().ok()?;
    if !secs.is_finite() {
        return None;
    }
    DateTime::from_timestamp_micros((secs * 1_000_000.0).round() as i64)
}

/// Read the watermark for a thread, seeding it to `now - lookback_days`
/// (and persisting the seed) when absent or unreadable.
pub async fn load_watermark(
    store: &dyn KeyValueStore,
    namespace: &str,
    thread_id: &str,
    now: DateTime<Utc>,
    lookback_days: i64,
) -> Result<DateTime<Utc>> {
    let key = watermark_key(namespace, thread_id);
    if let Some(raw) = store.get(&key).await? {
        match decode_timestamp(&raw) {
            Some(ts) => return Ok(ts),
            None => warn!(key = %key, value = %raw, "Unreadable watermark, reseeding"),
        }
    }

    let seed = now - Duration::days(lookback_days);
    store.set(&key, &encode_timestamp(seed)).await?;
    debug!(key = %key, seed = %seed, "Seeded watermark");
    Ok(seed)
}

pub async fn save_watermark(
    store: &dyn KeyValueStore,
    namespace: &str,
    thread_id: &str,
    ts: DateTime<Utc>,
) -> Result<()> {
    store.set(&watermark_key(namespace, thread_id), &encode_timestamp(ts)).await
}

// ---------------------------------------------------------------------------
// Bet registry
// ---------------------------------------------------------------------------

pub async fn register_bet(store: &dyn KeyValueStore, record: &BetRecord) -> Result<()> {
    let json = serde_json::to_string(record).context("Failed to serialise bet record")?;
    store.set(&format!("{BET_PREFIX}{}", record.address), &json).await
}

/// Every registered bet. Entries that fail to decode are logged and skipped.
pub async fn load_bets(store: &dyn KeyValueStore) -> Result<Vec<BetRecord>> {
    let mut bets = Vec::new();
    for key in store.keys_with_prefix(BET_PREFIX).await? {
        let Some(raw) = store.get(&key).await? else { continue };
        match serde_json::from_str::<BetRecord>(&raw) {
            Ok(record) => bets.push(record),
            Err(e) => warn!(key = %key, error = %e, "Corrupt bet record, skipping"),
        }
    }
    Ok(bets)
}

/// Mark a registered bet as judged. Returns false when the address is unknown.
pub async fn mark_judged(
    store: &dyn KeyValueStore,
    address: &str,
    outcome: BetOutcome,
) -> Result<bool> {
    let key = format!("{BET_PREFIX}{address}");
    let Some(raw) = store.get(&key).await? else {
        return Ok(false);
    };
    let mut record: BetRecord = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse bet record {key}"))?;
    record.judged = true;
    record.outcome = Some(outcome);
    register_bet(store, &record).await?;
    Ok(true)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
