//! On-chain bet ledger.
//!
//! The `LedgerService` trait covers the two contract operations the bot
//! needs: deploying a bet and setting its result. `DryRunLedger` logs each
//! call and hands back a synthetic contract address.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Mutex;
use tracing::info;

use crate::types::{BetOutcome, BetRequest};

/// Contract operations on the betting ledger.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerService: Send + Sync {
    /// Deploy a bet contract, returning its address.
    async fn create_bet(&self, request: BetRequest) -> Result<String>;

    /// Record the settled outcome of a bet.
    async fn set_result(&self, address: &str, outcome: BetOutcome) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Dry-run ledger
// ---------------------------------------------------------------------------

/// Ledger that never touches a chain.
#[derive(Default)]
pub struct DryRunLedger {
    created: Mutex<Vec<(String, BetRequest)>>,
    settled: Mutex<Vec<(String, BetOutcome)>>,
}

impl DryRunLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bets created so far, as `(address, request)`.
    pub fn created(&self) -> Vec<(String, BetRequest)> {
        self.created.lock().map(|v| v.clone()).unwrap_or_default()
    }

    /// Results set so far, as `(address, outcome)`.
    pub fn settled(&self) -> Vec<(String, BetOutcome)> {
        self.settled.lock().map(|v| v.clone()).unwrap_or_default()
    }

    fn synthetic_address() -> String {
        format!("0x{}", uuid::Uuid::new_v4().simple())
    }
}

#[async_trait]
impl LedgerService for DryRunLedger {
    async fn create_bet(&self, request: BetRequest) -> Result<String> {
        let address = Self::synthetic_address();
        info!(address = %address, bet = %request, "[DRY RUN] Would deploy bet contract");
        if let Ok(mut created) = self.created.lock() {
            created.push((address.clone(), request));
        }
        Ok(address)
    }

    async fn set_result(&self, address: &str, outcome: BetOutcome) -> Result<()> {
        info!(address, outcome = %outcome, code = outcome.code(), "[DRY RUN] Would set bet result");
        if let Ok(mut settled) = self.settled.lock() {
            settled.push((address.to_string(), outcome));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
