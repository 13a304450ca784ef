//! Bet settlement.
//!
//! Once a bet's end time has passed, the settler gathers fresh evidence,
//! asks the oracle whether the claim came true and writes the outcome to
//! the ledger (`1 = yes`, `2 = no`).

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use crate::data::{self, EvidenceSearch};
use crate::ledger::LedgerService;
use crate::llm::{prompts, ReasoningOracle};
use crate::storage::{self, KeyValueStore};
use crate::types::{BetOutcome, VerdictMode};

pub struct Settler {
    oracle: Arc<dyn ReasoningOracle>,
    search: Arc<dyn EvidenceSearch>,
    ledger: Arc<dyn LedgerService>,
    store: Arc<dyn KeyValueStore>,
    verdict_mode: VerdictMode,
}

impl Settler {
    pub fn new(
        oracle: Arc<dyn ReasoningOracle>,
        search: Arc<dyn EvidenceSearch>,
        ledger: Arc<dyn LedgerService>,
        store: Arc<dyn KeyValueStore>,
        verdict_mode: VerdictMode,
    ) -> Self {
        Self { oracle, search, ledger, store, verdict_mode }
    }

    /// Whether the claim came true according to current evidence.
    pub async fn judge(&self, claim: &str) -> Result<bool> {
        let hits = self.search.search(claim).await.context("Settlement search failed")?;
        let evidence = data::evidence_bundle(&hits);
        let reply = self.oracle
            .complete(&prompts::settlement_prompt(claim, &evidence))
            .await
            .context("Settlement oracle call failed")?;
        Ok(self.verdict_mode.interpret(&reply))
    }

    /// Judge a bet and write its outcome to the ledger.
    pub async fn settle(&self, address: &str, claim: &str) -> Result<BetOutcome> {
        let outcome = BetOutcome::from_verdict(self.judge(claim).await?);
        self.ledger
            .set_result(address, outcome)
            .await
            .with_context(|| format!("Failed to set result for {address}"))?;
        if !storage::mark_judged(self.store.as_ref(), address, outcome).await? {
            // Bets judged through the API need not come from the poller.
            info!(address, "Settled bet not in registry");
        }
        info!(address, outcome = %outcome, "Bet settled");
        Ok(outcome)
    }

    /// Settle every registered bet that has closed. Returns how many were settled.
    pub async fn settle_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let due: Vec<_> = storage::load_bets(self.store.as_ref())
            .await?
            .into_iter()
            .filter(|b| b.is_due(now))
            .collect();

        let mut settled = 0;
        for bet in due {
            match self.settle(&bet.address, &bet.message).await {
                Ok(_) => settled += 1,
                Err(e) => warn!(address = %bet.address, error = %e, "Settlement failed, will retry"),
            }
        }
        Ok(settled)
    }
}
