//! Market analyzer: the claim validation pipeline.
//!
//! Stages run in order and each appends one `StepRecord`:
//!
//! 1. structural extraction (due date, binary outcome) through the oracle
//! 2. gate: claims without both properties stop here, marked skipped
//! 3. evidence gathering through web search on the claim text
//! 4. verdict through the oracle, given claim and evidence
//!
//! Failures never escape. An oracle or search error becomes an error
//! record on the stage that failed and the result gathered so far is
//! returned, with `is_valid` left false.

use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::data::{self, EvidenceSearch};
use crate::engine::dates;
use crate::llm::{prompts, structured, ReasoningOracle};
use crate::types::{AnalysisResult, PipelineError, PipelineStage, StepRecord, VerdictMode};

/// Analyzer output: the verdict plus its audit trail.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub result: AnalysisResult,
    pub steps: Vec<StepRecord>,
}

/// Fields requested from the extraction oracle. Missing keys and explicit
/// nulls both fall back to the defaults.
#[derive(Debug, Deserialize)]
struct Extraction {
    #[serde(default)]
    has_due_date: Option<bool>,
    #[serde(default)]
    due_date: Option<String>,
    #[serde(default)]
    has_two_outcomes: Option<bool>,
    #[serde(default)]
    outcomes: Option<Vec<String>>,
}

#[derive(Default)]
struct Trail {
    steps: Vec<StepRecord>,
}

impl Trail {
    fn next_number(&self) -> u32 {
        self.steps.len() as u32 + 1
    }

    fn record(&mut self, stage: PipelineStage, input: Value, output: Value) {
        let step = StepRecord {
            step_number: self.next_number(),
            stage,
            input,
            output,
            error: None,
        };
        debug!(step = %step, "Pipeline step");
        self.steps.push(step);
    }

    fn fail(&mut self, stage: PipelineStage, input: Value, output: Value, err: &PipelineError) {
        let step = StepRecord {
            step_number: self.next_number(),
            stage,
            input,
            output,
            error: Some(err.to_string()),
        };
        warn!(step = %step, "Pipeline step failed");
        self.steps.push(step);
    }
}

pub struct MarketAnalyzer {
    oracle: Arc<dyn ReasoningOracle>,
    search: Arc<dyn EvidenceSearch>,
    verdict_mode: VerdictMode,
}

impl MarketAnalyzer {
    pub fn new(
        oracle: Arc<dyn ReasoningOracle>,
        search: Arc<dyn EvidenceSearch>,
        verdict_mode: VerdictMode,
    ) -> Self {
        Self { oracle, search, verdict_mode }
    }

    /// Run the full pipeline on one claim.
    pub async fn analyze(&self, claim: &str) -> Analysis {
        let mut trail = Trail::default();
        let mut result = AnalysisResult::default();

        self.run(claim, &mut result, &mut trail).await;

        info!(claim, result = %result, steps = trail.steps.len(), "Claim analyzed");
        Analysis { result, steps: trail.steps }
    }

    async fn run(&self, claim: &str, result: &mut AnalysisResult, trail: &mut Trail) {
        // -- Structural extraction ----------------------------------------

        let raw = match self.oracle.complete(&prompts::extraction_prompt(claim)).await {
            Ok(raw) => raw,
            Err(e) => {
                let err = PipelineError::adapter("oracle", format!("{e:#}"));
                trail.fail(PipelineStage::StructuralExtraction, json!(claim), Value::Null, &err);
                return;
            }
        };

        let extraction: Extraction = match structured::parse_as(&raw) {
            Ok(x) => x,
            Err(err) => {
                trail.fail(PipelineStage::StructuralExtraction, json!(claim), json!(raw), &err);
                return;
            }
        };

        apply_extraction(result, extraction);
        let extracted = json!({
            "has_due_date": result.has_due_date,
            "due_date": result.due_date,
            "has_two_outcomes": result.has_two_outcomes,
            "outcomes": result.outcomes,
        });

        // -- Gate ---------------------------------------------------------

        if !result.is_structurally_valid() {
            let reason = if !result.has_due_date {
                "no resolvable due date"
            } else {
                "not a two-outcome proposition"
            };
            debug!(claim, reason, "Claim skipped at gate");
            trail.record(
                PipelineStage::Skipped,
                json!(claim),
                json!({ "extraction": extracted, "reason": reason }),
            );
            return;
        }
        trail.record(PipelineStage::StructuralExtraction, json!(claim), extracted);

        // -- Evidence -----------------------------------------------------

        let hits = match self.search.search(claim).await {
            Ok(hits) => hits,
            Err(e) => {
                let err = PipelineError::adapter("search", format!("{e:#}"));
                trail.fail(PipelineStage::EvidenceGathering, json!(claim), Value::Null, &err);
                return;
            }
        };
        let evidence = data::evidence_bundle(&hits);
        trail.record(
            PipelineStage::EvidenceGathering,
            json!(claim),
            json!({ "urls": data::extract_urls(&hits), "evidence": evidence }),
        );

        // -- Verdict ------------------------------------------------------

        let prompt = prompts::verdict_prompt(claim, &evidence);
        let input = json!({ "claim": claim, "evidence": evidence });
        match self.oracle.complete(&prompt).await {
            Ok(reply) => {
                result.is_valid = self.verdict_mode.interpret(&reply);
                trail.record(
                    PipelineStage::Verdict,
                    input,
                    json!({ "reply": reply.trim(), "is_valid": result.is_valid }),
                );
            }
            Err(e) => {
                let err = PipelineError::adapter("oracle", format!("{e:#}"));
                trail.fail(PipelineStage::Verdict, input, Value::Null, &err);
            }
        }
    }
}

/// Copy extracted fields into the result, normalising the due date.
/// A due date that is missing or unparseable downgrades `has_due_date`.
fn apply_extraction(result: &mut AnalysisResult, extraction: Extraction) {
    result.has_two_outcomes = extraction.has_two_outcomes.unwrap_or_default();
    result.outcomes = extraction.outcomes.unwrap_or_default().into_iter().take(2).collect();
    result.has_due_date = extraction.has_due_date.unwrap_or_default();

    if !result.has_due_date {
        return;
    }
    // Reported without a date string: keep the flag, leave the date empty.
    let Some(raw_date) = extraction.due_date.filter(|d| !d.trim().is_empty()) else {
        return;
    };
    match dates::normalize_due_date(&raw_date) {
        Ok(iso) => {
            result.due_date = Some(iso);
        }
        Err(e) => {
            warn!(error = %e, "Due date downgraded");
            result.has_due_date = false;
            result.due_date = None;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
