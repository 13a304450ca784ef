//! HTTP route handlers.
//!
//! All endpoints take and return JSON. State is shared via `Arc<ApiContext>`.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use crate::engine::feedback::{FeedbackDesk, FeedbackDigest, FeedbackEntry};
use crate::engine::introduction;
use crate::engine::settler::Settler;
use crate::engine::{MarketAnalyzer, PollerHandle, ReplyPoller};
use crate::llm::ReasoningOracle;
use crate::social::SocialFeed;
use crate::types::{AnalysisResult, PipelineError, PollReport, StepRecord, TaskStatus};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Collaborators reachable from the handlers.
pub struct ApiContext {
    pub analyzer: Arc<MarketAnalyzer>,
    pub poller: Arc<ReplyPoller>,
    pub handle: PollerHandle,
    /// Account whose threads the poller watches.
    pub account_id: String,
    pub feed: Arc<dyn SocialFeed>,
    pub oracle: Arc<dyn ReasoningOracle>,
    pub settler: Arc<Settler>,
    pub feedback: Arc<FeedbackDesk>,
}

pub type ApiState = Arc<ApiContext>;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// JSON error body with a status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, message: message.into() }
    }

    /// A collaborator (oracle, search, social, ledger) failed.
    pub fn upstream(err: anyhow::Error) -> Self {
        warn!(error = %format!("{err:#}"), "Upstream failure");
        Self { status: StatusCode::BAD_GATEWAY, message: format!("{err:#}") }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        let status = match err {
            PipelineError::AlreadyRunning => StatusCode::CONFLICT,
            PipelineError::Parse { .. } | PipelineError::DateParse(_) => StatusCode::UNPROCESSABLE_ENTITY,
            PipelineError::Adapter { .. } | PipelineError::TransientPost { .. } => StatusCode::BAD_GATEWAY,
        };
        Self { status, message: err.to_string() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

fn required<'a>(field: &str, value: &'a str) -> Result<&'a str, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::bad_request(format!("`{field}` must not be empty")));
    }
    Ok(trimmed)
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub analyze_result: AnalysisResult,
    pub steps: Vec<StepRecord>,
}

#[derive(Debug, Deserialize)]
pub struct JudgeRequest {
    pub address: String,
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct JudgeResponse {
    pub address: String,
    pub outcome: String,
    pub code: u8,
}

#[derive(Debug, Serialize)]
pub struct PollerStatusResponse {
    pub status: TaskStatus,
    pub last_report: Option<PollReport>,
}

#[derive(Debug, Deserialize)]
pub struct TweetRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct TweetResponse {
    pub tweet: String,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub feedback: String,
}

#[derive(Debug, Serialize)]
pub struct FeedbackAck {
    pub stored: usize,
    pub capacity: usize,
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// POST /api/validate_market
pub async fn validate_market(
    State(state): State<ApiState>,
    Json(req): Json<ValidateRequest>,
) -> ApiResult<ValidateResponse> {
    let claim = required("description", &req.description)?;
    let analysis = state.analyzer.analyze(claim).await;
    Ok(Json(ValidateResponse {
        analyze_result: analysis.result,
        steps: analysis.steps,
    }))
}

/// POST /api/judge_bet
pub async fn judge_bet(
    State(state): State<ApiState>,
    Json(req): Json<JudgeRequest>,
) -> ApiResult<JudgeResponse> {
    let address = required("address", &req.address)?;
    let claim = required("description", &req.description)?;
    let outcome = state.settler.settle(address, claim).await.map_err(ApiError::upstream)?;
    Ok(Json(JudgeResponse {
        address: address.to_string(),
        outcome: outcome.to_string(),
        code: outcome.code(),
    }))
}

/// POST /api/poller/start
pub async fn start_poller(State(state): State<ApiState>) -> ApiResult<PollerStatusResponse> {
    if state.account_id.is_empty() {
        return Err(ApiError::bad_request("No social account configured"));
    }
    state.poller.clone().spawn(state.account_id.clone(), state.handle.clone())?;
    info!(account_id = %state.account_id, "Poller started via API");
    Ok(Json(PollerStatusResponse {
        status: state.handle.status(),
        last_report: state.poller.last_report().await,
    }))
}

/// POST /api/poller/stop
pub async fn stop_poller(State(state): State<ApiState>) -> Json<serde_json::Value> {
    let stopping = state.handle.cancel();
    if stopping {
        info!("Poller stop requested via API");
    }
    Json(json!({ "stopping": stopping, "status": state.handle.status() }))
}

/// GET /api/poller/status
pub async fn poller_status(State(state): State<ApiState>) -> Json<PollerStatusResponse> {
    Json(PollerStatusResponse {
        status: state.handle.status(),
        last_report: state.poller.last_report().await,
    })
}

/// POST /api/tweet
pub async fn post_tweet(
    State(state): State<ApiState>,
    Json(req): Json<TweetRequest>,
) -> ApiResult<TweetResponse> {
    let text = required("text", &req.text)?;
    state.feed.post_status(text).await.map_err(ApiError::upstream)?;
    Ok(Json(TweetResponse { tweet: text.to_string() }))
}

/// POST /api/introduce
pub async fn introduce(State(state): State<ApiState>) -> ApiResult<TweetResponse> {
    let tweet = introduction::introduce(state.oracle.as_ref(), state.feed.as_ref())
        .await
        .map_err(ApiError::upstream)?;
    Ok(Json(TweetResponse { tweet }))
}

/// POST /api/feedback
pub async fn submit_feedback(
    State(state): State<ApiState>,
    Json(req): Json<FeedbackRequest>,
) -> ApiResult<FeedbackAck> {
    let text = required("feedback", &req.feedback)?;
    let stored = state.feedback.submit(text).await;
    Ok(Json(FeedbackAck { stored, capacity: state.feedback.capacity() }))
}

/// GET /api/feedback
pub async fn list_feedback(State(state): State<ApiState>) -> Json<Vec<FeedbackEntry>> {
    Json(state.feedback.recent().await)
}

/// POST /api/feedback/improve
pub async fn improve_feedback(State(state): State<ApiState>) -> ApiResult<FeedbackDigest> {
    if state.feedback.recent().await.is_empty() {
        return Err(ApiError::bad_request("No feedback collected yet"));
    }
    let digest = state.feedback
        .improve(state.oracle.as_ref())
        .await
        .map_err(ApiError::upstream)?;
    Ok(Json(digest))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
