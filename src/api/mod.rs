//! HTTP API: Axum server exposing claim validation, settlement, the
//! poller controls, posting and feedback.
//!
//! CORS is open for local tooling.

pub mod routes;

use anyhow::{Context, Result};
use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

pub use routes::{ApiContext, ApiState};

/// Bind and serve until the process exits.
pub async fn serve(state: ApiState, port: u16) -> Result<()> {
    let app = build_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind API port {port}"))?;
    info!(port, "API server listening on http://localhost:{port}");

    axum::serve(listener, app).await.context("API server error")
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(routes::health))
        .route("/api/validate_market", post(routes::validate_market))
        .route("/api/judge_bet", post(routes::judge_bet))
        .route("/api/poller/start", post(routes::start_poller))
        .route("/api/poller/stop", post(routes::stop_poller))
        .route("/api/poller/status", get(routes::poller_status))
        .route("/api/tweet", post(routes::post_tweet))
        .route("/api/introduce", post(routes::introduce))
        .route("/api/feedback", post(routes::submit_feedback).get(routes::list_feedback))
        .route("/api/feedback/improve", post(routes::improve_feedback))
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
