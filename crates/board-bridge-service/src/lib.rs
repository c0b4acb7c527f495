//! # Board-Bridge HTTP Service
//!
//! HTTP server receiving work-item Service Hook events and running them
//! through the dispatch pipeline.
//!
//! This service provides:
//! - The Service Hook endpoint (path configurable, default
//!   `/hooks/work-item`)
//! - Health and readiness endpoints
//!
//! Response contract:
//! - `204` when the event was dispatched, and also when it was rejected by
//!   policy. A policy rejection is an expected filtering outcome; returning
//!   success keeps the upstream Service Hook subscription from being marked
//!   as failing. The rejection reason is logged with the correlation id.
//! - `400` with `{error}` for malformed bodies.
//! - `500` with `{error, correlation_id}` for configuration errors and
//!   terminal dispatch failures.
//!
//! A catch-panic layer guarantees a response even if a handler panics.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use board_bridge_core::{BridgeConfig, ConfigError, DispatchPipeline, EventDisposition};
use bytes::Bytes;
use serde_json::json;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::info;

// ============================================================================
// Application State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Per-event dispatch pipeline
    pub pipeline: Arc<DispatchPipeline>,

    /// Loaded configuration, used by the readiness check
    pub config: Arc<BridgeConfig>,
}

// ============================================================================
// Router
// ============================================================================

/// Assemble the service router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            &state.config.server.endpoint_path,
            post(handle_work_item_event),
        )
        .route("/health", get(handle_health_check))
        .route("/ready", get(handle_readiness_check))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                // Last line of defense: a panicking handler still produces a
                // plain 500 response instead of a dropped connection.
                .layer(CatchPanicLayer::new()),
        )
        .with_state(state)
}

// ============================================================================
// Handlers
// ============================================================================

/// Handle one inbound Service Hook event
async fn handle_work_item_event(State(state): State<AppState>, body: Bytes) -> Response {
    match state.pipeline.handle(&body).await {
        EventDisposition::Dispatched { .. } => StatusCode::NO_CONTENT.into_response(),
        // Expected filtering outcome; already logged with its reason.
        EventDisposition::Rejected { .. } => StatusCode::NO_CONTENT.into_response(),
        EventDisposition::Malformed { error, .. } => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": error })),
        )
            .into_response(),
        EventDisposition::Failed {
            error,
            correlation_id,
            ..
        } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": error, "correlation_id": correlation_id })),
        )
            .into_response(),
    }
}

/// Liveness check
async fn handle_health_check() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}

/// Readiness check: the service is ready when its configuration is complete
async fn handle_readiness_check(State(state): State<AppState>) -> Response {
    match state.config.validate() {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ready" }))).into_response(),
        Err(error) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "not_ready", "error": error.to_string() })),
        )
            .into_response(),
    }
}

// ============================================================================
// Server
// ============================================================================

/// Service-level errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("Server failed: {message}")]
    ServerFailed { message: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),
}

/// Bind the listener and serve until the process is stopped
pub async fn start_server(
    config: BridgeConfig,
    pipeline: Arc<DispatchPipeline>,
) -> Result<(), ServiceError> {
    let address = format!("{}:{}", config.server.host, config.server.port);

    let state = AppState {
        pipeline,
        config: Arc::new(config),
    };
    let router = build_router(state);

    let listener =
        tokio::net::TcpListener::bind(&address)
            .await
            .map_err(|e| ServiceError::BindFailed {
                address: address.clone(),
                message: e.to_string(),
            })?;

    info!(address = %address, "Listening for Service Hook events");

    axum::serve(listener, router)
        .await
        .map_err(|e| ServiceError::ServerFailed {
            message: e.to_string(),
        })
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
