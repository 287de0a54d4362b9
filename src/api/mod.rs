//! HTTP API for health checks, status, and monitoring

use crate::config::ApiConfig;
use crate::error::{TransferError, TransferResult};
use crate::state::StateManager;

use axum::{
    extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub state_manager: Arc<StateManager>,
    pub started_at: DateTime<Utc>,
}

/// Run the HTTP API server
pub async fn run_server(config: ApiConfig, state_manager: Arc<StateManager>) -> TransferResult<()> {
    let state = AppState {
        state_manager,
        started_at: Utc::now(),
    };

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/status", get(get_status))
        .route("/stats", get(get_stats))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| TransferError::Internal(e.to_string()))?;
    axum::serve(listener, app)
        .await
        .map_err(|e| TransferError::Internal(e.to_string()))?;

    Ok(())
}

/// Health check endpoint - basic liveness
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness check - verify the database is reachable
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_ok = state.state_manager.health_check().await.is_ok();

    let code = if db_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        code,
        Json(ReadinessResponse {
            ready: db_ok,
            database: db_ok,
        }),
    )
}

/// Get controller status
async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    let database = state.state_manager.health_check().await.is_ok();
    let uptime_seconds = (Utc::now() - state.started_at).num_seconds().max(0) as u64;

    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        database,
    })
}

/// Get order counts by status
async fn get_stats(State(state): State<AppState>) -> impl IntoResponse {
    match state.state_manager.order_stats().await {
        Ok(stats) => (
            StatusCode::OK,
            Json(StatsResponse {
                init: stats.init,
                ongoing: stats.ongoing,
                complete: stats.complete,
                error: stats.error,
            }),
        ),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(StatsResponse {
                init: 0,
                ongoing: 0,
                complete: 0,
                error: 0,
            }),
        ),
    }
}

// Response types

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Serialize)]
struct ReadinessResponse {
    ready: bool,
    database: bool,
}

#[derive(Serialize)]
struct StatusResponse {
    version: String,
    uptime_seconds: u64,
    database: bool,
}

#[derive(Serialize)]
struct StatsResponse {
    init: u64,
    ongoing: u64,
    complete: u64,
    error: u64,
}
