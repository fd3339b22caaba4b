//! Monitoring endpoints.
//!
//! - `/livez` - Liveness probe (immediate 200, no checks)
//! - `/readyz` - Readiness probe (leases a connection from each pool)
//! - `/api/health/db-pool` - Both pools, healthy only if both are
//! - `/api/health/db-pool/sync`, `/api/health/db-pool/async` - One pool
//! - `/api/health/cache` - Cache backend and statistics

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::{error::AppError, state::AppState};

fn health_response<T: Serialize>(healthy: bool, report: T) -> Response {
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(report)).into_response()
}

/// GET /livez - Basic liveness probe.
#[axum::debug_handler]
pub async fn livez() -> StatusCode {
    StatusCode::OK
}

/// GET /readyz - Readiness probe.
///
/// Returns 503 with a generic message when a pool cannot hand out a
/// healthy connection.
#[axum::debug_handler]
pub async fn readyz(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    state.reporter.ready().await?;
    Ok(StatusCode::OK)
}

/// GET /api/health/db-pool
#[axum::debug_handler]
pub async fn db_pools(State(state): State<AppState>) -> Response {
    let report = state.reporter.db_pools().await;
    health_response(report.is_healthy(), report)
}

/// GET /api/health/db-pool/sync
#[axum::debug_handler]
pub async fn sync_pool(State(state): State<AppState>) -> Response {
    let report = state.reporter.sync_pool().await;
    health_response(report.is_healthy(), report)
}

/// GET /api/health/db-pool/async
#[axum::debug_handler]
pub async fn async_pool(State(state): State<AppState>) -> Response {
    let report = state.reporter.async_pool().await;
    health_response(report.is_healthy(), report)
}

/// GET /api/health/cache
#[axum::debug_handler]
pub async fn cache(State(state): State<AppState>) -> Response {
    let report = state.reporter.cache().await;
    health_response(report.is_healthy(), report)
}
