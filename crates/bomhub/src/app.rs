use std::time::Duration;

use axum::{http::StatusCode, routing::get, Router};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::{handlers::health, state::AppState};

/// Create the monitoring router.
pub fn create_app(state: AppState) -> Router {
    let health_routes = Router::new()
        .route("/db-pool", get(health::db_pools))
        .route("/db-pool/sync", get(health::sync_pool))
        .route("/db-pool/async", get(health::async_pool))
        .route("/cache", get(health::cache));

    Router::new()
        .route("/livez", get(health::livez))
        .route("/readyz", get(health::readyz))
        .nest("/api/health", health_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(10),
        ))
        .with_state(state)
}
