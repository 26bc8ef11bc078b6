//! Health check endpoints

use crate::metrics::GatewayMetrics;
use crate::shard::{ShardSnapshot, ShardState};
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Readiness check response
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub shards_total: usize,
    pub shards_ready: usize,
    pub shards_dead: usize,
    pub guilds_total: u64,
    pub shards: Vec<ShardSnapshot>,
}

/// Application state for health endpoints
#[derive(Clone)]
pub struct AppState {
    pub shard_state: ShardState,
    pub metrics: Arc<GatewayMetrics>,
}

/// Create the health check router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Always 200 while the process is running
async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

fn readiness(shard_state: &ShardState) -> ReadyResponse {
    ReadyResponse {
        ready: shard_state.is_ready(),
        shards_total: shard_state.shard_count(),
        shards_ready: shard_state.ready_shards(),
        shards_dead: shard_state.dead_shards(),
        guilds_total: shard_state.total_guilds(),
        shards: shard_state.snapshots(),
    }
}

/// 200 while at least one shard is ready, 503 otherwise
async fn ready_handler(State(state): State<AppState>) -> impl IntoResponse {
    let response = readiness(&state.shard_state);

    if response.ready {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}

/// Prometheus exposition
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    state.metrics.set_shards_ready(state.shard_state.ready_shards());

    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        state.metrics.render(),
    )
}
