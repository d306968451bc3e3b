//! Snapshot of the process wide ingestion counters.

use axum::Json;
use axum::response::IntoResponse;
use serde::Serialize;

use crate::service::ServiceState;
use crate::services::discards::DiscardSnapshot;

#[derive(Debug, Serialize)]
struct PoolStats {
    outstanding: usize,
    idle: usize,
}

#[derive(Debug, Serialize)]
struct StatsResponse {
    #[serde(flatten)]
    counters: DiscardSnapshot,
    pool: PoolStats,
}

pub async fn handle(state: ServiceState) -> impl IntoResponse {
    Json(StatsResponse {
        counters: state.discards().snapshot(),
        pool: PoolStats {
            outstanding: state.pool().outstanding(),
            idle: state.pool().idle(),
        },
    })
}
