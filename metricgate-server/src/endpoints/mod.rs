//! Web server endpoints.
//!
//! Ingestion routes require an authenticated [`Caller`](crate::services::auth::Caller) and are
//! limited to `limits.max_payload_size`. Internal routes live under `/api/gateway`.

mod common;
mod datadog;
mod health_check;
mod metrics;
mod prometheus;
mod stats;

use axum::Router;
use axum::routing::get;
use metricgate_config::Config;

use crate::service::ServiceState;

pub fn routes(config: &Config) -> Router<ServiceState> {
    // Internal routes pointing to /api/gateway
    let internal_routes = Router::new()
        .route("/api/gateway/healthcheck/{kind}/", get(health_check::handle))
        .route("/api/gateway/stats/", get(stats::handle));

    let ingest_routes = Router::new()
        .route("/metrics", metrics::route(config))
        .route("/prometheus/write", prometheus::route(config))
        .route("/datadog/api/v1/series", datadog::series(config))
        .route("/datadog/api/v1/check_run", datadog::check_run(config))
        .route("/datadog/intake", datadog::intake(config))
        .route("/datadog/intake/", datadog::intake(config));

    internal_routes.merge(ingest_routes)
}
