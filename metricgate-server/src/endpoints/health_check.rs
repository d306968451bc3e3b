//! A simple health check endpoint for the gateway.

use axum::Json;
use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};

use crate::service::ServiceState;

/// The kind of health check to run.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IsHealthy {
    /// The process is running.
    Live,
    /// The gateway accepts requests. Fails once graceful shutdown has started.
    Ready,
}

#[derive(Serialize)]
struct Status {
    is_healthy: bool,
}

pub async fn handle(state: ServiceState, Path(kind): Path<IsHealthy>) -> impl IntoResponse {
    let is_healthy = match kind {
        IsHealthy::Live => true,
        IsHealthy::Ready => !state.is_shutting_down(),
    };

    let status = if is_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(Status { is_healthy }))
}
