//! Endpoints for the vendor agent: series, service checks and host metadata.

use axum::Json;
use axum::extract::{DefaultBodyLimit, FromRequest};
use axum::response::IntoResponse;
use axum::routing::{MethodRouter, post};
use bytes::Bytes;
use metricgate_config::Config;

use crate::endpoints::common::{self, BadIngestRequest};
use crate::extractors::{Deflate, ReceivedAt};
use crate::ingest::{Format, MetricsResponse, decode_intake};
use crate::service::ServiceState;
use crate::services::auth::Caller;

#[derive(Debug, FromRequest)]
#[from_request(state(ServiceState))]
struct AgentParams {
    caller: Caller,
    deflate: Deflate,
    body: Bytes,
}

async fn handle_series(
    state: ServiceState,
    params: AgentParams,
) -> Result<MetricsResponse, BadIngestRequest> {
    let AgentParams {
        caller,
        deflate: Deflate(deflate),
        body,
    } = params;

    common::handle_format(&state, caller, Format::DatadogSeries, &body, deflate).await
}

async fn handle_check_run(
    state: ServiceState,
    params: AgentParams,
) -> Result<MetricsResponse, BadIngestRequest> {
    let AgentParams {
        caller,
        deflate: Deflate(deflate),
        body,
    } = params;

    common::handle_format(&state, caller, Format::DatadogCheck, &body, deflate).await
}

/// Stores a `system_info` record for agent metadata carrying host information.
///
/// Nothing is published on this route. Payloads without host information are accepted and
/// ignored.
async fn handle_intake(
    state: ServiceState,
    received_at: ReceivedAt,
    params: AgentParams,
) -> Result<impl IntoResponse, BadIngestRequest> {
    let AgentParams {
        caller,
        deflate: Deflate(deflate),
        body,
    } = params;

    let payload = decode_intake(&body, deflate)?;
    if payload.has_host_info() {
        let record = payload.system_info(caller.org_id, received_at.unix_timestamp());
        state
            .persister()
            .persist(std::slice::from_ref(&record))
            .await
            .map_err(BadIngestRequest::Persist)?;
    }

    Ok(Json("ok"))
}

pub fn series(config: &Config) -> MethodRouter<ServiceState> {
    post(handle_series).route_layer(DefaultBodyLimit::max(config.max_payload_size()))
}

pub fn check_run(config: &Config) -> MethodRouter<ServiceState> {
    post(handle_check_run).route_layer(DefaultBodyLimit::max(config.max_payload_size()))
}

pub fn intake(config: &Config) -> MethodRouter<ServiceState> {
    post(handle_intake).route_layer(DefaultBodyLimit::max(config.max_payload_size()))
}
