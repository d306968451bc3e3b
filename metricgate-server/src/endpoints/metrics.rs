//! Native ingestion of JSON and binary envelope batches.

use axum::extract::{DefaultBodyLimit, FromRequest};
use axum::routing::{MethodRouter, post};
use bytes::Bytes;
use metricgate_config::Config;

use crate::endpoints::common::{self, BadIngestRequest};
use crate::extractors::RawContentType;
use crate::ingest::{Format, MetricsResponse};
use crate::service::ServiceState;
use crate::services::auth::Caller;

#[derive(Debug, FromRequest)]
#[from_request(state(ServiceState))]
struct MetricsParams {
    caller: Caller,
    content_type: RawContentType,
    body: Bytes,
}

async fn handle(
    state: ServiceState,
    params: MetricsParams,
) -> Result<MetricsResponse, BadIngestRequest> {
    let MetricsParams {
        caller,
        content_type,
        body,
    } = params;

    let format = Format::from_content_type(content_type.as_ref())
        .ok_or_else(|| BadIngestRequest::UnknownContentType(content_type.into_string()))?;

    common::handle_format(&state, caller, format, &body, false).await
}

pub fn route(config: &Config) -> MethodRouter<ServiceState> {
    post(handle).route_layer(DefaultBodyLimit::max(config.max_payload_size()))
}
