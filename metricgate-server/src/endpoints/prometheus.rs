//! Prometheus remote write endpoint.

use axum::extract::{DefaultBodyLimit, FromRequest};
use axum::routing::{MethodRouter, post};
use bytes::Bytes;
use metricgate_config::Config;

use crate::endpoints::common::{self, BadIngestRequest};
use crate::extractors::RawContentType;
use crate::ingest::{CONTENT_TYPE_PROTOBUF, Format, MetricsResponse};
use crate::service::ServiceState;
use crate::services::auth::Caller;

#[derive(Debug, FromRequest)]
#[from_request(state(ServiceState))]
struct WriteParams {
    caller: Caller,
    content_type: RawContentType,
    body: Bytes,
}

async fn handle(
    state: ServiceState,
    params: WriteParams,
) -> Result<MetricsResponse, BadIngestRequest> {
    let WriteParams {
        caller,
        content_type,
        body,
    } = params;

    // Remote write senders always compress with snappy, there is no deflate variant.
    if !content_type.is_empty() && content_type.as_ref() != CONTENT_TYPE_PROTOBUF {
        return Err(BadIngestRequest::UnknownContentType(
            content_type.into_string(),
        ));
    }

    common::handle_format(&state, caller, Format::RemoteWrite, &body, false).await
}

pub fn route(config: &Config) -> MethodRouter<ServiceState> {
    post(handle).route_layer(DefaultBodyLimit::max(config.max_payload_size()))
}
