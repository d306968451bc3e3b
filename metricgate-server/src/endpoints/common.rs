//! Common facilities for the ingestion endpoints.

use std::time::Instant;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use metricgate_log::LogError;
use metricgate_statsd::metric;

use crate::ingest::{DecodeError, Format, MetricsResponse, Processed, process};
use crate::service::ServiceState;
use crate::services::auth::Caller;
use crate::services::persist::PersistError;
use crate::services::publish::PublishError;
use crate::statsd::{ServerCounters, ServerGauges, ServerTimers};

/// Request level failure of an ingestion endpoint.
#[derive(Debug, thiserror::Error)]
pub enum BadIngestRequest {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("unknown content-type: {0}")]
    UnknownContentType(String),

    #[error("failed to publish metrics: {0}")]
    Publish(#[source] PublishError),

    #[error("failed to persist metrics: {0}")]
    Persist(#[source] PersistError),
}

impl BadIngestRequest {
    fn status(&self) -> StatusCode {
        match self {
            Self::Decode(_) | Self::UnknownContentType(_) => StatusCode::BAD_REQUEST,
            Self::Publish(_) | Self::Persist(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn reason(&self) -> &'static str {
        match self {
            Self::Decode(DecodeError::MissingName) => "missing_name",
            Self::Decode(_) => "decode",
            Self::UnknownContentType(_) => "content_type",
            Self::Publish(PublishError::Http(error)) if error.is_network_error() => {
                "publish_unreachable"
            }
            Self::Publish(_) => "publish",
            Self::Persist(_) => "persist",
        }
    }
}

impl IntoResponse for BadIngestRequest {
    fn into_response(self) -> Response {
        let status = self.status();
        metric!(counter(ServerCounters::RequestsFailed) += 1, reason = self.reason());

        if status.is_server_error() {
            metricgate_log::error!(error = %LogError(&self), "failed to ingest request");
        } else {
            metricgate_log::debug!(error = %LogError(&self), "rejected ingest request");
        }

        (status, Json(self.to_string())).into_response()
    }
}

/// Decodes, validates and publishes one request body.
///
/// The batch is handed to the publisher exactly once, even when every record was rejected. All
/// pooled records are returned before this function returns.
pub async fn handle_format(
    state: &ServiceState,
    caller: Caller,
    format: Format,
    body: &[u8],
    deflate: bool,
) -> Result<MetricsResponse, BadIngestRequest> {
    let start = Instant::now();
    let result = publish_metrics(state, caller, format, body, deflate).await;

    metric!(
        timer(ServerTimers::RequestDuration) = start.elapsed(),
        route = format.name()
    );
    metric!(gauge(ServerGauges::PoolOutstanding) = state.pool().outstanding() as u64);
    metric!(gauge(ServerGauges::PoolIdle) = state.pool().idle() as u64);

    result
}

async fn publish_metrics(
    state: &ServiceState,
    caller: Caller,
    format: Format,
    body: &[u8],
    deflate: bool,
) -> Result<MetricsResponse, BadIngestRequest> {
    let metrics = format.decode(body, &state.decode_context(caller.org_id, deflate))?;

    let Processed {
        batch,
        mut response,
        discards,
    } = process(metrics, caller);
    state.discards().merge(&discards);

    metric!(timer(ServerTimers::PublishDuration), {
        state.publisher().publish(&batch).await
    })
    .map_err(BadIngestRequest::Publish)?;

    state.discards().add_valid(batch.len());
    response.published = batch.len();
    Ok(response)
}

#[cfg(test)]
mod tests {
    use crate::http::HttpError;

    use super::*;

    #[test]
    fn test_status_codes() {
        let error = BadIngestRequest::Decode(DecodeError::MissingBody);
        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error.to_string(), "no data included in request.");

        let error = BadIngestRequest::UnknownContentType("text/plain".to_owned());
        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error.to_string(), "unknown content-type: text/plain");

        let error = BadIngestRequest::Publish(PublishError::Http(HttpError::Status(
            StatusCode::BAD_GATEWAY,
        )));
        assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            error.to_string(),
            "failed to publish metrics: upstream responded with 502 Bad Gateway"
        );
    }

    #[test]
    fn test_failed_request_metric() {
        let captures = metricgate_statsd::with_capturing_test_client(|| {
            let _ = BadIngestRequest::Decode(DecodeError::MissingName).into_response();
        });
        assert_eq!(captures, ["requests.failed:1|c|#reason:missing_name"]);
    }
}
