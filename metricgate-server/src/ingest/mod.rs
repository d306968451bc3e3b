//! Wire format decoders and the validation pipeline.
//!
//! Every supported protocol is a variant of [`Format`]. Decoding turns a request body into pooled
//! records, which are then run through [`process`] before being handed to the publisher.

use std::io;

use metricgate_metrics::{MetricPool, OrgId, PooledMetric, SchemaResolver};

mod body;
mod datadog;
mod native;
mod process;
mod prometheus;
mod response;

pub use self::datadog::{IntakePayload, decode_intake};
pub use self::native::{EnvelopeError, MetricEnvelope, PayloadError, PayloadFormat};
pub use self::process::*;
pub use self::prometheus::{Label, Sample, TimeSeries, WriteRequest};
pub use self::response::*;

/// Content type of native JSON requests.
pub const CONTENT_TYPE_JSON: &str = "application/json";
/// Content type of native binary envelopes.
pub const CONTENT_TYPE_BINARY: &str = "rt-metric-binary";
/// Content type of native binary envelopes in a snappy framed stream.
pub const CONTENT_TYPE_BINARY_SNAPPY: &str = "rt-metric-binary-snappy";
/// Content type of remote write requests.
pub const CONTENT_TYPE_PROTOBUF: &str = "application/x-protobuf";

/// Request-level failure to turn a body into records.
///
/// Decoding never yields a partial result: either all records are produced, or none.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The request has no body.
    #[error("no data included in request.")]
    MissingBody,
    /// Inflating or unframing the body failed.
    #[error("unable to decode request, reason: {0}")]
    Decompress(io::Error),
    /// The body is not a valid agent payload.
    #[error("unable to unmarshal request, reason: {0}")]
    Unmarshal(serde_json::Error),
    /// The body is not a valid JSON array of records.
    #[error("unable to parse request body. {0}")]
    NativeJson(serde_json::Error),
    /// The binary envelope is malformed.
    #[error("payload not metricData: {0}")]
    Envelope(EnvelopeError),
    /// The payload of the binary envelope is malformed.
    #[error("failed to unmarshal metricData: {0}")]
    Payload(PayloadError),
    /// The body is not a valid snappy block.
    #[error("unable to decode request, reason: {0}")]
    Snappy(snap::Error),
    /// The body is not a valid remote write request.
    #[error("unable to unmarshal request, reason: {0}")]
    Protobuf(prost::DecodeError),
    /// A remote write series has no name label.
    #[error("invalid metric received: __name__ label can not equal \"\"")]
    MissingName,
}

/// Request scoped inputs of the decoders.
pub struct DecodeContext<'a> {
    /// Pool to draw records from.
    pub pool: &'a MetricPool,
    /// Tenant of the caller, stamped on records of protocols without an org field.
    pub org_id: OrgId,
    /// Resolves sample intervals of remote write series.
    pub schemas: &'a dyn SchemaResolver,
    /// Whether the body is zlib compressed (`Content-Encoding: deflate`).
    pub deflate: bool,
}

/// The wire formats that decode into a publishable batch.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Format {
    /// Datadog agent series (`/datadog/api/v1/series`).
    DatadogSeries,
    /// Datadog agent service checks (`/datadog/api/v1/check_run`).
    DatadogCheck,
    /// Native JSON array of records.
    NativeJson,
    /// Native binary envelope.
    NativeBinary,
    /// Native binary envelope in a snappy framed stream.
    NativeBinarySnappy,
    /// Prometheus remote write.
    RemoteWrite,
}

impl Format {
    /// Selects the native format declared by a `Content-Type` header.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        match content_type {
            CONTENT_TYPE_JSON => Some(Self::NativeJson),
            CONTENT_TYPE_BINARY => Some(Self::NativeBinary),
            CONTENT_TYPE_BINARY_SNAPPY => Some(Self::NativeBinarySnappy),
            _ => None,
        }
    }

    /// Returns the name used as `route` tag in internal metrics.
    pub fn name(self) -> &'static str {
        match self {
            Self::DatadogSeries => "datadog_series",
            Self::DatadogCheck => "datadog_check",
            Self::NativeJson => "metrics_json",
            Self::NativeBinary => "metrics_binary",
            Self::NativeBinarySnappy => "metrics_binary_snappy",
            Self::RemoteWrite => "prometheus_write",
        }
    }

    /// Decodes a request body into pooled records, in input order.
    pub fn decode(
        self,
        body: &[u8],
        cx: &DecodeContext<'_>,
    ) -> Result<Vec<PooledMetric>, DecodeError> {
        match self {
            Self::DatadogSeries => datadog::decode_series(body, cx),
            Self::DatadogCheck => datadog::decode_checks(body, cx),
            Self::NativeJson => native::decode_json(body, cx),
            Self::NativeBinary => native::decode_binary(body, false, cx),
            Self::NativeBinarySnappy => native::decode_binary(body, true, cx),
            Self::RemoteWrite => prometheus::decode(body, cx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_content_type() {
        assert_eq!(
            Format::from_content_type("application/json"),
            Some(Format::NativeJson)
        );
        assert_eq!(
            Format::from_content_type("rt-metric-binary"),
            Some(Format::NativeBinary)
        );
        assert_eq!(
            Format::from_content_type("rt-metric-binary-snappy"),
            Some(Format::NativeBinarySnappy)
        );
        assert_eq!(Format::from_content_type("text/plain"), None);
        assert_eq!(Format::from_content_type(""), None);
    }
}
