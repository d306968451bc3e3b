//! Decoder for the Prometheus remote write protocol.

use metricgate_metrics::{MetricType, PooledMetric, UNKNOWN_UNIT};
use prost::Message;

use crate::constants::METRIC_NAME_LABEL;
use crate::ingest::{DecodeContext, DecodeError, body};

/// A remote write request.
#[derive(Clone, PartialEq, Message)]
pub struct WriteRequest {
    #[prost(message, repeated, tag = "1")]
    pub timeseries: Vec<TimeSeries>,
}

/// A series identified by its labels, including the reserved name label.
#[derive(Clone, PartialEq, Message)]
pub struct TimeSeries {
    #[prost(message, repeated, tag = "1")]
    pub labels: Vec<Label>,
    #[prost(message, repeated, tag = "2")]
    pub samples: Vec<Sample>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Label {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub value: String,
}

/// A sample with a timestamp in milliseconds.
#[derive(Clone, PartialEq, Message)]
pub struct Sample {
    #[prost(double, tag = "1")]
    pub value: f64,
    #[prost(int64, tag = "2")]
    pub timestamp: i64,
}

/// Decodes a snappy compressed remote write request.
///
/// Label order is preserved in the tags. A series without a name rejects the entire request.
pub fn decode(body: &[u8], cx: &DecodeContext<'_>) -> Result<Vec<PooledMetric>, DecodeError> {
    if body.is_empty() {
        return Err(DecodeError::MissingBody);
    }

    let raw = body::decode_snappy_block(body).map_err(DecodeError::Snappy)?;
    let request = WriteRequest::decode(raw.as_slice()).map_err(DecodeError::Protobuf)?;

    let count = request.timeseries.iter().map(|ts| ts.samples.len()).sum();
    let mut metrics = Vec::with_capacity(count);

    for series in &request.timeseries {
        let mut name = "";
        let mut tags = Vec::with_capacity(series.labels.len());

        for label in &series.labels {
            if label.name == METRIC_NAME_LABEL {
                name = label.value.as_str();
            } else {
                tags.push(format!("{}={}", label.name, label.value));
            }
        }

        if name.is_empty() {
            metricgate_log::debug!(labels = ?series.labels, "remote write series without name");
            return Err(DecodeError::MissingName);
        }

        let interval = i32::try_from(cx.schemas.interval(name, 0)).unwrap_or(i32::MAX);

        for sample in &series.samples {
            let mut metric = cx.pool.get();
            metric.org_id = cx.org_id;
            metric.name.push_str(name);
            metric.metric.push_str(name);
            metric.interval = interval;
            metric.unit.push_str(UNKNOWN_UNIT);
            metric.value = sample.value;
            metric.time = sample.timestamp / 1000;
            metric.mtype.push_str(MetricType::Gauge.as_str());
            metric.tags.extend_from_slice(&tags);
            metrics.push(metric);
        }
    }

    Ok(metrics)
}
