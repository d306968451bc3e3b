//! Decoders for the payloads of the Datadog agent.

use metricgate_metrics::{
    MetricData, MetricType, OrgId, PooledMetric, UNKNOWN_UNIT, build_tag_set, build_tag_set_into,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::constants::SYSTEM_INFO_METRIC;
use crate::ingest::{DecodeContext, DecodeError, body};

#[derive(Debug, Deserialize)]
struct SeriesPayload {
    #[serde(default)]
    series: Vec<Series>,
}

#[derive(Debug, Deserialize)]
struct Series {
    #[serde(rename = "metric", default)]
    name: String,
    #[serde(default)]
    points: Vec<(f64, f64)>,
    #[serde(default)]
    tags: Option<Vec<String>>,
    #[serde(default)]
    host: String,
    #[serde(rename = "type", default)]
    mtype: String,
    #[serde(default)]
    device: String,
}

#[derive(Debug, Deserialize)]
struct Check {
    #[serde(default)]
    check: String,
    #[serde(rename = "host_name", default)]
    host: String,
    #[serde(default)]
    timestamp: i64,
    #[serde(default)]
    status: f64,
    #[serde(default)]
    tags: Option<Vec<String>>,
}

/// Host metadata reported by the agent to its intake endpoint.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct IntakePayload {
    #[serde(rename = "agentVersion")]
    agent_version: String,
    os: String,
    #[serde(rename = "systemStats")]
    system_stats: SystemStats,
    meta: HostMeta,
    gohai: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SystemStats {
    machine: String,
    processor: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HostMeta {
    #[serde(rename = "socket-hostname")]
    socket_hostname: String,
    #[serde(rename = "socket-fqdn")]
    socket_fqdn: String,
    hostname: String,
}

impl IntakePayload {
    /// Returns `true` if the payload carries gohai host information worth persisting.
    pub fn has_host_info(&self) -> bool {
        !self.gohai.is_empty()
    }

    /// Builds the `system_info` record describing the reporting host.
    pub fn system_info(&self, org_id: OrgId, time: i64) -> MetricData {
        // Keys are listed in sorted order.
        let tags = vec![
            format!("agentVersion={}", self.agent_version),
            format!("hostname={}", self.meta.hostname),
            format!("machine={}", self.system_stats.machine),
            format!("os={}", self.os),
            format!("processor={}", self.system_stats.processor),
            format!("socket_fqdn={}", self.meta.socket_fqdn),
            format!("socket_hostname={}", self.meta.socket_hostname),
        ];

        let mut metric = MetricData {
            org_id,
            name: SYSTEM_INFO_METRIC.to_owned(),
            unit: UNKNOWN_UNIT.to_owned(),
            value: 1.0,
            time,
            mtype: MetricType::Gauge.as_str().to_owned(),
            tags,
            ..Default::default()
        };
        metric.set_id();
        metric
    }
}

fn parse<T: DeserializeOwned>(body: &[u8], deflate: bool) -> Result<T, DecodeError> {
    if body.is_empty() {
        return Err(DecodeError::MissingBody);
    }

    let data = body::maybe_inflate(body, deflate).map_err(DecodeError::Decompress)?;
    serde_json::from_slice(&data).map_err(DecodeError::Unmarshal)
}

/// Decodes a series payload into one record per point.
pub fn decode_series(body: &[u8], cx: &DecodeContext<'_>) -> Result<Vec<PooledMetric>, DecodeError> {
    let payload: SeriesPayload = parse(body, cx.deflate)?;

    let count = payload.series.iter().map(|s| s.points.len()).sum();
    let mut metrics = Vec::with_capacity(count);

    for series in &payload.series {
        let tags = build_tag_set(
            &series.host,
            &series.device,
            series.tags.as_deref().unwrap_or_default(),
        );

        for &(timestamp, value) in &series.points {
            let mut metric = cx.pool.get();
            metric.org_id = cx.org_id;
            metric.name.push_str(&series.name);
            metric.unit.push_str(UNKNOWN_UNIT);
            metric.value = value;
            metric.time = timestamp as i64;
            metric.mtype.push_str(&series.mtype);
            metric.tags.extend_from_slice(&tags);
            metrics.push(metric);
        }
    }

    Ok(metrics)
}

/// Decodes a list of service checks into one gauge record per check.
pub fn decode_checks(body: &[u8], cx: &DecodeContext<'_>) -> Result<Vec<PooledMetric>, DecodeError> {
    let checks: Vec<Check> = parse(body, cx.deflate)?;

    let mut metrics = Vec::with_capacity(checks.len());
    for check in &checks {
        let mut metric = cx.pool.get();
        metric.org_id = cx.org_id;
        metric.name.push_str(&check.check);
        metric.unit.push_str(UNKNOWN_UNIT);
        metric.value = check.status;
        metric.time = check.timestamp;
        metric.mtype.push_str(MetricType::Gauge.as_str());
        build_tag_set_into(
            &mut metric.tags,
            &check.host,
            "",
            check.tags.as_deref().unwrap_or_default(),
        );
        metrics.push(metric);
    }

    Ok(metrics)
}

/// Decodes the host metadata payload of the intake endpoint.
pub fn decode_intake(body: &[u8], deflate: bool) -> Result<IntakePayload, DecodeError> {
    parse(body, deflate)
}
