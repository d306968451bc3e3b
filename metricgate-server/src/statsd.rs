use metricgate_statsd::{CounterMetric, GaugeMetric, TimerMetric};

/// Gauge metrics used by the gateway.
pub enum ServerGauges {
    /// Number of records currently checked out of the record pool.
    ///
    /// Reported after every ingestion request. A value that keeps growing indicates a leak.
    PoolOutstanding,
    /// Number of idle records held by the record pool.
    PoolIdle,
}

impl GaugeMetric for ServerGauges {
    fn name(&self) -> &'static str {
        match self {
            Self::PoolOutstanding => "pool.outstanding",
            Self::PoolIdle => "pool.idle",
        }
    }
}

/// Timer metrics used by the gateway.
pub enum ServerTimers {
    /// Total time spent handling an ingestion request, from decoding to the publish response.
    ///
    /// This metric is tagged with:
    ///  - `route`: The ingestion route, e.g. `metrics` or `datadog_series`.
    RequestDuration,
    /// Time spent in the publish hand-off.
    PublishDuration,
}

impl TimerMetric for ServerTimers {
    fn name(&self) -> &'static str {
        match self {
            Self::RequestDuration => "requests.duration",
            Self::PublishDuration => "publish.duration",
        }
    }
}

/// Counter metrics used by the gateway.
pub enum ServerCounters {
    /// Number of records accepted and handed to the publisher.
    MetricsValid,
    /// Number of records rejected by validation.
    MetricsRejected,
    /// Number of rejected records, broken down by tenant and reason.
    ///
    /// This metric is tagged with:
    ///  - `org`: The tenant the record was attributed to.
    ///  - `reason`: The validation failure, e.g. `name cannot be empty`.
    MetricsDiscarded,
    /// Number of requests that failed before or during the publish hand-off.
    ///
    /// This metric is tagged with:
    ///  - `reason`: A short identifier of the failure, e.g. `decode` or `publish`.
    RequestsFailed,
    /// Number of requests rejected because of missing or invalid credentials.
    ///
    /// This metric is tagged with:
    ///  - `reason`: Either `missing` or `invalid`.
    AuthFailed,
    /// Number of times the server was started.
    ServerStarting,
}

impl CounterMetric for ServerCounters {
    fn name(&self) -> &'static str {
        match self {
            Self::MetricsValid => "metrics.valid",
            Self::MetricsRejected => "metrics.rejected",
            Self::MetricsDiscarded => "metrics.discarded",
            Self::RequestsFailed => "requests.failed",
            Self::AuthFailed => "requests.unauthorized",
            Self::ServerStarting => "server.starting",
        }
    }
}
