/// Value of the `Server` response header and the user agent of outbound requests.
pub const SERVER: &str = concat!("metricgate/", env!("CARGO_PKG_VERSION"));

/// Name of the label carrying the metric name in remote-write time series.
pub const METRIC_NAME_LABEL: &str = "__name__";

/// Name of the synthetic record produced from agent host information.
pub const SYSTEM_INFO_METRIC: &str = "system_info";
