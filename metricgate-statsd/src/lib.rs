//! A high-level StatsD metric client built on cadence.
//!
//! ## Defining Metrics
//!
//! In order to use metrics, one needs to first define one of the metric traits on a custom enum.
//! The following types of metrics are available: `counter`, `timer` and `gauge`. For explanations
//! on what that means see [Metric Types].
//!
//! The metric traits serve only to provide a type safe metric name. All metric types have exactly
//! the same form, they are different only to ensure that a metric can only be used for the type
//! for which it was defined, (e.g. a counter metric cannot be used as a timer metric).
//!
//! ## Initializing the Client
//!
//! Metrics can be used without initializing a statsd client. In that case, invoking
//! [`with_client`] or the [`metric!`] macro will become a noop. Only when configured, metrics will
//! actually be collected.
//!
//! ```no_run
//! # use std::collections::BTreeMap;
//! # use metricgate_statsd::MetricsClientConfig;
//!
//! metricgate_statsd::init(MetricsClientConfig {
//!     prefix: "metricgate",
//!     host: "localhost:8125",
//!     default_tags: BTreeMap::new(),
//!     sample_rate: 1.0,
//! })
//! .ok();
//! ```
//!
//! ## Macro Usage
//!
//! ```
//! use metricgate_statsd::{metric, CounterMetric};
//!
//! struct MyCounter;
//!
//! impl CounterMetric for MyCounter {
//!     fn name(&self) -> &'static str {
//!         "counter"
//!     }
//! }
//!
//! metric!(counter(MyCounter) += 1);
//! ```
//!
//! [Metric Types]: https://github.com/statsd/statsd/blob/master/docs/metric_types.md
use std::collections::BTreeMap;
use std::io;
use std::net::{ToSocketAddrs, UdpSocket};
use std::ops::Deref;
use std::sync::Arc;

use cadence::{BufferedUdpMetricSink, Metric, MetricBuilder, QueuingMetricSink, StatsdClient};
use parking_lot::RwLock;
use rand::Rng;

/// Maximum number of metric events that can be queued before we start dropping them.
const METRICS_MAX_QUEUE_SIZE: usize = 100_000;

/// Client configuration object to store globally.
#[derive(Debug)]
pub struct MetricsClient {
    /// The raw statsd client.
    pub statsd_client: StatsdClient,
    /// Default tags to apply to every metric.
    pub default_tags: BTreeMap<String, String>,
    /// Global sample rate between `0.0` and `1.0`.
    pub sample_rate: f64,
}

/// Client configuration used for initialization of [`MetricsClient`].
#[derive(Debug)]
pub struct MetricsClientConfig<'a, A> {
    /// Prefix which is prepended to all metric names.
    pub prefix: &'a str,
    /// Host of the metrics upstream.
    pub host: A,
    /// Tags that are added to all metrics.
    pub default_tags: BTreeMap<String, String>,
    /// Sample rate for metrics, between 0.0 (= 0%) and 1.0 (= 100%).
    pub sample_rate: f64,
}

impl Deref for MetricsClient {
    type Target = StatsdClient;

    fn deref(&self) -> &StatsdClient {
        &self.statsd_client
    }
}

impl MetricsClient {
    /// Send a metric with the default tags defined on this `MetricsClient`.
    #[inline(always)]
    pub fn send_metric<'a, T>(&'a self, mut metric: MetricBuilder<'a, '_, T>)
    where
        T: Metric + From<String>,
    {
        if !self.should_send() {
            return;
        }

        for (k, v) in &self.default_tags {
            metric = metric.with_tag(k, v);
        }

        if let Err(error) = metric.try_send() {
            metricgate_log::error!(
                error = &error as &dyn std::error::Error,
                maximum_capacity = METRICS_MAX_QUEUE_SIZE,
                "error sending a metric",
            );
        }
    }

    fn should_send(&self) -> bool {
        if self.sample_rate <= 0.0 {
            false
        } else if self.sample_rate >= 1.0 {
            true
        } else {
            rand::rng().random::<f64>() <= self.sample_rate
        }
    }
}

static METRICS_CLIENT: RwLock<Option<Arc<MetricsClient>>> = RwLock::new(None);

thread_local! {
    static CURRENT_CLIENT: std::cell::RefCell<Option<Arc<MetricsClient>>> =
        METRICS_CLIENT.read().clone().into();
}

/// Internal prelude for the macro.
#[doc(hidden)]
pub mod _pred {
    pub use cadence::prelude::*;
}

fn set_client(client: MetricsClient) {
    *METRICS_CLIENT.write() = Some(Arc::new(client));
    CURRENT_CLIENT.with(|cell| cell.replace(METRICS_CLIENT.read().clone()));
}

/// Set a test client for the period of the called function (only affects the current thread).
pub fn with_capturing_test_client(f: impl FnOnce()) -> Vec<String> {
    let (rx, sink) = cadence::SpyMetricSink::new();
    let test_client = MetricsClient {
        statsd_client: StatsdClient::from_sink("", sink),
        default_tags: Default::default(),
        sample_rate: 1.0,
    };

    CURRENT_CLIENT.with(|cell| {
        let old_client = cell.replace(Some(Arc::new(test_client)));
        f();
        cell.replace(old_client);
    });

    rx.iter()
        .map(|x| String::from_utf8_lossy(&x).into_owned())
        .collect()
}

/// Tell the metrics system to report to statsd.
///
/// Metrics are written to a non-blocking queue and flushed over UDP by a background thread.
pub fn init<A: ToSocketAddrs>(config: MetricsClientConfig<'_, A>) -> io::Result<()> {
    let addr = config.host.to_socket_addrs()?.next().ok_or_else(|| {
        io::Error::new(io::ErrorKind::AddrNotAvailable, "no address for statsd host")
    })?;

    metricgate_log::info!("reporting metrics to statsd at {addr}");
    metricgate_log::debug!(
        "metrics sample rate is set to {}{}",
        config.sample_rate,
        if config.sample_rate <= 0.0 {
            ", no metrics will be reported"
        } else {
            ""
        }
    );

    let socket = UdpSocket::bind("0.0.0.0:0")?;
    socket.set_nonblocking(true)?;
    let udp_sink = BufferedUdpMetricSink::from(addr, socket).map_err(io::Error::other)?;
    let queuing_sink = QueuingMetricSink::with_capacity(udp_sink, METRICS_MAX_QUEUE_SIZE);

    set_client(MetricsClient {
        statsd_client: StatsdClient::from_sink(config.prefix, queuing_sink),
        default_tags: config.default_tags,
        sample_rate: config.sample_rate.clamp(0.0, 1.0),
    });

    Ok(())
}

/// Invoke a callback with the current statsd client.
///
/// If statsd is not configured the callback is not invoked. For the most part the [`metric!`]
/// macro should be used instead.
#[inline(always)]
pub fn with_client<F, R>(f: F) -> R
where
    F: FnOnce(&MetricsClient) -> R,
    R: Default,
{
    CURRENT_CLIENT.with(|client| {
        if let Some(client) = client.borrow().as_deref() {
            f(client)
        } else {
            R::default()
        }
    })
}

/// A metric for capturing timings.
///
/// Timings are a positive number of milliseconds between a start and end time.
///
/// ## Example
///
/// ```
/// use metricgate_statsd::{metric, TimerMetric};
///
/// struct RequestDuration;
///
/// impl TimerMetric for RequestDuration {
///     fn name(&self) -> &'static str {
///         "requests.duration"
///     }
/// }
///
/// # use std::time::Instant;
/// let start_time = Instant::now();
/// metric!(timer(RequestDuration) = start_time.elapsed(), route = "metrics");
///
/// // measure time implicitly by enclosing a code block in a metric
/// metric!(timer(RequestDuration), {
///     // work
/// });
/// ```
pub trait TimerMetric {
    /// Returns the timer metric name that will be sent to statsd.
    fn name(&self) -> &'static str;
}

/// A metric for capturing counters.
///
/// ## Example
///
/// ```
/// use metricgate_statsd::{metric, CounterMetric};
///
/// enum MyCounter {
///     TotalRequests,
///     TotalBytes,
/// }
///
/// impl CounterMetric for MyCounter {
///     fn name(&self) -> &'static str {
///         match self {
///             Self::TotalRequests => "total_requests",
///             Self::TotalBytes => "total_bytes",
///         }
///     }
/// }
///
/// # let buffer = &[(), ()];
/// metric!(counter(MyCounter::TotalRequests) += 1);
/// metric!(counter(MyCounter::TotalBytes) += buffer.len() as i64, route = "metrics");
/// ```
pub trait CounterMetric {
    /// Returns the counter metric name that will be sent to statsd.
    fn name(&self) -> &'static str;
}

/// A metric for capturing gauges.
///
/// Gauge values are an instantaneous measurement of a value determined by the client.
///
/// ## Example
///
/// ```
/// use metricgate_statsd::{metric, GaugeMetric};
///
/// struct PoolOutstanding;
///
/// impl GaugeMetric for PoolOutstanding {
///     fn name(&self) -> &'static str {
///         "pool.outstanding"
///     }
/// }
///
/// metric!(gauge(PoolOutstanding) = 12);
/// ```
pub trait GaugeMetric {
    /// Returns the gauge metric name that will be sent to statsd.
    fn name(&self) -> &'static str;
}

/// Emits a metric.
///
/// See [crate-level documentation](self) for examples.
#[macro_export]
macro_rules! metric {
    // counter increment
    (counter($id:expr) += $value:expr $(, $($k:ident).* = $v:expr)* $(,)?) => {
        match $value {
            value if value != 0 => {
                $crate::with_client(|client| {
                    use $crate::_pred::*;
                    client.send_metric(
                        client.count_with_tags(&$crate::CounterMetric::name(&$id), value)
                        $(.with_tag(stringify!($($k).*), $v))*
                    )
                })
            },
            _ => {},
        };
    };

    // gauge set
    (gauge($id:expr) = $value:expr $(, $($k:ident).* = $v:expr)* $(,)?) => {
        $crate::with_client(|client| {
            use $crate::_pred::*;
            client.send_metric(
                client.gauge_with_tags(&$crate::GaugeMetric::name(&$id), $value)
                    $(.with_tag(stringify!($($k).*), $v))*
            )
        })
    };

    // timer value
    (timer($id:expr) = $value:expr $(, $($k:ident).* = $v:expr)* $(,)?) => {
        $crate::with_client(|client| {
            use $crate::_pred::*;
            client.send_metric(
                client.time_with_tags(&$crate::TimerMetric::name(&$id), $value)
                    $(.with_tag(stringify!($($k).*), $v))*
            )
        })
    };

    // timed block
    (timer($id:expr), $($($k:ident).* = $v:expr,)* $block:block) => {{
        let now = std::time::Instant::now();
        let rv = {$block};
        $crate::metric!(timer($id) = now.elapsed() $(, $($k).* = $v)*);
        rv
    }};
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use cadence::{NopMetricSink, StatsdClient};

    use crate::{
        CounterMetric, GaugeMetric, MetricsClient, TimerMetric, set_client,
        with_capturing_test_client, with_client,
    };

    enum TestGauges {
        Foo,
        Bar,
    }

    impl GaugeMetric for TestGauges {
        fn name(&self) -> &'static str {
            match self {
                Self::Foo => "foo",
                Self::Bar => "bar",
            }
        }
    }

    struct TestCounter;

    impl CounterMetric for TestCounter {
        fn name(&self) -> &'static str {
            "counter"
        }
    }

    struct TestTimer;

    impl TimerMetric for TestTimer {
        fn name(&self) -> &'static str {
            "timer"
        }
    }

    #[test]
    fn test_capturing_client() {
        let captures = with_capturing_test_client(|| {
            metric!(gauge(TestGauges::Foo) = 123, server = "server1", host = "host1");
            metric!(gauge(TestGauges::Bar) = 456, server = "server2", host = "host2");
        });

        assert_eq!(
            captures,
            [
                "foo:123|g|#server:server1,host:host1",
                "bar:456|g|#server:server2,host:host2"
            ]
        )
    }

    #[test]
    fn current_client_is_global_client() {
        let client1 = with_client(|c| format!("{c:?}"));
        set_client(MetricsClient {
            statsd_client: StatsdClient::from_sink("", NopMetricSink),
            default_tags: Default::default(),
            sample_rate: 1.0,
        });
        let client2 = with_client(|c| format!("{c:?}"));

        assert_ne!(client1, client2);
    }

    #[test]
    fn test_counter_tags_with_dots() {
        let captures = with_capturing_test_client(|| {
            metric!(counter(TestCounter) += 10, discard.reason = "invalid mtype", org = "5");
            metric!(counter(TestCounter) += 5, org = "5");
        });
        assert_eq!(
            captures,
            [
                "counter:10|c|#discard.reason:invalid mtype,org:5",
                "counter:5|c|#org:5"
            ]
        );
    }

    #[test]
    fn test_counter_zero_is_skipped() {
        let captures = with_capturing_test_client(|| {
            metric!(counter(TestCounter) += 0);
        });
        assert!(captures.is_empty());
    }

    #[test]
    fn test_timer_in_millis() {
        let captures = with_capturing_test_client(|| {
            metric!(timer(TestTimer) = Duration::from_secs(2), route = "metrics");
        });
        assert_eq!(captures, ["timer:2000|ms|#route:metrics"]);
    }

    #[test]
    fn test_timed_block_returns_value() {
        let mut value = 0;
        let captures = with_capturing_test_client(|| {
            value = metric!(timer(TestTimer), route = "metrics", { 42 });
        });
        assert_eq!(value, 42);
        assert!(captures[0].ends_with("|ms|#route:metrics"));
    }

    #[test]
    fn test_disabled_sampling_sends_nothing() {
        let client = MetricsClient {
            statsd_client: StatsdClient::from_sink("", NopMetricSink),
            default_tags: Default::default(),
            sample_rate: 0.0,
        };
        assert!(!client.should_send());
    }
}
