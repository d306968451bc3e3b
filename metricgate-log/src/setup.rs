#[cfg(feature = "init")]
use std::env;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::level_filters::LevelFilter;
#[cfg(feature = "init")]
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// Crates of the workspace that log at the configured level.
#[cfg(feature = "init")]
const CRATE_NAMES: &[&str] = &[
    "metricgate",
    "metricgate_config",
    "metricgate_log",
    "metricgate_metrics",
    "metricgate_server",
    "metricgate_statsd",
];

/// Controls the log format.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Auto detect the best format.
    ///
    /// This chooses [`LogFormat::Pretty`] for TTY, otherwise [`LogFormat::Simplified`].
    Auto,

    /// Pretty printing with colors.
    ///
    /// ```text
    ///  INFO  metricgate::setup > gateway listening on 127.0.0.1:3000
    /// ```
    Pretty,

    /// Simplified plain text output.
    ///
    /// ```text
    /// 2024-12-04T12:10:32Z [metricgate::setup] INFO: gateway listening on 127.0.0.1:3000
    /// ```
    Simplified,

    /// Dump out JSON lines.
    ///
    /// ```text
    /// {"timestamp":"2024-12-04T12:11:08.729716Z","level":"INFO","logger":"metricgate::setup","message":"gateway listening on 127.0.0.1:3000"}
    /// ```
    Json,
}

/// Controls the logging system.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct LogConfig {
    /// The log level for the gateway.
    #[serde(
        serialize_with = "serialize_level_filter",
        deserialize_with = "deserialize_level_filter"
    )]
    pub level: LevelFilter,

    /// Controls the log output format.
    ///
    /// Defaults to [`LogFormat::Auto`], which detects the best format based on the TTY.
    pub format: LogFormat,

    /// When set to `true`, backtraces are forced on.
    ///
    /// Otherwise, backtraces can be enabled by setting the `RUST_BACKTRACE` variable to `full`.
    pub enable_backtraces: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
            format: LogFormat::Auto,
            enable_backtraces: false,
        }
    }
}

fn serialize_level_filter<S>(filter: &LevelFilter, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&filter.to_string().to_lowercase())
}

fn deserialize_level_filter<'de, D>(deserializer: D) -> Result<LevelFilter, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    LevelFilter::from_str(&s).map_err(serde::de::Error::custom)
}

/// Builds the default filter directives: the configured level for all workspace crates and a
/// conservative level for everything else.
#[cfg(feature = "init")]
fn default_filters(level: LevelFilter) -> EnvFilter {
    let mut env_filter = EnvFilter::new("INFO")
        // hyper and tower are very spammy on DEBUG.
        .add_directive("hyper=warn".parse().unwrap())
        .add_directive("tower_http=info".parse().unwrap());

    for name in CRATE_NAMES {
        env_filter = env_filter.add_directive(format!("{name}={level}").parse().unwrap());
    }

    env_filter
}

/// Initialize the logging system.
///
/// The `RUST_LOG` environment variable takes precedence over the configured level. This function
/// may only be called once; subsequent calls have no effect.
///
/// # Example
///
/// ```ignore
/// let log_config = metricgate_log::LogConfig {
///     enable_backtraces: true,
///     ..Default::default()
/// };
///
/// metricgate_log::init(&log_config);
/// ```
#[cfg(feature = "init")]
pub fn init(config: &LogConfig) {
    if config.enable_backtraces {
        // SAFETY: invoked during startup before any other threads are spawned.
        unsafe { env::set_var("RUST_BACKTRACE", "full") };
    }

    let subscriber = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    let format = match (config.format, console::user_attended()) {
        (LogFormat::Auto, true) | (LogFormat::Pretty, _) => {
            subscriber.compact().without_time().with_ansi(true).boxed()
        }
        (LogFormat::Auto, false) | (LogFormat::Simplified, _) => {
            subscriber.with_ansi(false).boxed()
        }
        (LogFormat::Json, _) => subscriber
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
    };

    let filter = match env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) if !directives.is_empty() => EnvFilter::new(directives),
        _ => default_filters(config.level),
    };

    tracing_subscriber::registry()
        .with(format.with_filter(filter))
        .try_init()
        .ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_config_defaults() {
        let config: LogConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.level, LevelFilter::INFO);
        assert_eq!(config.format, LogFormat::Auto);
        assert!(!config.enable_backtraces);
    }

    #[test]
    fn test_log_config_roundtrip_level() {
        let config: LogConfig = serde_yaml::from_str("level: debug\nformat: json").unwrap();
        assert_eq!(config.level, LevelFilter::DEBUG);
        assert_eq!(config.format, LogFormat::Json);

        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("level: debug"));
    }

    #[test]
    fn test_log_config_bad_level() {
        let result = serde_yaml::from_str::<LogConfig>("level: loud");
        assert!(result.is_err());
    }
}
