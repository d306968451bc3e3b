use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use metricgate_metrics::{OrgId, SchemaRule, StorageSchemas};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::byte_size::ByteSize;

type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Defines the source of a config error.
#[derive(Debug, Default)]
enum ConfigErrorSource {
    /// An error occurring independently.
    #[default]
    None,
    /// An error originating from a configuration file.
    File(PathBuf),
    /// An error originating in a field override (a CLI parameter or environment variable).
    FieldOverride(String),
}

/// Indicates config related errors.
#[derive(Debug)]
pub struct ConfigError {
    source: ConfigErrorSource,
    kind: ConfigErrorKind,
    inner: Option<BoxError>,
}

impl ConfigError {
    #[inline]
    fn new(kind: ConfigErrorKind) -> Self {
        Self {
            source: ConfigErrorSource::None,
            kind,
            inner: None,
        }
    }

    #[inline]
    fn wrap<E>(inner: E, kind: ConfigErrorKind) -> Self
    where
        E: Into<BoxError>,
    {
        Self {
            source: ConfigErrorSource::None,
            kind,
            inner: Some(inner.into()),
        }
    }

    #[inline]
    fn for_field<E>(inner: E, field: &'static str) -> Self
    where
        E: Into<BoxError>,
    {
        Self::wrap(inner, ConfigErrorKind::InvalidValue).field(field)
    }

    #[inline]
    fn file(mut self, p: impl AsRef<Path>) -> Self {
        self.source = ConfigErrorSource::File(p.as_ref().to_path_buf());
        self
    }

    #[inline]
    fn field(mut self, name: &'static str) -> Self {
        self.source = ConfigErrorSource::FieldOverride(name.to_owned());
        self
    }

    /// Returns the error kind of the error.
    pub fn kind(&self) -> ConfigErrorKind {
        self.kind
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            ConfigErrorSource::None => self.kind.fmt(f),
            ConfigErrorSource::File(file_name) => {
                write!(f, "{} (file {})", self.kind, file_name.display())
            }
            ConfigErrorSource::FieldOverride(name) => write!(f, "{} (field {})", self.kind, name),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.inner.as_ref().map(|e| e.as_ref() as &(dyn Error + 'static))
    }
}

/// Indicates config related errors.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, thiserror::Error)]
pub enum ConfigErrorKind {
    /// Failed to open the file.
    #[error("could not open config file")]
    CouldNotOpenFile,
    /// Failed to save a file.
    #[error("could not write config file")]
    CouldNotWriteFile,
    /// Parsing YAML failed.
    #[error("could not parse yaml config file")]
    BadYaml,
    /// Invalid config value.
    #[error("invalid config value")]
    InvalidValue,
}

trait ConfigObject: DeserializeOwned + Serialize + Default {
    /// The basename of the config file.
    fn name() -> &'static str;

    /// The full filename of the config file, including the file extension.
    fn path(base: &Path) -> PathBuf {
        base.join(format!("{}.yml", Self::name()))
    }

    /// Loads the config file from a file within the given directory location.
    ///
    /// A missing file yields the default configuration.
    fn load(base: &Path) -> Result<Self, ConfigError> {
        let path = Self::path(base);

        let f = match fs::File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(ConfigError::wrap(e, ConfigErrorKind::CouldNotOpenFile).file(&path));
            }
        };

        let contents = io::read_to_string(f)
            .map_err(|e| ConfigError::wrap(e, ConfigErrorKind::CouldNotOpenFile).file(&path))?;

        // An empty file deserializes as YAML null.
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_yaml::from_str(&contents)
            .map_err(|e| ConfigError::wrap(e, ConfigErrorKind::BadYaml).file(&path))
    }

    /// Writes the configuration object to the given writer.
    fn write<W: Write>(&self, writer: &mut W) -> Result<(), ConfigError> {
        serde_yaml::to_writer(writer, self)
            .map_err(|e| ConfigError::wrap(e, ConfigErrorKind::CouldNotWriteFile))
    }

    /// Writes the configuration to a file within the given directory location.
    fn save(&self, base: &Path) -> Result<(), ConfigError> {
        let path = Self::path(base);
        let mut options = fs::OpenOptions::new();
        options.write(true).create_new(true);

        // Remove all non-user permissions for the newly created file.
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut f = options
            .open(&path)
            .map_err(|e| ConfigError::wrap(e, ConfigErrorKind::CouldNotWriteFile).file(&path))?;

        self.write(&mut f).map_err(|e| e.file(&path))?;
        f.write_all(b"\n").ok();

        Ok(())
    }
}

/// Structure used to hold information about configuration overrides via CLI parameters or
/// environment variables.
#[derive(Debug, Default)]
pub struct OverridableConfig {
    /// The host the gateway should bind to (network interface).
    pub host: Option<String>,
    /// The port to bind for the HTTP server.
    pub port: Option<String>,
    /// URL of the upstream receiving published batches.
    pub publish_url: Option<String>,
    /// Key that authenticates the administrative caller.
    pub admin_key: Option<String>,
    /// Shutdown timeout in seconds.
    pub shutdown_timeout: Option<String>,
}

fn is_default<T: Default + PartialEq>(t: &T) -> bool {
    *t == T::default()
}

fn default_host() -> IpAddr {
    IpAddr::from([127, 0, 0, 1])
}

/// Network settings of the HTTP server.
#[derive(Serialize, Deserialize, Debug)]
#[serde(default)]
struct Gateway {
    /// The host the gateway should bind to (network interface).
    host: IpAddr,
    /// The port to bind for the HTTP server.
    port: u16,
}

impl Default for Gateway {
    fn default() -> Self {
        Gateway {
            host: default_host(),
            port: 3000,
        }
    }
}

/// Control the internal metrics.
#[derive(Serialize, Deserialize, Debug)]
#[serde(default)]
struct Metrics {
    /// Hostname and port of the statsd server.
    ///
    /// Defaults to `None`, which disables internal metrics.
    statsd: Option<String>,
    /// Common prefix that should be added to all metrics.
    prefix: String,
    /// Default tags to apply to all metrics.
    default_tags: BTreeMap<String, String>,
    /// Tag name to report the hostname to for each metric. Defaults to not sending such a tag.
    hostname_tag: Option<String>,
    /// Global sample rate for all emitted metrics between `0.0` and `1.0`.
    sample_rate: f64,
}

impl Default for Metrics {
    fn default() -> Self {
        Metrics {
            statsd: None,
            prefix: "metricgate".into(),
            default_tags: BTreeMap::new(),
            hostname_tag: None,
            sample_rate: 1.0,
        }
    }
}

/// Controls various limits.
#[derive(Serialize, Deserialize, Debug)]
#[serde(default)]
struct Limits {
    /// The maximum payload size of an ingestion request.
    max_payload_size: ByteSize,
    /// The maximum number of idle records kept in the record pool.
    pool_capacity: usize,
    /// The maximum number of seconds to wait for in-flight requests after receiving a shutdown
    /// signal.
    shutdown_timeout: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_payload_size: ByteSize::mebibytes(20),
            pool_capacity: 4096,
            shutdown_timeout: 10,
        }
    }
}

/// Static authentication keys.
#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(default)]
struct Auth {
    /// Key of the administrative caller, who may submit data for any org.
    #[serde(skip_serializing_if = "Option::is_none")]
    admin_key: Option<String>,
    /// Tenant keys mapped to the org they authenticate.
    #[serde(skip_serializing_if = "is_default")]
    keys: BTreeMap<String, OrgId>,
}

/// Settings of an HTTP hand-off target.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(default)]
struct Upstream {
    /// Target URL. Records are only logged if not set.
    url: Option<String>,
    /// Request timeout in seconds.
    timeout: u64,
}

impl Default for Upstream {
    fn default() -> Self {
        Self {
            url: None,
            timeout: 10,
        }
    }
}

fn default_schemas() -> Vec<SchemaRule> {
    vec![SchemaRule::catch_all()]
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(default)]
struct ConfigValues {
    gateway: Gateway,
    logging: metricgate_log::LogConfig,
    metrics: Metrics,
    limits: Limits,
    auth: Auth,
    publish: Upstream,
    persist: Upstream,
    schemas: Vec<SchemaRule>,
}

impl Default for ConfigValues {
    fn default() -> Self {
        Self {
            gateway: Gateway::default(),
            logging: metricgate_log::LogConfig::default(),
            metrics: Metrics::default(),
            limits: Limits::default(),
            auth: Auth::default(),
            publish: Upstream::default(),
            persist: Upstream::default(),
            schemas: default_schemas(),
        }
    }
}

impl ConfigObject for ConfigValues {
    fn name() -> &'static str {
        "config"
    }
}

/// Config struct.
pub struct Config {
    values: ConfigValues,
    path: PathBuf,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("path", &self.path)
            .field("values", &self.values)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            values: ConfigValues::default(),
            path: PathBuf::new(),
        }
    }
}

impl Config {
    /// Loads a config from a given config folder.
    ///
    /// A missing folder or file results in the default configuration.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let path = std::env::current_dir()
            .map(|x| x.join(path.as_ref()))
            .unwrap_or_else(|_| path.as_ref().to_path_buf());

        let config = Config {
            values: ConfigValues::load(&path)?,
            path: path.clone(),
        };

        config.validate().map_err(|e| e.file(&path))?;
        Ok(config)
    }

    /// Creates a config from a YAML string.
    ///
    /// This is mostly useful for tests.
    pub fn from_yaml_str(yaml: &str) -> Result<Config, ConfigError> {
        let config = Config {
            values: serde_yaml::from_str(yaml)
                .map_err(|e| ConfigError::wrap(e, ConfigErrorKind::BadYaml))?,
            path: PathBuf::new(),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        StorageSchemas::from_rules(&self.values.schemas)
            .map_err(|e| ConfigError::wrap(e, ConfigErrorKind::InvalidValue))?;

        let sample_rate = self.values.metrics.sample_rate;
        if !(0.0..=1.0).contains(&sample_rate) {
            return Err(ConfigError::new(ConfigErrorKind::InvalidValue));
        }

        Ok(())
    }

    /// Override configuration with values coming from other sources (e.g. env variables or
    /// command line parameters).
    pub fn apply_override(
        &mut self,
        overrides: OverridableConfig,
    ) -> Result<&mut Self, ConfigError> {
        let gateway = &mut self.values.gateway;

        if let Some(host) = overrides.host {
            gateway.host = host
                .parse::<IpAddr>()
                .map_err(|err| ConfigError::for_field(err, "host"))?;
        }

        if let Some(port) = overrides.port {
            gateway.port = port
                .as_str()
                .parse()
                .map_err(|err| ConfigError::for_field(err, "port"))?;
        }

        if let Some(url) = overrides.publish_url {
            self.values.publish.url = Some(url).filter(|url| !url.is_empty());
        }

        if let Some(admin_key) = overrides.admin_key {
            if admin_key.is_empty() {
                return Err(ConfigError::new(ConfigErrorKind::InvalidValue).field("admin_key"));
            }
            self.values.auth.admin_key = Some(admin_key);
        }

        if let Some(shutdown_timeout) = overrides.shutdown_timeout {
            self.values.limits.shutdown_timeout = shutdown_timeout
                .parse()
                .map_err(|err| ConfigError::for_field(err, "shutdown_timeout"))?;
        }

        Ok(self)
    }

    /// Checks if the config is already initialized.
    pub fn config_exists<P: AsRef<Path>>(path: P) -> bool {
        fs::metadata(ConfigValues::path(path.as_ref())).is_ok()
    }

    /// Writes the default configuration into the given folder.
    ///
    /// Fails if a config file already exists.
    pub fn init_path<P: AsRef<Path>>(path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        fs::create_dir_all(path)
            .map_err(|e| ConfigError::wrap(e, ConfigErrorKind::CouldNotWriteFile).file(path))?;
        ConfigValues::default().save(path)
    }

    /// Returns the folder the config was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Dumps out a YAML string of the values.
    pub fn to_yaml_string(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(&self.values)
            .map_err(|e| ConfigError::wrap(e, ConfigErrorKind::CouldNotWriteFile))
    }

    /// Returns the socket address the HTTP server binds to.
    pub fn listen_addr(&self) -> SocketAddr {
        (self.values.gateway.host, self.values.gateway.port).into()
    }

    /// Returns logging configuration.
    pub fn logging(&self) -> &metricgate_log::LogConfig {
        &self.values.logging
    }

    /// Returns the address of the statsd server, if internal metrics are enabled.
    pub fn statsd_addr(&self) -> Option<&str> {
        self.values.metrics.statsd.as_deref()
    }

    /// Returns the prefix of all internal metrics.
    pub fn metrics_prefix(&self) -> &str {
        &self.values.metrics.prefix
    }

    /// Returns the default tags of all internal metrics.
    pub fn metrics_default_tags(&self) -> &BTreeMap<String, String> {
        &self.values.metrics.default_tags
    }

    /// Returns the name of the tag carrying the hostname, if configured.
    pub fn metrics_hostname_tag(&self) -> Option<&str> {
        self.values.metrics.hostname_tag.as_deref()
    }

    /// Returns the sample rate of internal metrics.
    pub fn metrics_sample_rate(&self) -> f64 {
        self.values.metrics.sample_rate
    }

    /// Returns the maximum size of an ingestion request body in bytes.
    pub fn max_payload_size(&self) -> usize {
        self.values.limits.max_payload_size.as_bytes() as usize
    }

    /// Returns the maximum number of idle records kept in the record pool.
    pub fn pool_capacity(&self) -> usize {
        self.values.limits.pool_capacity
    }

    /// Returns the time to wait for in-flight requests during shutdown.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.values.limits.shutdown_timeout)
    }

    /// Returns the key of the administrative caller.
    pub fn admin_key(&self) -> Option<&str> {
        self.values.auth.admin_key.as_deref()
    }

    /// Returns tenant keys and their orgs.
    pub fn tenant_keys(&self) -> &BTreeMap<String, OrgId> {
        &self.values.auth.keys
    }

    /// Returns the URL receiving published batches, if configured.
    pub fn publish_url(&self) -> Option<&str> {
        self.values.publish.url.as_deref()
    }

    /// Returns the timeout of publish requests.
    pub fn publish_timeout(&self) -> Duration {
        Duration::from_secs(self.values.publish.timeout)
    }

    /// Returns the URL receiving persisted records, if configured.
    pub fn persist_url(&self) -> Option<&str> {
        self.values.persist.url.as_deref()
    }

    /// Returns the timeout of persist requests.
    pub fn persist_timeout(&self) -> Duration {
        Duration::from_secs(self.values.persist.timeout)
    }

    /// Returns the storage schema rules in declaration order.
    pub fn schema_rules(&self) -> &[SchemaRule] {
        &self.values.schemas
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.listen_addr().to_string(), "127.0.0.1:3000");
        assert_eq!(config.max_payload_size(), 20 * 1024 * 1024);
        assert_eq!(config.pool_capacity(), 4096);
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(10));
        assert_eq!(config.metrics_prefix(), "metricgate");
        assert!(config.statsd_addr().is_none());
        assert!(config.admin_key().is_none());
        assert!(config.publish_url().is_none());
        assert_eq!(config.schema_rules(), [SchemaRule::catch_all()]);
    }

    #[test]
    fn test_from_yaml() {
        let config = Config::from_yaml_str(
            r#"
gateway:
  port: 8080
limits:
  max_payload_size: 1MiB
auth:
  admin_key: secret
  keys:
    five: 5
publish:
  url: http://localhost:6060/metrics
schemas:
  - name: fast
    pattern: "^fast\\."
    retentions: "10s:1d,1m:30d"
"#,
        )
        .unwrap();

        assert_eq!(config.listen_addr().port(), 8080);
        assert_eq!(config.max_payload_size(), 1024 * 1024);
        assert_eq!(config.admin_key(), Some("secret"));
        assert_eq!(config.tenant_keys().get("five"), Some(&OrgId::new(5)));
        assert_eq!(config.publish_url(), Some("http://localhost:6060/metrics"));
        assert_eq!(config.schema_rules().len(), 1);
        assert_eq!(config.schema_rules()[0].name, "fast");
    }

    #[test]
    fn test_invalid_schema() {
        let err = Config::from_yaml_str(
            r#"
schemas:
  - name: broken
    pattern: ".*"
    retentions: "fast"
"#,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ConfigErrorKind::InvalidValue);
        assert!(err.source().is_some());
    }

    #[test]
    fn test_bad_yaml() {
        let err = Config::from_yaml_str("gateway: [").unwrap_err();
        assert_eq!(err.kind(), ConfigErrorKind::BadYaml);
    }

    #[test]
    fn test_apply_override() {
        let mut config = Config::default();
        config
            .apply_override(OverridableConfig {
                host: Some("0.0.0.0".to_owned()),
                port: Some("9000".to_owned()),
                publish_url: Some("http://publisher/".to_owned()),
                admin_key: Some("admin".to_owned()),
                shutdown_timeout: Some("3".to_owned()),
            })
            .unwrap();

        assert_eq!(config.listen_addr().to_string(), "0.0.0.0:9000");
        assert_eq!(config.publish_url(), Some("http://publisher/"));
        assert_eq!(config.admin_key(), Some("admin"));
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_override_invalid_port() {
        let mut config = Config::default();
        let err = config
            .apply_override(OverridableConfig {
                port: Some("not-a-port".to_owned()),
                ..Default::default()
            })
            .unwrap_err();

        assert_eq!(err.kind(), ConfigErrorKind::InvalidValue);
        assert_eq!(err.to_string(), "invalid config value (field port)");
    }

    #[test]
    fn test_missing_folder_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::from_path(dir.path().join("does-not-exist")).unwrap();
        assert_eq!(config.listen_addr().port(), 3000);
    }

    #[test]
    fn test_empty_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.yml"), "").unwrap();
        let config = Config::from_path(dir.path()).unwrap();
        assert_eq!(config.pool_capacity(), 4096);
    }

    #[test]
    fn test_init_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!Config::config_exists(dir.path()));

        Config::init_path(dir.path()).unwrap();
        assert!(Config::config_exists(dir.path()));

        let config = Config::from_path(dir.path()).unwrap();
        assert_eq!(config.listen_addr().port(), 3000);

        // Refuses to overwrite an existing file.
        let err = Config::init_path(dir.path()).unwrap_err();
        assert_eq!(err.kind(), ConfigErrorKind::CouldNotWriteFile);
    }

    #[test]
    fn test_yaml_dump() {
        let config = Config::from_yaml_str("auth: { admin_key: k }").unwrap();
        let yaml = config.to_yaml_string().unwrap();
        assert!(yaml.contains("admin_key: k"));
        assert!(yaml.contains("max_payload_size: 20MiB"));
    }
}
