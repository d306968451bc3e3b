//! Durable storage of synthetic metadata records.

use metricgate_config::Config;
use metricgate_metrics::MetricData;

use crate::http::{HttpError, HttpTarget};

/// The records could not be stored.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// Sending the records to the persistence upstream failed.
    #[error(transparent)]
    Http(#[from] HttpError),
}

/// Stores records outside of the streaming publish path.
#[async_trait::async_trait]
pub trait Persister: Send + Sync {
    /// Stores all records or fails.
    async fn persist(&self, metrics: &[MetricData]) -> Result<(), PersistError>;
}

/// Persists records as a JSON array via an HTTP endpoint.
#[derive(Debug)]
pub struct HttpPersister {
    target: HttpTarget,
}

impl HttpPersister {
    /// Creates a persister for the configured `persist.url`.
    pub fn new(url: &str, config: &Config) -> Result<Self, HttpError> {
        Ok(Self {
            target: HttpTarget::new(url, config.persist_timeout())?,
        })
    }
}

#[async_trait::async_trait]
impl Persister for HttpPersister {
    async fn persist(&self, metrics: &[MetricData]) -> Result<(), PersistError> {
        self.target.post_json(metrics).await?;
        Ok(())
    }
}

/// Discards all records. Used when no persistence upstream is configured.
#[derive(Debug, Default)]
pub struct NullPersister;

#[async_trait::async_trait]
impl Persister for NullPersister {
    async fn persist(&self, metrics: &[MetricData]) -> Result<(), PersistError> {
        metricgate_log::debug!(count = metrics.len(), "dropping records, no persister configured");
        Ok(())
    }
}

/// Creates the persister selected by the configuration.
pub fn create_persister(config: &Config) -> Result<Box<dyn Persister>, HttpError> {
    Ok(match config.persist_url() {
        Some(url) => Box::new(HttpPersister::new(url, config)?),
        None => Box::new(NullPersister),
    })
}
