//! Hand-off of validated batches to the publishing collaborator.

use std::fmt;

use metricgate_config::Config;
use metricgate_metrics::{MetricData, PooledMetric};
use serde::{Serialize, Serializer};

use crate::http::{HttpError, HttpTarget};

/// A validated sequence of records ready for publishing.
///
/// Records keep their position from the decoded input. The batch owns the pooled records; they
/// return to the pool when the batch is dropped.
#[derive(Default)]
pub struct MetricBatch {
    metrics: Vec<PooledMetric>,
}

impl MetricBatch {
    /// Creates an empty batch with room for `capacity` records.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            metrics: Vec::with_capacity(capacity),
        }
    }

    /// Appends an accepted record.
    pub fn push(&mut self, metric: PooledMetric) {
        self.metrics.push(metric);
    }

    /// Returns the number of records in the batch.
    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    /// Returns `true` if the batch holds no records.
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Iterates the records in input order.
    pub fn iter(&self) -> impl Iterator<Item = &MetricData> + '_ {
        self.metrics.iter().map(|metric| &**metric)
    }
}

impl fmt::Debug for MetricBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl Serialize for MetricBatch {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(self.iter())
    }
}

/// The batch could not be delivered. No partial delivery is assumed.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// Sending the batch to the upstream failed.
    #[error(transparent)]
    Http(#[from] HttpError),
}

/// Delivers validated batches downstream.
///
/// Called exactly once per publishing request, also for empty batches.
#[async_trait::async_trait]
pub trait Publisher: Send + Sync {
    /// Delivers the entire batch or fails.
    async fn publish(&self, batch: &MetricBatch) -> Result<(), PublishError>;
}

/// Publishes batches as a JSON array to an HTTP endpoint.
#[derive(Debug)]
pub struct HttpPublisher {
    target: HttpTarget,
}

impl HttpPublisher {
    /// Creates a publisher for the configured `publish.url`.
    pub fn new(url: &str, config: &Config) -> Result<Self, HttpError> {
        Ok(Self {
            target: HttpTarget::new(url, config.publish_timeout())?,
        })
    }
}

#[async_trait::async_trait]
impl Publisher for HttpPublisher {
    async fn publish(&self, batch: &MetricBatch) -> Result<(), PublishError> {
        if batch.is_empty() {
            return Ok(());
        }

        self.target.post_json(batch).await?;
        metricgate_log::trace!(count = batch.len(), url = self.target.url(), "published batch");
        Ok(())
    }
}

/// Accepts all batches without delivering them.
///
/// Used when no publish upstream is configured.
#[derive(Debug, Default)]
pub struct NullPublisher;

#[async_trait::async_trait]
impl Publisher for NullPublisher {
    async fn publish(&self, batch: &MetricBatch) -> Result<(), PublishError> {
        metricgate_log::debug!(count = batch.len(), "dropping batch, no publisher configured");
        Ok(())
    }
}

/// Creates the publisher selected by the configuration.
pub fn create_publisher(config: &Config) -> Result<Box<dyn Publisher>, HttpError> {
    Ok(match config.publish_url() {
        Some(url) => Box::new(HttpPublisher::new(url, config)?),
        None => Box::new(NullPublisher),
    })
}
