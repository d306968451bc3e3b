use std::sync::Arc;

use axum::http::StatusCode;
use data_encoding::BASE64;
use metricgate_config::Config;
use metricgate_metrics::{MetricData, OrgId, StorageSchemas};
use parking_lot::Mutex;

use crate::http::HttpError;
use crate::service::ServiceState;
use crate::services::auth::StaticAuth;
use crate::services::persist::{PersistError, Persister};
use crate::services::publish::{MetricBatch, PublishError, Publisher};

pub const ADMIN_KEY: &str = "admin-key";
pub const TENANT_KEY: &str = "tenant-key";
pub const TENANT_ORG: i64 = 5;

/// Records every published batch.
#[derive(Clone, Debug, Default)]
pub struct CapturingPublisher {
    batches: Arc<Mutex<Vec<Vec<MetricData>>>>,
}

impl CapturingPublisher {
    pub fn batches(&self) -> Vec<Vec<MetricData>> {
        self.batches.lock().clone()
    }
}

#[async_trait::async_trait]
impl Publisher for CapturingPublisher {
    async fn publish(&self, batch: &MetricBatch) -> Result<(), PublishError> {
        self.batches.lock().push(batch.iter().cloned().collect());
        Ok(())
    }
}

/// Rejects every batch as if the upstream was unavailable.
#[derive(Debug, Default)]
pub struct FailingPublisher;

#[async_trait::async_trait]
impl Publisher for FailingPublisher {
    async fn publish(&self, _batch: &MetricBatch) -> Result<(), PublishError> {
        Err(HttpError::Status(StatusCode::SERVICE_UNAVAILABLE).into())
    }
}

/// Records every persisted record.
#[derive(Clone, Debug, Default)]
pub struct CapturingPersister {
    records: Arc<Mutex<Vec<MetricData>>>,
}

impl CapturingPersister {
    pub fn records(&self) -> Vec<MetricData> {
        self.records.lock().clone()
    }
}

#[async_trait::async_trait]
impl Persister for CapturingPersister {
    async fn persist(&self, metrics: &[MetricData]) -> Result<(), PersistError> {
        self.records.lock().extend_from_slice(metrics);
        Ok(())
    }
}

/// Rejects every record as if the storage upstream was unavailable.
#[derive(Debug, Default)]
pub struct FailingPersister;

#[async_trait::async_trait]
impl Persister for FailingPersister {
    async fn persist(&self, _metrics: &[MetricData]) -> Result<(), PersistError> {
        Err(HttpError::Status(StatusCode::BAD_GATEWAY).into())
    }
}

pub fn test_auth() -> StaticAuth {
    StaticAuth::new()
        .with_admin_key(ADMIN_KEY)
        .with_tenant_key(TENANT_KEY, OrgId::new(TENANT_ORG))
}

/// Creates a state with test credentials and the given publisher.
pub fn state_with_publisher(publisher: Box<dyn Publisher>) -> ServiceState {
    ServiceState::builder(Arc::new(Config::default()))
        .publisher(publisher)
        .schemas(StorageSchemas::default())
        .auth(test_auth())
        .build()
}

/// Formats an `Authorization` header value using basic auth with the given key.
pub fn basic_auth(key: &str) -> String {
    format!("Basic {}", BASE64.encode(format!("api_key:{key}").as_bytes()))
}
