use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use metricgate_config::Config;
use metricgate_metrics::{MetricPool, OrgId, SchemaError, SchemaResolver, StorageSchemas};

use crate::http::HttpError;
use crate::ingest::DecodeContext;
use crate::services::auth::{AuthPlugin, StaticAuth};
use crate::services::discards::DiscardCounters;
use crate::services::persist::{Persister, create_persister};
use crate::services::publish::{Publisher, create_publisher};

/// Indicates the type of failure of the server.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The storage schema rules could not be compiled.
    #[error("could not load storage schemas")]
    Schemas(#[from] SchemaError),

    /// Creating an upstream HTTP client failed.
    #[error("could not initialize upstream client")]
    Http(#[from] HttpError),
}

struct StateInner {
    config: Arc<Config>,
    pool: MetricPool,
    discards: DiscardCounters,
    publisher: Box<dyn Publisher>,
    persister: Box<dyn Persister>,
    schemas: Box<dyn SchemaResolver>,
    auth: Box<dyn AuthPlugin>,
    shutting_down: AtomicBool,
}

/// Server state.
///
/// Constructed once at startup and shared by all request handlers.
#[derive(Clone)]
pub struct ServiceState {
    inner: Arc<StateInner>,
}

impl ServiceState {
    /// Creates all collaborators from the configuration.
    pub fn start(config: Arc<Config>) -> Result<Self, ServiceError> {
        let schemas = StorageSchemas::from_rules(config.schema_rules())?;
        let publisher = create_publisher(&config)?;
        let persister = create_persister(&config)?;
        let auth = StaticAuth::from_config(&config);

        Ok(Self::builder(config)
            .schemas(schemas)
            .publisher(publisher)
            .persister(persister)
            .auth(auth)
            .build())
    }

    /// Returns a builder with defaults that reject every caller and drop all output.
    pub fn builder(config: Arc<Config>) -> ServiceStateBuilder {
        ServiceStateBuilder::new(config)
    }

    /// Returns a reference to the gateway configuration.
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Returns the shared record pool.
    pub fn pool(&self) -> &MetricPool {
        &self.inner.pool
    }

    /// Returns the process wide validation counters.
    pub fn discards(&self) -> &DiscardCounters {
        &self.inner.discards
    }

    pub fn publisher(&self) -> &dyn Publisher {
        self.inner.publisher.as_ref()
    }

    pub fn persister(&self) -> &dyn Persister {
        self.inner.persister.as_ref()
    }

    pub fn auth(&self) -> &dyn AuthPlugin {
        self.inner.auth.as_ref()
    }

    /// Builds the decoder inputs for a request of the given tenant.
    pub fn decode_context(&self, org_id: OrgId, deflate: bool) -> DecodeContext<'_> {
        DecodeContext {
            pool: &self.inner.pool,
            org_id,
            schemas: self.inner.schemas.as_ref(),
            deflate,
        }
    }

    /// Marks the gateway as shutting down, which fails readiness checks.
    pub fn start_shutdown(&self) {
        self.inner.shutting_down.store(true, Ordering::Relaxed);
    }

    /// Returns `true` once graceful shutdown has started.
    pub fn is_shutting_down(&self) -> bool {
        self.inner.shutting_down.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceState")
            .field("pool", &self.inner.pool)
            .field("shutting_down", &self.is_shutting_down())
            .finish_non_exhaustive()
    }
}

impl FromRequestParts<Self> for ServiceState {
    type Rejection = Infallible;

    async fn from_request_parts(_: &mut Parts, state: &Self) -> Result<Self, Self::Rejection> {
        Ok(state.clone())
    }
}

/// Assembles a [`ServiceState`] from explicit collaborators.
pub struct ServiceStateBuilder {
    config: Arc<Config>,
    publisher: Box<dyn Publisher>,
    persister: Box<dyn Persister>,
    schemas: Box<dyn SchemaResolver>,
    auth: Box<dyn AuthPlugin>,
}

impl ServiceStateBuilder {
    fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            publisher: Box::new(crate::services::publish::NullPublisher),
            persister: Box::new(crate::services::persist::NullPersister),
            schemas: Box::new(StorageSchemas::default()),
            auth: Box::new(StaticAuth::new()),
        }
    }

    pub fn publisher(mut self, publisher: Box<dyn Publisher>) -> Self {
        self.publisher = publisher;
        self
    }

    pub fn persister(mut self, persister: Box<dyn Persister>) -> Self {
        self.persister = persister;
        self
    }

    pub fn schemas(mut self, schemas: impl SchemaResolver + 'static) -> Self {
        self.schemas = Box::new(schemas);
        self
    }

    pub fn auth(mut self, auth: impl AuthPlugin + 'static) -> Self {
        self.auth = Box::new(auth);
        self
    }

    pub fn build(self) -> ServiceState {
        let pool = MetricPool::new(self.config.pool_capacity());

        ServiceState {
            inner: Arc::new(StateInner {
                config: self.config,
                pool,
                discards: DiscardCounters::new(),
                publisher: self.publisher,
                persister: self.persister,
                schemas: self.schemas,
                auth: self.auth,
                shutting_down: AtomicBool::new(false),
            }),
        }
    }
}
