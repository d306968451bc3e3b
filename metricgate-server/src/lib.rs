//! The metricgate ingestion gateway.
//!
//! This crate contains the [`run`] function which starts the HTTP server. The gateway accepts
//! metric samples in several wire formats, normalizes them into a single record model, validates
//! them and hands each request's valid records to a [`Publisher`](services::publish::Publisher).
//!
//! # Path of a Request
//!
//! 1. An extractor authenticates the caller through the configured
//!    [`AuthPlugin`](services::auth::AuthPlugin).
//! 2. The [`Format`](ingest::Format) of the route or content type decodes the body into pooled
//!    records. Decoding failures reject the whole request with `400`.
//! 3. [`process`](ingest::process) defaults the metric type, stamps the caller's tenant for
//!    non-admin callers and validates every record. Rejections are tallied per tenant and reason.
//! 4. The valid batch is published exactly once. The response lists the published count and the
//!    rejected input positions.
//!
//! Records are drawn from a shared [`MetricPool`](metricgate_metrics::MetricPool) and returned to
//! it on every exit path.
//!
//! See the [`Config`] documentation for more information on configuration options.

mod constants;
mod endpoints;
mod extractors;
mod http;
pub mod ingest;
mod middlewares;
mod service;
pub mod services;
mod statsd;

#[cfg(test)]
mod testutils;

use std::sync::Arc;

use metricgate_config::Config;

pub use self::http::HttpError;
pub use self::service::{ServiceError, ServiceState, ServiceStateBuilder};
pub use self::services::server::{HttpServer, ServerError, make_app, shutdown_signal};

/// Runs the gateway web server.
///
/// This blocks the current thread until a shutdown signal is received and in-flight requests
/// have drained, or a fatal error happens. Behavior of the server is determined by the `config`
/// passed into this function.
pub fn run(config: Config) -> anyhow::Result<()> {
    let config = Arc::new(config);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("gateway-rt")
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let service = ServiceState::start(config.clone())?;
        let server = HttpServer::new(config, service)?;
        server.run(shutdown_signal()).await?;
        Ok(())
    })
}
