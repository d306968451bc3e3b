//! The metricgate ingestion gateway.
//!
//! Metricgate accepts metric samples from many tenants in several wire formats, normalizes them
//! into a single record model, validates them and hands valid records to a downstream publisher:
//!
//!  - Native JSON and binary envelope batches on `/metrics`
//!  - Prometheus remote write on `/prometheus/write`
//!  - Datadog agent series, service checks and host metadata on `/datadog/...`
//!
//! # Workspace Crates
//!
//! Metricgate is split into the following workspace crates:
//!
//!  - `metricgate`: Main entry point and command line interface.
//!  - [`metricgate-config`]: Static configuration for the CLI and server.
//!  - [`metricgate-log`]: Logging setup and error reporting helpers.
//!  - [`metricgate-metrics`]: The canonical record model, validation and the record pool.
//!  - [`metricgate-server`]: Endpoints, decoders and services.
//!  - [`metricgate-statsd`]: High-level StatsD metric client for internal measurements.
//!
//! [`metricgate-config`]: ../metricgate_config/index.html
//! [`metricgate-log`]: ../metricgate_log/index.html
//! [`metricgate-metrics`]: ../metricgate_metrics/index.html
//! [`metricgate-server`]: ../metricgate_server/index.html
//! [`metricgate-statsd`]: ../metricgate_statsd/index.html

mod cli;
mod cliapp;
mod setup;

use std::process;

pub fn main() {
    let exit_code = match cli::execute() {
        Ok(()) => 0,
        Err(err) => {
            metricgate_log::ensure_error(&err);
            1
        }
    };

    process::exit(exit_code);
}
