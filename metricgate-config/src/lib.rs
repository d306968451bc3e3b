//! Configuration for the metricgate CLI and server.
//!
//! The configuration is loaded from a folder containing a `config.yml` file. Every section and
//! every field is optional, so an empty or missing file yields a working local setup:
//!
//! ```yaml
//! gateway:
//!   host: 127.0.0.1
//!   port: 3000
//! logging:
//!   level: info
//! limits:
//!   max_payload_size: 20MiB
//! auth:
//!   admin_key: not_very_secret_key
//!   keys:
//!     tenant-five-key: 5
//! schemas:
//!   - name: default
//!     pattern: ".*"
//!     retentions: "1m:35d"
//! ```
//!
//! Selected values can be overridden from the command line through [`OverridableConfig`].

#![warn(missing_docs)]

mod byte_size;
mod config;

pub use self::byte_size::*;
pub use self::config::*;
