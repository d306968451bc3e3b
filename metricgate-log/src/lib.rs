//! Logging facade and error reporting helpers for metricgate.
//!
//! # Setup
//!
//! To enable logging, invoke the [`init`] function with a [`LogConfig`]. The configuration
//! implements `serde` traits, so it can be obtained from the gateway's configuration file:
//!
//! ```ignore
//! let log_config = metricgate_log::LogConfig {
//!     enable_backtraces: true,
//!     ..Default::default()
//! };
//!
//! metricgate_log::init(&log_config);
//! ```
//!
//! # Logging
//!
//! The basic use of the log crate is through the five logging macros: [`error!`], [`warn!`],
//! [`info!`], [`debug!`] and [`trace!`] where `error!` represents the highest-priority log
//! messages and `trace!` the lowest.
//!
//! Structured fields are supported through the `tracing` syntax:
//!
//! ```
//! let org_id = 5;
//! metricgate_log::debug!(org_id, reason = "invalid mtype", "rejected metric");
//! ```
//!
//! ## Logging Error Types
//!
//! To log [errors](std::error::Error) to both console and tracing subscribers, use
//! [`LogError`], which prints the error together with its full chain of sources:
//!
//! ```
//! use metricgate_log::LogError;
//!
//! if let Err(error) = std::env::var("FOO") {
//!     metricgate_log::error!("env failed: {}", LogError(&error));
//! }
//! ```
//!
//! # Testing
//!
//! For unit testing, there is a separate initialization macro [`init_test!`] that should be called
//! at the beginning of a test function. It enables logging for the calling crate only.

#![warn(missing_docs)]

mod setup;
pub use setup::*;

mod utils;
pub use utils::*;

#[cfg(feature = "test")]
mod test;
#[cfg(feature = "test")]
pub use test::*;

// Expose the minimal log facade.
#[doc(inline)]
pub use tracing::{Level, debug, error, info, trace, warn};
// Expose the level filter used in configuration.
#[doc(inline)]
pub use tracing::level_filters::LevelFilter;
