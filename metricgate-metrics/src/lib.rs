//! Canonical metric records and the per-record rules applied during ingestion.
//!
//! Every wire format accepted by the gateway is normalized into a [`MetricData`] record. This
//! crate contains everything that operates on a single record or a batch of records without
//! knowledge of the transport:
//!
//!  - [`MetricData`] and its content-addressed identity ([`MetricData::compute_id`]).
//!  - [`build_tag_set`], the tag normalization used by the vendor-agent protocol.
//!  - [`validate`] with the stable rejection reasons of [`InvalidMetric`].
//!  - [`DiscardLedger`], a per-request tally of rejections grouped by tenant and reason.
//!  - [`MetricPool`], a free list of reusable records handed out as [`PooledMetric`] guards.
//!  - [`StorageSchemas`], the retention rules used to resolve sample intervals by name.
//!
//! # Example
//!
//! ```
//! use metricgate_metrics::{MetricPool, OrgId, validate};
//!
//! let pool = MetricPool::new(16);
//! let mut metric = pool.get();
//! metric.name.push_str("cpu.user");
//! metric.mtype.push_str("gauge");
//! metric.org_id = OrgId::new(5);
//! metric.time = 1_700_000_000;
//!
//! assert!(validate(&metric).is_ok());
//! metric.set_id();
//! assert!(metric.id.starts_with("5."));
//! ```

#![warn(missing_docs)]

mod discard;
mod metric;
mod pool;
mod schema;
mod tags;
mod validation;

pub use self::discard::*;
pub use self::metric::*;
pub use self::pool::*;
pub use self::schema::*;
pub use self::tags::*;
pub use self::validation::*;
