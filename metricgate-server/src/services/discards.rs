use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use metricgate_metrics::{DiscardLedger, OrgId};
use metricgate_statsd::metric;
use parking_lot::Mutex;
use serde::Serialize;

use crate::statsd::ServerCounters;

/// Process-wide counters of accepted and rejected records.
///
/// Every ingestion request merges its [`DiscardLedger`] exactly once via [`merge`](Self::merge)
/// and reports its accepted records via [`add_valid`](Self::add_valid). All updates are mirrored
/// to statsd.
#[derive(Debug, Default)]
pub struct DiscardCounters {
    valid: AtomicU64,
    rejected: AtomicU64,
    discards: Mutex<BTreeMap<(OrgId, &'static str), u64>>,
}

impl DiscardCounters {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts records that were handed to the publisher.
    pub fn add_valid(&self, count: usize) {
        self.valid.fetch_add(count as u64, Ordering::Relaxed);
        metric!(counter(ServerCounters::MetricsValid) += count as u64);
    }

    /// Merges the rejections of a single request.
    pub fn merge(&self, ledger: &DiscardLedger) {
        if ledger.is_empty() {
            return;
        }

        let total = ledger.total() as u64;
        self.rejected.fetch_add(total, Ordering::Relaxed);
        metric!(counter(ServerCounters::MetricsRejected) += total);

        let mut discards = self.discards.lock();
        for (org_id, reason, count) in ledger.iter() {
            *discards.entry((org_id, reason)).or_default() += count as u64;
            metric!(
                counter(ServerCounters::MetricsDiscarded) += count as u64,
                org = &org_id.to_string(),
                reason = reason,
            );
        }
    }

    /// Returns the number of records handed to the publisher so far.
    pub fn valid(&self) -> u64 {
        self.valid.load(Ordering::Relaxed)
    }

    /// Returns the number of records rejected so far.
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Returns the number of rejections for an org and reason.
    pub fn discarded(&self, org_id: OrgId, reason: &str) -> u64 {
        self.discards
            .lock()
            .iter()
            .find(|((org, r), _)| *org == org_id && *r == reason)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }

    /// Takes a consistent copy of all counters.
    pub fn snapshot(&self) -> DiscardSnapshot {
        let discards = self.discards.lock();
        DiscardSnapshot {
            valid: self.valid(),
            rejected: self.rejected(),
            discards: discards
                .iter()
                .map(|(&(org_id, reason), &count)| DiscardEntry {
                    org_id,
                    reason,
                    count,
                })
                .collect(),
        }
    }
}

/// A single `(org, reason)` row of a [`DiscardSnapshot`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DiscardEntry {
    /// The tenant the rejected records were attributed to.
    #[serde(rename = "org")]
    pub org_id: OrgId,
    /// The validation failure.
    pub reason: &'static str,
    /// Number of records rejected for this reason.
    pub count: u64,
}

/// Copy of the [`DiscardCounters`] at one point in time.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DiscardSnapshot {
    /// Records handed to the publisher.
    pub valid: u64,
    /// Records rejected by validation.
    pub rejected: u64,
    /// Rejections by org and reason, ordered by org.
    pub discards: Vec<DiscardEntry>,
}

#[cfg(test)]
mod tests {
    use metricgate_metrics::InvalidMetric;

    use super::*;

    #[test]
    fn test_merge_accumulates() {
        let counters = DiscardCounters::new();

        let mut ledger = DiscardLedger::new();
        ledger.add(OrgId::new(5), InvalidMetric::NameEmpty);
        ledger.add(OrgId::new(5), InvalidMetric::NameEmpty);
        ledger.add(OrgId::new(7), InvalidMetric::InvalidMtype);

        counters.merge(&ledger);
        counters.merge(&ledger);
        counters.add_valid(3);

        assert_eq!(counters.valid(), 3);
        assert_eq!(counters.rejected(), 6);
        assert_eq!(counters.discarded(OrgId::new(5), "name cannot be empty"), 4);
        assert_eq!(counters.discarded(OrgId::new(7), "invalid mtype"), 2);
        assert_eq!(counters.discarded(OrgId::new(7), "name cannot be empty"), 0);
    }

    #[test]
    fn test_merge_emits_metrics() {
        let counters = DiscardCounters::new();
        let mut ledger = DiscardLedger::new();
        ledger.add(OrgId::new(5), InvalidMetric::TimeNegative);

        let captures = metricgate_statsd::with_capturing_test_client(|| {
            counters.merge(&ledger);
        });

        assert_eq!(
            captures,
            [
                "metrics.rejected:1|c",
                "metrics.discarded:1|c|#org:5,reason:time cannot be negative",
            ]
        );
    }

    #[test]
    fn test_empty_ledger_is_noop() {
        let counters = DiscardCounters::new();
        let captures = metricgate_statsd::with_capturing_test_client(|| {
            counters.merge(&DiscardLedger::new());
        });
        assert!(captures.is_empty());
        assert_eq!(counters.rejected(), 0);
    }

    #[test]
    fn test_snapshot() {
        let counters = DiscardCounters::new();
        let mut ledger = DiscardLedger::new();
        ledger.add(OrgId::new(3), InvalidMetric::InvalidTag);
        counters.merge(&ledger);

        insta::assert_json_snapshot!(counters.snapshot(), @r###"
        {
          "valid": 0,
          "rejected": 1,
          "discards": [
            {
              "org": 3,
              "reason": "invalid tag format",
              "count": 1
            }
          ]
        }
        "###);
    }
}
