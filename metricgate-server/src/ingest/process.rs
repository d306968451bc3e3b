use metricgate_metrics::{DiscardLedger, MetricType, PooledMetric, validate};

use crate::ingest::MetricsResponse;
use crate::services::auth::Caller;
use crate::services::publish::MetricBatch;

/// Result of validating the decoded records of one request.
#[derive(Debug)]
pub struct Processed {
    /// Accepted records with their identity set, in input order.
    pub batch: MetricBatch,
    /// Response listing the rejected input positions. `published` is filled in after publishing.
    pub response: MetricsResponse,
    /// Rejections of this request by org and reason.
    pub discards: DiscardLedger,
}

/// Applies type defaulting, tenant stamping and validation to decoded records.
///
/// Non-admin callers always have their own org stamped before validation, so they can never
/// write to a foreign tenant. Admin callers keep the org declared in the payload, which is also
/// the org their rejections are attributed to. Rejected records return to the pool immediately.
pub fn process(metrics: Vec<PooledMetric>, caller: Caller) -> Processed {
    let mut batch = MetricBatch::with_capacity(metrics.len());
    let mut response = MetricsResponse::new();
    let mut discards = DiscardLedger::new();

    for (index, mut metric) in metrics.into_iter().enumerate() {
        if metric.mtype.is_empty() {
            metric.mtype.push_str(MetricType::Gauge.as_str());
        }

        if !caller.is_admin {
            metric.org_id = caller.org_id;
        }

        match validate(&metric) {
            Ok(()) => {
                metric.set_id();
                batch.push(metric);
            }
            Err(reason) => {
                metricgate_log::debug!(
                    name = %metric.name,
                    org_id = metric.org_id.value(),
                    tags = ?metric.tags,
                    %reason,
                    "received invalid metric",
                );
                response.add_invalid(index, reason);
                discards.add(metric.org_id, reason);
            }
        }
    }

    Processed {
        batch,
        response,
        discards,
    }
}
