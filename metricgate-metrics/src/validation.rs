use crate::metric::{MetricData, OrgId};

/// Reason for rejecting a single record.
///
/// The display form of each variant is stable. It is reported back to callers in the response
/// body and used as the `reason` dimension of the discard counters.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, thiserror::Error)]
pub enum InvalidMetric {
    /// The org is zero, which is never assigned to a tenant.
    #[error("org-id cannot be 0")]
    OrgIdZero,
    /// The org is negative.
    #[error("org-id cannot be negative")]
    OrgIdNegative,
    /// The interval is negative.
    #[error("interval cannot be negative")]
    IntervalNegative,
    /// The name is empty.
    #[error("name cannot be empty")]
    NameEmpty,
    /// The metric type is not one of the accepted types.
    #[error("invalid mtype")]
    InvalidMtype,
    /// A tag is not a bare word or a `key=value` pair.
    #[error("invalid tag format")]
    InvalidTag,
    /// The timestamp is negative.
    #[error("time cannot be negative")]
    TimeNegative,
    /// The value is positive or negative infinity.
    #[error("value cannot be infinite")]
    ValueInfinite,
}

impl InvalidMetric {
    /// Returns the stable reason string of this rejection.
    pub fn name(self) -> &'static str {
        match self {
            Self::OrgIdZero => "org-id cannot be 0",
            Self::OrgIdNegative => "org-id cannot be negative",
            Self::IntervalNegative => "interval cannot be negative",
            Self::NameEmpty => "name cannot be empty",
            Self::InvalidMtype => "invalid mtype",
            Self::InvalidTag => "invalid tag format",
            Self::TimeNegative => "time cannot be negative",
            Self::ValueInfinite => "value cannot be infinite",
        }
    }
}

/// Checks whether a tag is well formed.
///
/// A tag is either a bare word or `key=value` with a non-empty key and value. The characters
/// `;`, `!` and `^` are reserved by the query language and may not appear anywhere.
pub fn is_valid_tag(tag: &str) -> bool {
    if tag.is_empty() || tag.contains([';', '!', '^']) {
        return false;
    }

    match tag.split_once('=') {
        Some((key, value)) => !key.is_empty() && !value.is_empty(),
        None => true,
    }
}

/// Validates a record.
///
/// Rules are checked in a fixed order and the first violation is returned. `NaN` values are
/// accepted since they are used as staleness markers.
pub fn validate(metric: &MetricData) -> Result<(), InvalidMetric> {
    if metric.org_id == OrgId::default() {
        return Err(InvalidMetric::OrgIdZero);
    }
    if metric.org_id.value() < 0 {
        return Err(InvalidMetric::OrgIdNegative);
    }
    if metric.interval < 0 {
        return Err(InvalidMetric::IntervalNegative);
    }
    if metric.name.is_empty() {
        return Err(InvalidMetric::NameEmpty);
    }
    if metric.metric_type().is_none() {
        return Err(InvalidMetric::InvalidMtype);
    }
    if !metric.tags.iter().all(|tag| is_valid_tag(tag)) {
        return Err(InvalidMetric::InvalidTag);
    }
    if metric.time < 0 {
        return Err(InvalidMetric::TimeNegative);
    }
    if metric.value.is_infinite() {
        return Err(InvalidMetric::ValueInfinite);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> MetricData {
        MetricData {
            org_id: OrgId::new(5),
            name: "cpu.user".to_owned(),
            mtype: "gauge".to_owned(),
            interval: 10,
            time: 1_700_000_000,
            value: 1.0,
            tags: vec!["host=a".to_owned(), "standalone".to_owned()],
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_record() {
        assert_eq!(validate(&valid()), Ok(()));
    }

    #[test]
    fn test_org_rules() {
        let mut metric = valid();
        metric.org_id = OrgId::new(0);
        assert_eq!(validate(&metric), Err(InvalidMetric::OrgIdZero));

        metric.org_id = OrgId::new(-3);
        assert_eq!(validate(&metric), Err(InvalidMetric::OrgIdNegative));
    }

    #[test]
    fn test_empty_name() {
        let mut metric = valid();
        metric.name.clear();
        assert_eq!(validate(&metric), Err(InvalidMetric::NameEmpty));
    }

    #[test]
    fn test_mtype() {
        let mut metric = valid();
        metric.mtype = "histogram".to_owned();
        assert_eq!(validate(&metric), Err(InvalidMetric::InvalidMtype));

        metric.mtype.clear();
        assert_eq!(validate(&metric), Err(InvalidMetric::InvalidMtype));

        for ty in ["rate", "count", "counter", "timestamp"] {
            metric.mtype = ty.to_owned();
            assert_eq!(validate(&metric), Ok(()));
        }
    }

    #[test]
    fn test_tag_rules() {
        for tag in ["", "=v", "k=", "a;b", "a!=b", "x^y"] {
            assert!(!is_valid_tag(tag), "{tag:?} should be invalid");
        }
        for tag in ["k=v", "bare", "url=http://x/?a=b", "k=v=w"] {
            assert!(is_valid_tag(tag), "{tag:?} should be valid");
        }

        let mut metric = valid();
        metric.tags.push("k=".to_owned());
        assert_eq!(validate(&metric), Err(InvalidMetric::InvalidTag));
    }

    #[test]
    fn test_time_and_value() {
        let mut metric = valid();
        metric.time = -1;
        assert_eq!(validate(&metric), Err(InvalidMetric::TimeNegative));

        let mut metric = valid();
        metric.value = f64::INFINITY;
        assert_eq!(validate(&metric), Err(InvalidMetric::ValueInfinite));

        metric.value = f64::NAN;
        assert_eq!(validate(&metric), Ok(()));
    }

    #[test]
    fn test_first_violation_wins() {
        let metric = MetricData {
            interval: -1,
            time: -1,
            ..Default::default()
        };
        assert_eq!(validate(&metric), Err(InvalidMetric::OrgIdZero));
    }

    #[test]
    fn test_reason_matches_display() {
        let all = [
            InvalidMetric::OrgIdZero,
            InvalidMetric::OrgIdNegative,
            InvalidMetric::IntervalNegative,
            InvalidMetric::NameEmpty,
            InvalidMetric::InvalidMtype,
            InvalidMetric::InvalidTag,
            InvalidMetric::TimeNegative,
            InvalidMetric::ValueInfinite,
        ];
        for reason in all {
            assert_eq!(reason.name(), reason.to_string());
        }
    }
}
