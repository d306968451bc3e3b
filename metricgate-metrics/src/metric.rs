use std::fmt;
use std::io::Write;
use std::str::FromStr;

use serde::de::{self, Unexpected, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Unit assigned to records whose source protocol carries no unit.
pub const UNKNOWN_UNIT: &str = "unknown";

/// Identifier of a tenant.
///
/// Ordinary callers are confined to their own org. Administrative callers may submit records for
/// any org.
#[derive(
    Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize,
)]
#[serde(transparent)]
pub struct OrgId(i64);

impl OrgId {
    /// The org of the administrative caller.
    pub const ADMIN: Self = Self(1);

    /// Creates a new org identifier.
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the numeric value of this org.
    pub const fn value(self) -> i64 {
        self.0
    }
}

impl fmt::Display for OrgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<i64> for OrgId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// The metric types accepted by the storage backend.
///
/// [`MetricData`] carries its type as a plain string so that unknown types can be rejected per
/// record during validation instead of failing the entire request.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum MetricType {
    /// An absolute snapshot of a value. This is the default for records without a type.
    Gauge,
    /// A per-second rate.
    Rate,
    /// A number of occurrences within the interval.
    Count,
    /// A monotonically increasing counter.
    Counter,
    /// A point in time, in seconds.
    Timestamp,
}

impl MetricType {
    /// Returns the wire name of this metric type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gauge => "gauge",
            Self::Rate => "rate",
            Self::Count => "count",
            Self::Counter => "counter",
            Self::Timestamp => "timestamp",
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown [`MetricType`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
#[error("unknown metric type")]
pub struct ParseMetricTypeError;

impl FromStr for MetricType {
    type Err = ParseMetricTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "gauge" => Self::Gauge,
            "rate" => Self::Rate,
            "count" => Self::Count,
            "counter" => Self::Counter,
            "timestamp" => Self::Timestamp,
            _ => return Err(ParseMetricTypeError),
        })
    }
}

/// A single observed data point in its canonical shape.
///
/// All wire formats are converted into this record before validation and publishing. The field
/// names double as the JSON and MessagePack keys of the native protocol. Missing fields take
/// their default value.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricData {
    /// Content-addressed identity, see [`compute_id`](Self::compute_id).
    pub id: String,
    /// The tenant this record belongs to.
    pub org_id: OrgId,
    /// Identifying name of the series.
    pub name: String,
    /// Display name, often a copy of `name`.
    pub metric: String,
    /// Seconds between expected samples, `0` if unknown.
    pub interval: i32,
    /// Unit of `value`.
    pub unit: String,
    /// The observed sample.
    ///
    /// Text formats carry non-finite samples as the strings `"NaN"`, `"+Inf"` and `"-Inf"`.
    #[serde(serialize_with = "serialize_sample", deserialize_with = "deserialize_sample")]
    pub value: f64,
    /// Unix timestamp in seconds.
    pub time: i64,
    /// The metric type name, see [`MetricType`].
    pub mtype: String,
    /// Tags in `key=value` or bare form.
    #[serde(deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn serialize_sample<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    if value.is_finite() || !serializer.is_human_readable() {
        return serializer.serialize_f64(*value);
    }

    serializer.serialize_str(if value.is_nan() {
        "NaN"
    } else if value.is_sign_positive() {
        "+Inf"
    } else {
        "-Inf"
    })
}

struct SampleVisitor;

impl Visitor<'_> for SampleVisitor {
    type Value = f64;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a number or one of \"NaN\", \"+Inf\", \"-Inf\"")
    }

    fn visit_f64<E>(self, v: f64) -> Result<f64, E> {
        Ok(v)
    }

    fn visit_i64<E>(self, v: i64) -> Result<f64, E> {
        Ok(v as f64)
    }

    fn visit_u64<E>(self, v: u64) -> Result<f64, E> {
        Ok(v as f64)
    }

    fn visit_str<E>(self, v: &str) -> Result<f64, E>
    where
        E: de::Error,
    {
        match v {
            "NaN" => Ok(f64::NAN),
            "+Inf" | "Inf" => Ok(f64::INFINITY),
            "-Inf" => Ok(f64::NEG_INFINITY),
            _ => Err(E::invalid_value(Unexpected::Str(v), &self)),
        }
    }
}

fn deserialize_sample<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(SampleVisitor)
}

impl MetricData {
    /// Computes the identity of this record.
    ///
    /// The identity is `"<org_id>.<md5>"`, where the digest covers the name, unit, type, interval
    /// and tags separated by NUL bytes. Tags are hashed in their stored order, so callers that
    /// need stable identities across submissions must keep tags sorted.
    pub fn compute_id(&self) -> String {
        let tags_len: usize = self.tags.iter().map(|tag| tag.len() + 1).sum();
        let mut buffer = Vec::with_capacity(
            self.name.len() + self.unit.len() + self.mtype.len() + tags_len + 16,
        );

        buffer.extend_from_slice(self.name.as_bytes());
        buffer.push(0);
        buffer.extend_from_slice(self.unit.as_bytes());
        buffer.push(0);
        buffer.extend_from_slice(self.mtype.as_bytes());
        buffer.push(0);
        // Writing into a Vec cannot fail.
        let _ = write!(buffer, "{}", self.interval);

        for tag in &self.tags {
            buffer.push(0);
            buffer.extend_from_slice(tag.as_bytes());
        }

        format!("{}.{:x}", self.org_id, md5::compute(&buffer))
    }

    /// Stores the result of [`compute_id`](Self::compute_id) in `id`.
    ///
    /// Must be called after the org and type have been finalized.
    pub fn set_id(&mut self) {
        self.id = self.compute_id();
    }

    /// Parses the type of this record.
    pub fn metric_type(&self) -> Option<MetricType> {
        self.mtype.parse().ok()
    }

    /// Clears all fields while keeping allocated capacity.
    pub fn reset(&mut self) {
        self.id.clear();
        self.org_id = OrgId::default();
        self.name.clear();
        self.metric.clear();
        self.interval = 0;
        self.unit.clear();
        self.value = 0.0;
        self.time = 0;
        self.mtype.clear();
        self.tags.clear();
    }

    /// Returns `true` if no field carries data.
    pub fn is_reset(&self) -> bool {
        self.id.is_empty()
            && self.org_id == OrgId::default()
            && self.name.is_empty()
            && self.metric.is_empty()
            && self.interval == 0
            && self.unit.is_empty()
            && self.value == 0.0
            && self.time == 0
            && self.mtype.is_empty()
            && self.tags.is_empty()
    }
}
