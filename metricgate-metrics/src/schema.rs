use std::fmt;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Interval in seconds returned when no schema applies.
pub const DEFAULT_INTERVAL: u32 = 60;

/// Resolves the expected sample interval of a series from its name.
pub trait SchemaResolver: Send + Sync {
    /// Returns the interval in seconds for the metric `name`.
    ///
    /// Rules are consulted in order. If none matches, the rule at `default_index` is used, and if
    /// that does not exist either, [`DEFAULT_INTERVAL`].
    fn interval(&self, name: &str, default_index: usize) -> u32;
}

/// Errors raised when parsing retentions or compiling schema rules.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// A retention string is malformed.
    #[error("invalid retention {0:?}")]
    InvalidRetention(String),
    /// A rule does not define any retention.
    #[error("schema {0:?} has no retentions")]
    MissingRetention(String),
    /// The name pattern of a rule is not a valid regular expression.
    #[error("schema {name:?} has an invalid pattern")]
    InvalidPattern {
        /// Name of the offending rule.
        name: String,
        /// The regex compilation error.
        #[source]
        source: regex::Error,
    },
}

/// A single archive of a storage schema, such as `10s:1d`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Retention {
    /// Resolution of the archive in seconds.
    pub seconds_per_point: u32,
    /// How long points are kept, in seconds.
    pub ttl: u32,
}

fn parse_seconds(s: &str) -> Option<u32> {
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (number, unit) = s.split_at(split);
    let number: u32 = number.parse().ok()?;

    let multiplier = match unit {
        "" | "s" => 1,
        "m" | "min" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        "w" => 7 * 24 * 60 * 60,
        "y" => 365 * 24 * 60 * 60,
        _ => return None,
    };

    number.checked_mul(multiplier)
}

impl FromStr for Retention {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SchemaError::InvalidRetention(s.to_owned());

        let (resolution, ttl) = s.trim().split_once(':').ok_or_else(invalid)?;
        let seconds_per_point = parse_seconds(resolution).ok_or_else(invalid)?;
        let ttl = parse_seconds(ttl).ok_or_else(invalid)?;

        if seconds_per_point == 0 {
            return Err(invalid());
        }

        Ok(Self {
            seconds_per_point,
            ttl,
        })
    }
}

impl fmt::Display for Retention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s:{}s", self.seconds_per_point, self.ttl)
    }
}

/// Parses a comma separated list of retentions, such as `10s:1d,1m:30d`.
pub fn parse_retentions(s: &str) -> Result<Vec<Retention>, SchemaError> {
    s.split(',')
        .filter(|part| !part.trim().is_empty())
        .map(str::parse)
        .collect()
}

/// Declarative form of a storage schema as it appears in the configuration file.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct SchemaRule {
    /// Name of the rule, used in error messages.
    pub name: String,
    /// Regular expression matched against metric names.
    pub pattern: String,
    /// Comma separated retentions, finest first.
    pub retentions: String,
}

impl SchemaRule {
    /// The catch-all rule used when no schemas are configured.
    pub fn catch_all() -> Self {
        Self {
            name: "default".to_owned(),
            pattern: ".*".to_owned(),
            retentions: "1m:35d".to_owned(),
        }
    }
}

/// A compiled [`SchemaRule`].
#[derive(Clone, Debug)]
pub struct StorageSchema {
    /// Name of the rule.
    pub name: String,
    /// Compiled name pattern.
    pub pattern: Regex,
    /// Retentions, finest first. Never empty.
    pub retentions: Vec<Retention>,
}

impl StorageSchema {
    /// Returns the resolution of the finest archive.
    pub fn interval(&self) -> u32 {
        self.retentions
            .first()
            .map_or(DEFAULT_INTERVAL, |r| r.seconds_per_point)
    }
}

/// An ordered list of storage schemas.
#[derive(Clone, Debug, Default)]
pub struct StorageSchemas {
    schemas: Vec<StorageSchema>,
}

impl StorageSchemas {
    /// Compiles the given rules, keeping their order.
    pub fn from_rules(rules: &[SchemaRule]) -> Result<Self, SchemaError> {
        let schemas = rules
            .iter()
            .map(|rule| {
                let pattern = Regex::new(&rule.pattern).map_err(|source| {
                    SchemaError::InvalidPattern {
                        name: rule.name.clone(),
                        source,
                    }
                })?;

                let retentions = parse_retentions(&rule.retentions)?;
                if retentions.is_empty() {
                    return Err(SchemaError::MissingRetention(rule.name.clone()));
                }

                Ok(StorageSchema {
                    name: rule.name.clone(),
                    pattern,
                    retentions,
                })
            })
            .collect::<Result<_, _>>()?;

        Ok(Self { schemas })
    }

    /// Returns the first schema whose pattern matches `name`, along with its index.
    pub fn matching(&self, name: &str) -> Option<(usize, &StorageSchema)> {
        self.schemas
            .iter()
            .enumerate()
            .find(|(_, schema)| schema.pattern.is_match(name))
    }

    /// Returns the number of schemas.
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Returns `true` if no schemas are defined.
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

impl SchemaResolver for StorageSchemas {
    fn interval(&self, name: &str, default_index: usize) -> u32 {
        match self.matching(name) {
            Some((_, schema)) => schema.interval(),
            None => self
                .schemas
                .get(default_index)
                .map_or(DEFAULT_INTERVAL, StorageSchema::interval),
        }
    }
}
