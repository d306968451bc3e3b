use std::fmt;
use std::str::FromStr;

use human_size::{Byte, Size, SpecificSize};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

/// Error raised when parsing an invalid [`ByteSize`].
pub use human_size::ParsingError as ByteSizeParseError;

/// A size in bytes, parsed from human readable values such as `20MiB` or `512kB`.
///
/// Plain integers are interpreted as bytes.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ByteSize(u64);

impl ByteSize {
    /// Creates a byte size from bytes.
    pub const fn bytes(value: u64) -> Self {
        Self(value)
    }

    /// Creates a byte size from kibibytes.
    pub const fn kibibytes(value: u64) -> Self {
        Self(value * 1024)
    }

    /// Creates a byte size from mebibytes.
    pub const fn mebibytes(value: u64) -> Self {
        Self(value * 1024 * 1024)
    }

    /// Returns the value in bytes.
    pub const fn as_bytes(self) -> u64 {
        self.0
    }
}

impl FromStr for ByteSize {
    type Err = ByteSizeParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if let Ok(bytes) = value.trim().parse::<u64>() {
            return Ok(Self(bytes));
        }

        let size: SpecificSize<Byte> = value.trim().parse::<Size>()?.into();
        Ok(Self(size.value() as u64))
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const MIB: u64 = 1024 * 1024;
        const KIB: u64 = 1024;

        match self.0 {
            0 => write!(f, "0B"),
            b if b % MIB == 0 => write!(f, "{}MiB", b / MIB),
            b if b % KIB == 0 => write!(f, "{}KiB", b / KIB),
            b => write!(f, "{b}B"),
        }
    }
}

impl Serialize for ByteSize {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ByteSize {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct V;

        impl de::Visitor<'_> for V {
            type Value = ByteSize;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("data size")
            }

            fn visit_u64<E>(self, value: u64) -> Result<ByteSize, E>
            where
                E: de::Error,
            {
                Ok(ByteSize(value))
            }

            fn visit_str<E>(self, value: &str) -> Result<ByteSize, E>
            where
                E: de::Error,
            {
                value
                    .parse()
                    .map_err(|_| de::Error::invalid_value(de::Unexpected::Str(value), &self))
            }
        }

        deserializer.deserialize_any(V)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_human() {
        let size: ByteSize = "42MiB".parse().unwrap();
        assert_eq!(size.as_bytes(), 44_040_192);
        assert_eq!(size.to_string(), "42MiB");

        let size: ByteSize = "1kB".parse().unwrap();
        assert_eq!(size.as_bytes(), 1000);
        assert_eq!(size.to_string(), "1000B");
    }

    #[test]
    fn test_parse_plain_bytes() {
        let size: ByteSize = "2048".parse().unwrap();
        assert_eq!(size, ByteSize::kibibytes(2));
        assert_eq!(size.to_string(), "2KiB");
    }

    #[test]
    fn test_parse_invalid() {
        assert!("lots".parse::<ByteSize>().is_err());
    }

    #[test]
    fn test_deserialize_yaml() {
        let size: ByteSize = serde_yaml::from_str("20MiB").unwrap();
        assert_eq!(size, ByteSize::mebibytes(20));

        let size: ByteSize = serde_yaml::from_str("512").unwrap();
        assert_eq!(size, ByteSize::bytes(512));
    }
}
