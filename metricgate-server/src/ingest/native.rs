//! Decoders for the native JSON and binary record formats.

use std::borrow::Cow;
use std::fmt;

use metricgate_metrics::{MetricData, PooledMetric};

use crate::ingest::{DecodeContext, DecodeError, body};

/// Size of the binary envelope header: one format byte and a big-endian `i64` message id.
const ENVELOPE_HEADER_SIZE: usize = 9;

/// Encoding of the record array inside a binary envelope.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PayloadFormat {
    /// A JSON array of records.
    Json,
    /// A MessagePack array of records.
    Msgpack,
}

impl PayloadFormat {
    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Json),
            1 => Some(Self::Msgpack),
            _ => None,
        }
    }

    /// Returns the format byte of the envelope header.
    pub fn as_byte(self) -> u8 {
        match self {
            Self::Json => 0,
            Self::Msgpack => 1,
        }
    }
}

/// The envelope could not be unframed.
#[derive(Debug, Eq, PartialEq, thiserror::Error)]
pub enum EnvelopeError {
    /// The message is shorter than the envelope header.
    #[error("message too short ({0} bytes)")]
    TooShort(usize),
    /// The format byte is not known.
    #[error("unknown format {0}")]
    UnknownFormat(u8),
}

/// The inner payload of an envelope could not be decoded.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    /// Invalid JSON array.
    #[error(transparent)]
    Json(serde_json::Error),
    /// Invalid MessagePack array.
    #[error(transparent)]
    Msgpack(rmp_serde::decode::Error),
}

/// A framed batch of records as produced by native clients.
#[derive(Clone, Copy)]
pub struct MetricEnvelope<'a> {
    /// Encoding of the payload.
    pub format: PayloadFormat,
    /// Producer assigned message id, usually the production time in nanoseconds.
    pub id: i64,
    /// The encoded record array.
    pub payload: &'a [u8],
}

impl<'a> MetricEnvelope<'a> {
    /// Splits a message into envelope header and payload.
    pub fn parse(message: &'a [u8]) -> Result<Self, EnvelopeError> {
        if message.len() < ENVELOPE_HEADER_SIZE {
            return Err(EnvelopeError::TooShort(message.len()));
        }

        let (header, payload) = message.split_at(ENVELOPE_HEADER_SIZE);
        let format = PayloadFormat::from_byte(header[0])
            .ok_or(EnvelopeError::UnknownFormat(header[0]))?;

        let mut id = [0; 8];
        id.copy_from_slice(&header[1..]);

        Ok(Self {
            format,
            id: i64::from_be_bytes(id),
            payload,
        })
    }

    /// Decodes the record array of the envelope.
    pub fn decode(&self) -> Result<Vec<MetricData>, PayloadError> {
        match self.format {
            PayloadFormat::Json => serde_json::from_slice(self.payload).map_err(PayloadError::Json),
            PayloadFormat::Msgpack => {
                rmp_serde::from_slice(self.payload).map_err(PayloadError::Msgpack)
            }
        }
    }
}

impl fmt::Debug for MetricEnvelope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricEnvelope")
            .field("format", &self.format)
            .field("id", &self.id)
            .field("payload_size", &self.payload.len())
            .finish()
    }
}

fn adopt_all(metrics: Vec<MetricData>, cx: &DecodeContext<'_>) -> Vec<PooledMetric> {
    metrics
        .into_iter()
        .map(|metric| cx.pool.adopt(metric))
        .collect()
}

/// Decodes a JSON array of records.
pub fn decode_json(body: &[u8], cx: &DecodeContext<'_>) -> Result<Vec<PooledMetric>, DecodeError> {
    if body.is_empty() {
        return Err(DecodeError::MissingBody);
    }

    let metrics = serde_json::from_slice(body).map_err(DecodeError::NativeJson)?;
    Ok(adopt_all(metrics, cx))
}

/// Decodes a binary envelope, optionally wrapped in a snappy framed stream.
pub fn decode_binary(
    body: &[u8],
    snappy: bool,
    cx: &DecodeContext<'_>,
) -> Result<Vec<PooledMetric>, DecodeError> {
    if body.is_empty() {
        return Err(DecodeError::MissingBody);
    }

    let message = if snappy {
        Cow::Owned(body::read_snappy_frames(body).map_err(DecodeError::Decompress)?)
    } else {
        Cow::Borrowed(body)
    };

    let envelope = MetricEnvelope::parse(&message).map_err(DecodeError::Envelope)?;
    metricgate_log::trace!(id = envelope.id, format = ?envelope.format, "decoding envelope");

    let metrics = envelope.decode().map_err(DecodeError::Payload)?;
    Ok(adopt_all(metrics, cx))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use metricgate_metrics::{MetricPool, OrgId, StorageSchemas};
    use similar_asserts::assert_eq;

    use super::*;

    fn sample() -> Vec<MetricData> {
        vec![
            MetricData {
                org_id: OrgId::new(99),
                name: "a.b".to_owned(),
                metric: "a.b".to_owned(),
                interval: 10,
                unit: "ms".to_owned(),
                value: 1.0,
                time: 1_700_000_000,
                mtype: "gauge".to_owned(),
                tags: vec!["k=v".to_owned()],
                ..Default::default()
            },
            MetricData {
                name: "c.d".to_owned(),
                value: 2.0,
                ..Default::default()
            },
        ]
    }

    fn envelope(format: PayloadFormat, id: i64, metrics: &[MetricData]) -> Vec<u8> {
        let mut message = vec![format.as_byte()];
        message.extend_from_slice(&id.to_be_bytes());
        match format {
            PayloadFormat::Json => message.extend(serde_json::to_vec(metrics).unwrap()),
            PayloadFormat::Msgpack => message.extend(rmp_serde::to_vec_named(metrics).unwrap()),
        }
        message
    }

    fn decoded(metrics: Vec<PooledMetric>) -> Vec<MetricData> {
        metrics.iter().map(|m| (**m).clone()).collect()
    }

    fn context<'a>(pool: &'a MetricPool, schemas: &'a StorageSchemas) -> DecodeContext<'a> {
        DecodeContext {
            pool,
            org_id: OrgId::new(5),
            schemas,
            deflate: false,
        }
    }

    #[test]
    fn test_parse_envelope() {
        let message = envelope(PayloadFormat::Msgpack, 1_234_567_890, &[]);
        let parsed = MetricEnvelope::parse(&message).unwrap();
        assert_eq!(parsed.format, PayloadFormat::Msgpack);
        assert_eq!(parsed.id, 1_234_567_890);
    }

    #[test]
    fn test_envelope_too_short() {
        let err = MetricEnvelope::parse(&[0, 1, 2]).unwrap_err();
        assert_eq!(err, EnvelopeError::TooShort(3));
    }

    #[test]
    fn test_envelope_unknown_format() {
        let err = MetricEnvelope::parse(&[7; 12]).unwrap_err();
        assert_eq!(err, EnvelopeError::UnknownFormat(7));
    }

    #[test]
    fn test_json_and_msgpack_agree() {
        let pool = MetricPool::new(8);
        let schemas = StorageSchemas::default();
        let cx = context(&pool, &schemas);

        let json = envelope(PayloadFormat::Json, 1, &sample());
        let msgpack = envelope(PayloadFormat::Msgpack, 1, &sample());

        let from_json = decoded(decode_binary(&json, false, &cx).unwrap());
        let from_msgpack = decoded(decode_binary(&msgpack, false, &cx).unwrap());

        assert_eq!(from_json, sample());
        assert_eq!(from_msgpack, sample());
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn test_snappy_binary() {
        let pool = MetricPool::new(8);
        let schemas = StorageSchemas::default();

        let mut encoder = snap::write::FrameEncoder::new(Vec::new());
        encoder
            .write_all(&envelope(PayloadFormat::Msgpack, 1, &sample()))
            .unwrap();
        let compressed = encoder.into_inner().unwrap();

        let metrics = decode_binary(&compressed, true, &context(&pool, &schemas)).unwrap();
        assert_eq!(decoded(metrics), sample());
    }

    #[test]
    fn test_bad_payload() {
        let pool = MetricPool::new(8);
        let schemas = StorageSchemas::default();

        let mut message = envelope(PayloadFormat::Json, 1, &[]);
        message.truncate(ENVELOPE_HEADER_SIZE);
        message.extend_from_slice(b"[{");

        let err = decode_binary(&message, false, &context(&pool, &schemas)).unwrap_err();
        assert!(err.to_string().starts_with("failed to unmarshal metricData: "));
    }

    #[test]
    fn test_short_message_error() {
        let pool = MetricPool::new(8);
        let schemas = StorageSchemas::default();

        let err = decode_binary(&[1, 2], false, &context(&pool, &schemas)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "payload not metricData: message too short (2 bytes)"
        );
    }

    #[test]
    fn test_native_json() {
        let pool = MetricPool::new(8);
        let schemas = StorageSchemas::default();
        let body = serde_json::to_vec(&sample()).unwrap();

        let metrics = decode_json(&body, &context(&pool, &schemas)).unwrap();
        assert_eq!(pool.outstanding(), 2);
        assert_eq!(decoded(metrics), sample());
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn test_native_json_error() {
        let pool = MetricPool::new(8);
        let schemas = StorageSchemas::default();

        let err = decode_json(b"{\"name\": 1}", &context(&pool, &schemas)).unwrap_err();
        assert!(err.to_string().starts_with("unable to parse request body. "));
    }
}
