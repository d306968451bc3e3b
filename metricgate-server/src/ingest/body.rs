use std::borrow::Cow;
use std::io::{self, Read};

use flate2::read::ZlibDecoder;

/// Inflates a zlib stream if the request declared `Content-Encoding: deflate`.
pub fn maybe_inflate(body: &[u8], deflate: bool) -> io::Result<Cow<'_, [u8]>> {
    if !deflate {
        return Ok(Cow::Borrowed(body));
    }

    let mut inflated = Vec::with_capacity(body.len() * 4);
    ZlibDecoder::new(body).read_to_end(&mut inflated)?;
    Ok(Cow::Owned(inflated))
}

/// Reads a snappy framed stream to its end.
pub fn read_snappy_frames(body: &[u8]) -> io::Result<Vec<u8>> {
    let mut decoded = Vec::with_capacity(body.len() * 2);
    snap::read::FrameDecoder::new(body).read_to_end(&mut decoded)?;
    Ok(decoded)
}

/// Decompresses a single raw snappy block.
pub fn decode_snappy_block(body: &[u8]) -> Result<Vec<u8>, snap::Error> {
    snap::raw::Decoder::new().decompress_vec(body)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::Compression;
    use flate2::write::ZlibEncoder;

    use super::*;

    #[test]
    fn test_passthrough() {
        let body = maybe_inflate(b"{}", false).unwrap();
        assert!(matches!(body, Cow::Borrowed(b"{}")));
    }

    #[test]
    fn test_inflate() {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(br#"{"series":[]}"#).unwrap();
        let compressed = encoder.finish().unwrap();

        let body = maybe_inflate(&compressed, true).unwrap();
        assert_eq!(&*body, br#"{"series":[]}"#);
    }

    #[test]
    fn test_inflate_garbage() {
        assert!(maybe_inflate(b"definitely not zlib", true).is_err());
    }

    #[test]
    fn test_snappy_frames() {
        let mut encoder = snap::write::FrameEncoder::new(Vec::new());
        encoder.write_all(b"framed payload").unwrap();
        let compressed = encoder.into_inner().unwrap();

        assert_eq!(read_snappy_frames(&compressed).unwrap(), b"framed payload");
    }

    #[test]
    fn test_snappy_block() {
        let compressed = snap::raw::Encoder::new().compress_vec(b"block").unwrap();
        assert_eq!(decode_snappy_block(&compressed).unwrap(), b"block");
        assert!(decode_snappy_block(b"\xff\xff\xff\xff\xff").is_err());
    }
}
