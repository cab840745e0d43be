use bytes::BytesMut;
use flate2::write::GzEncoder;
use flate2::{Compression, GzBuilder};
use std::io::{self, Write};
use std::time::{SystemTime, UNIX_EPOCH};

/// The `Content-Encoding` value of streams produced by [`GzipEncoder`].
pub const CONTENT_ENCODING: &str = "gzip";

// reserve at most 16k per chunk
const MAX_INIT_COMPRESSED_BUF_SIZE: usize = 16 * 1024;

/// Incremental gzip encoder with a caller-supplied modification time.
pub(crate) struct GzipEncoder {
    compress: GzEncoder<Vec<u8>>,
    finished: bool,
}

impl GzipEncoder {
    pub(crate) fn new(mtime: SystemTime, level: Compression) -> Self {
        Self {
            compress: GzBuilder::new()
                .mtime(mtime_secs(mtime))
                .write(Vec::new(), level),
            finished: false,
        }
    }

    /// Compresses `input`, appending whatever the encoder emits to `out`.
    ///
    /// The encoder buffers internally, so `out` may only receive the header
    /// or nothing at all.
    pub(crate) fn encode(&mut self, input: &[u8], out: &mut BytesMut) -> io::Result<()> {
        if self.finished {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "gzip stream already finished",
            ));
        }

        self.compress
            .get_mut()
            .reserve(std::cmp::min(MAX_INIT_COMPRESSED_BUF_SIZE, input.len()));
        self.compress.write_all(input)?;
        self.drain(out);
        Ok(())
    }

    /// Flushes the encoder and appends the gzip trailer.
    ///
    /// Finishing an already finished stream appends nothing.
    pub(crate) fn finish(&mut self, out: &mut BytesMut) -> io::Result<()> {
        if self.finished {
            return Ok(());
        }

        self.compress.try_finish()?;
        self.finished = true;
        self.drain(out);
        Ok(())
    }

    fn drain(&mut self, out: &mut BytesMut) {
        let compressed = std::mem::take(self.compress.get_mut());
        out.extend_from_slice(&compressed);
    }
}

/// Seconds since the epoch, or 0 ("no timestamp") when not representable.
fn mtime_secs(mtime: SystemTime) -> u32 {
    mtime
        .duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|d| u32::try_from(d.as_secs()).ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use flate2::Crc;
    use std::io::Read;
    use std::time::Duration;

    fn decode(data: &[u8]) -> Vec<u8> {
        let mut decoded = Vec::new();
        GzDecoder::new(data).read_to_end(&mut decoded).unwrap();
        decoded
    }

    #[test]
    fn test_header_carries_mtime() {
        let mtime = UNIX_EPOCH + Duration::from_secs(1_445_412_480);
        let mut encoder = GzipEncoder::new(mtime, Compression::default());
        let mut out = BytesMut::new();
        encoder.encode(b"hello", &mut out).unwrap();

        assert_eq!(&out[..3], &[0x1f, 0x8b, 0x08]);
        assert_eq!(&out[4..8], &1_445_412_480u32.to_le_bytes());
    }

    #[test]
    fn test_mtime_out_of_range_is_zero() {
        assert_eq!(mtime_secs(UNIX_EPOCH - Duration::from_secs(1)), 0);
        assert_eq!(
            mtime_secs(UNIX_EPOCH + Duration::from_secs(u64::from(u32::MAX) + 1)),
            0
        );
    }

    #[test]
    fn test_roundtrip_multiple_chunks() {
        let mut encoder = GzipEncoder::new(SystemTime::now(), Compression::default());
        let mut out = BytesMut::new();
        encoder.encode(b"<html>", &mut out).unwrap();
        encoder.encode(b"<body>hello</body>", &mut out).unwrap();
        encoder.encode(b"</html>", &mut out).unwrap();
        encoder.finish(&mut out).unwrap();

        assert_eq!(decode(&out), b"<html><body>hello</body></html>");
    }

    #[test]
    fn test_empty_stream_is_valid_gzip() {
        let mut encoder = GzipEncoder::new(SystemTime::now(), Compression::default());
        let mut out = BytesMut::new();
        encoder.finish(&mut out).unwrap();

        assert_eq!(&out[..2], &[0x1f, 0x8b]);
        assert!(decode(&out).is_empty());
    }

    #[test]
    fn test_trailer_records_crc_and_size() {
        let mut encoder = GzipEncoder::new(UNIX_EPOCH, Compression::default());
        let mut out = BytesMut::new();
        encoder.encode(b"abcdefg", &mut out).unwrap();
        encoder.finish(&mut out).unwrap();

        let mut crc = Crc::new();
        crc.update(b"abcdefg");
        let len = out.len();
        assert_eq!(&out[len - 8..len - 4], &crc.sum().to_le_bytes());
        assert_eq!(&out[len - 4..], &7u32.to_le_bytes());
    }

    #[test]
    fn test_finish_twice_is_noop() {
        let mut encoder = GzipEncoder::new(SystemTime::now(), Compression::default());
        let mut out = BytesMut::new();
        encoder.finish(&mut out).unwrap();

        let mut again = BytesMut::new();
        encoder.finish(&mut again).unwrap();
        assert!(again.is_empty());
    }

    #[test]
    fn test_encode_after_finish_fails() {
        let mut encoder = GzipEncoder::new(SystemTime::now(), Compression::default());
        let mut out = BytesMut::new();
        encoder.finish(&mut out).unwrap();

        let err = encoder.encode(b"late", &mut out).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
