use crate::codec::GzipEncoder;
use bytes::{Bytes, BytesMut};
use flate2::Compression;
use std::io;
use std::time::SystemTime;

/// A gzip sink that never forwards more than `limit` compressed bytes.
///
/// Every call returns the bytes to hand downstream. Output past the
/// limit is cut at an exact byte offset and discarded; the encoder is
/// still driven to completion so [`finish`](Self::finish) behaves the
/// same whether or not the limit was hit.
pub struct TruncatingCompressor {
    encoder: GzipEncoder,
    pending: BytesMut,
    sent: usize,
    limit: usize,
    truncated: bool,
}

impl TruncatingCompressor {
    /// Creates a compressor with the default compression level.
    pub fn new(mtime: SystemTime, limit: usize) -> Self {
        Self::with_level(mtime, limit, Compression::default())
    }

    /// Creates a compressor with the given compression level.
    pub fn with_level(mtime: SystemTime, limit: usize, level: Compression) -> Self {
        Self {
            encoder: GzipEncoder::new(mtime, level),
            pending: BytesMut::new(),
            sent: 0,
            limit,
            truncated: false,
        }
    }

    /// Compresses `chunk` and returns the part of the output that fits.
    ///
    /// The result is empty when the encoder buffered everything or the
    /// limit has already been reached.
    pub fn write(&mut self, chunk: &[u8]) -> io::Result<Bytes> {
        self.encoder.encode(chunk, &mut self.pending)?;
        Ok(self.forward())
    }

    /// Flushes the encoder and gzip trailer through the same limit.
    pub fn finish(&mut self) -> io::Result<Bytes> {
        self.encoder.finish(&mut self.pending)?;
        Ok(self.forward())
    }

    /// Returns the number of compressed bytes forwarded so far.
    pub fn sent(&self) -> usize {
        self.sent
    }

    /// Returns the configured limit.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Returns whether the limit has been reached.
    pub fn is_exhausted(&self) -> bool {
        self.sent >= self.limit
    }

    fn forward(&mut self) -> Bytes {
        let available = self.pending.len();
        let take = available.min(self.limit - self.sent);
        let out = self.pending.split_to(take).freeze();

        let dropped = self.pending.len();
        if dropped > 0 {
            if !self.truncated {
                tracing::debug!(
                    limit = self.limit,
                    dropped,
                    "byte limit reached, discarding remaining compressed output"
                );
                self.truncated = true;
            }
            self.pending.clear();
        }

        self.sent += take;
        out
    }
}

impl std::fmt::Debug for TruncatingCompressor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TruncatingCompressor")
            .field("sent", &self.sent)
            .field("limit", &self.limit)
            .field("truncated", &self.truncated)
            .finish()
    }
}
