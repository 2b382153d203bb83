//! Streaming I/O discipline: chunked hashing and a buffered writer.
//!
//! Hashing a blob in one `Hasher::update(&whole_buffer)` call is fine for an
//! in-memory slice, but [`hash_chunked`] processes it in bounded pieces
//! anyway — the discipline real systems crates use once blobs stop being
//! things that comfortably fit "just read it all".

use std::io::{self, Write};

use crc32fast::Hasher as Crc32Hasher;
use sha2::{Digest, Sha256};

/// Chunk size used by [`hash_chunked`], matching the "≥ 64 KiB" guidance.
pub const HASH_CHUNK_SIZE: usize = 64 * 1024;

/// Compute `(sha256_hex, crc32)` over `data` in bounded chunks rather than
/// one pass over the whole buffer.
pub fn hash_chunked(data: &[u8]) -> (String, u32) {
    let mut sha = Sha256::new();
    let mut crc = Crc32Hasher::new();
    for chunk in data.chunks(HASH_CHUNK_SIZE) {
        sha.update(chunk);
        crc.update(chunk);
    }
    (hex::encode(sha.finalize()), crc.finalize())
}

/// Buffered writer with a configurable flush threshold.
///
/// Accumulates writes up to `capacity` bytes and flushes to the underlying
/// writer when the buffer is full or `flush()` is called explicitly. Used by
/// the directory packer and GCA1 writer to batch small per-file writes into
/// large sequential ones.
pub struct WriteBuffer<W: Write> {
    inner: W,
    buf: Vec<u8>,
    capacity: usize,
    pub bytes_written: u64,
}

impl<W: Write> WriteBuffer<W> {
    /// Create a new `WriteBuffer` with the given capacity in bytes.
    pub fn new(inner: W, capacity: usize) -> Self {
        Self {
            inner,
            buf: Vec::with_capacity(capacity),
            capacity,
            bytes_written: 0,
        }
    }

    fn flush_if_full(&mut self) -> io::Result<()> {
        if self.buf.len() >= self.capacity {
            self.inner.write_all(&self.buf)?;
            self.buf.clear();
        }
        Ok(())
    }

    /// Flush any buffered bytes and hand back the underlying writer.
    pub fn into_inner(mut self) -> io::Result<W> {
        self.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for WriteBuffer<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.len() >= self.capacity {
            self.inner.write_all(&self.buf)?;
            self.buf.clear();
            self.inner.write_all(buf)?;
        } else {
            self.buf.extend_from_slice(buf);
            self.flush_if_full()?;
        }
        self.bytes_written += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.buf.is_empty() {
            self.inner.write_all(&self.buf)?;
            self.buf.clear();
        }
        self.inner.flush()
    }
}
