//! Caller-owned buffer cursors.
//!
//! Encoders write through a [`WriteCursor`] over a caller-allocated slice
//! and never move past its end; decoders read through a [`ReadCursor`]
//! over a shared [`Bytes`] source and never read past its length. Both
//! report exhaustion with byte counts instead of panicking, so a
//! truncated or undersized buffer surfaces as an error at the exact
//! field that did not fit.

use bytes::Bytes;

use crate::errors::{CodecError, Result};

/// Bounded write position into a caller-owned byte slice.
///
/// The cursor tracks how many bytes have been committed. A write that
/// would pass the end of the slice fails with
/// [`CodecError::BufferExhausted`] and leaves the position unchanged, so
/// the buffer never holds a half-written field beyond the reported
/// position.
#[derive(Debug)]
pub struct WriteCursor<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> WriteCursor<'a> {
    /// Wrap a destination slice, starting at its first byte.
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes committed so far.
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes still available.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn check(&self, needed: usize) -> Result<()> {
        if needed > self.remaining() {
            return Err(CodecError::BufferExhausted { needed, remaining: self.remaining() });
        }
        Ok(())
    }

    /// Write a single byte.
    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.check(1)?;
        self.buf[self.pos] = value;
        self.pos += 1;
        Ok(())
    }

    /// Write a slice verbatim.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.check(bytes.len())?;
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
        Ok(())
    }

    /// Write `count` zero bytes (raw-field padding).
    pub fn write_zeros(&mut self, count: usize) -> Result<()> {
        self.check(count)?;
        self.buf[self.pos..self.pos + count].fill(0);
        self.pos += count;
        Ok(())
    }
}

/// Bounded read position into a shared byte source.
///
/// Reads fail with [`CodecError::SourceExhausted`] instead of running
/// past the source length. The position may be parked beyond the end via
/// [`ReadCursor::set_position`] (the raw-payload fallback advance); every
/// subsequent read then fails.
#[derive(Debug)]
pub struct ReadCursor<'a> {
    src: &'a Bytes,
    pos: usize,
}

impl<'a> ReadCursor<'a> {
    /// Wrap a source, starting at its first byte.
    pub fn new(src: &'a Bytes) -> Self {
        Self { src, pos: 0 }
    }

    /// Wrap a source at an explicit byte position.
    pub fn at(src: &'a Bytes, pos: usize) -> Self {
        Self { src, pos }
    }

    /// Current byte position.
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Move the position. May be parked past the end of the source.
    pub fn set_position(&mut self, pos: usize) {
        self.pos = pos;
    }

    /// Bytes left before the end of the source.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.src.len().saturating_sub(self.pos)
    }

    /// The underlying source.
    #[must_use]
    pub fn source(&self) -> &Bytes {
        self.src
    }

    fn check(&self, needed: usize) -> Result<()> {
        if needed > self.remaining() {
            return Err(CodecError::SourceExhausted { needed, remaining: self.remaining() });
        }
        Ok(())
    }

    /// Read a single byte.
    pub fn read_u8(&mut self) -> Result<u8> {
        self.check(1)?;
        let b = self.src[self.pos];
        self.pos += 1;
        Ok(b)
    }

    /// Read a fixed-width little-endian field as a byte array.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        self.check(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.src[self.pos..self.pos + N]);
        self.pos += N;
        Ok(out)
    }

    /// Read `count` bytes as a zero-copy slice of the source.
    pub fn read_slice(&mut self, count: usize) -> Result<Bytes> {
        self.check(count)?;
        let out = self.src.slice(self.pos..self.pos + count);
        self.pos += count;
        Ok(out)
    }
}
