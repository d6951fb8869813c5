//! Binary stream adapter shared by the read and write paths.
//!
//! [`BinaryStream`] wraps any byte source or sink and exposes the handful of
//! primitives the archive codecs need: single-byte reads, fixed-length reads,
//! absolute seeks, and append writes.  All offsets are absolute positions
//! from the start of the underlying stream.
//!
//! # Endianness
//! Every integer in a SAR archive is big-endian.  The `*_be` helpers are the
//! only place the byte order is spelled out.
//!
//! # Buffering
//! Names are read one byte at a time, so file-backed readers should be
//! wrapped in a [`std::io::BufReader`] before being handed to the adapter.
//!
//! The adapter holds a single cursor.  Concurrent readers of one archive
//! must each open their own handle.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Seek, SeekFrom, Write};

pub struct BinaryStream<S> {
    inner: S,
}

impl<S> BinaryStream<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

// ── Read path ────────────────────────────────────────────────────────────────

impl<S: Read> BinaryStream<S> {
    /// Read one byte.  Returns `None` at end of stream.
    pub fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut buf = [0u8; 1];
        loop {
            match self.inner.read(&mut buf) {
                Ok(0)  => return Ok(None),
                Ok(_)  => return Ok(Some(buf[0])),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Read exactly `n` bytes; fails with `UnexpectedEof` if fewer remain.
    pub fn read_exact(&mut self, n: usize) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; n];
        self.inner.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Read at most `n` bytes, stopping early at end of stream.
    pub fn read_up_to(&mut self, n: usize) -> io::Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(n);
        self.inner.by_ref().take(n as u64).read_to_end(&mut buf)?;
        Ok(buf)
    }

    pub fn read_u16_be(&mut self) -> io::Result<u16> {
        self.inner.read_u16::<BigEndian>()
    }

    pub fn read_u32_be(&mut self) -> io::Result<u32> {
        self.inner.read_u32::<BigEndian>()
    }

    /// Stream exactly `n` bytes into `dest` without buffering them whole.
    pub fn copy_exact_to<W: Write + ?Sized>(&mut self, n: u64, dest: &mut W) -> io::Result<()> {
        let copied = io::copy(&mut self.inner.by_ref().take(n), dest)?;
        if copied != n {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("expected {n} bytes, stream ended after {copied}"),
            ));
        }
        Ok(())
    }
}

// ── Positioning ──────────────────────────────────────────────────────────────

impl<S: Seek> BinaryStream<S> {
    pub fn seek_absolute(&mut self, offset: u64) -> io::Result<()> {
        self.inner.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    pub fn position(&mut self) -> io::Result<u64> {
        self.inner.stream_position()
    }

    /// Total stream length.  The cursor is restored afterwards.
    pub fn stream_len(&mut self) -> io::Result<u64> {
        let here = self.inner.stream_position()?;
        let end  = self.inner.seek(SeekFrom::End(0))?;
        if here != end {
            self.inner.seek(SeekFrom::Start(here))?;
        }
        Ok(end)
    }
}

// ── Write path ───────────────────────────────────────────────────────────────

impl<S: Write> BinaryStream<S> {
    pub fn append_bytes(&mut self, data: &[u8]) -> io::Result<()> {
        self.inner.write_all(data)
    }

    pub fn append_u8(&mut self, value: u8) -> io::Result<()> {
        self.inner.write_u8(value)
    }

    pub fn append_u16_be(&mut self, value: u16) -> io::Result<()> {
        self.inner.write_u16::<BigEndian>(value)
    }

    pub fn append_u32_be(&mut self, value: u32) -> io::Result<()> {
        self.inner.write_u32::<BigEndian>(value)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn read_byte_reports_end_of_stream() {
        let mut s = BinaryStream::new(Cursor::new(vec![0xAB]));
        assert_eq!(s.read_byte().unwrap(), Some(0xAB));
        assert_eq!(s.read_byte().unwrap(), None);
    }

    #[test]
    fn read_exact_fails_when_short() {
        let mut s = BinaryStream::new(Cursor::new(vec![1, 2, 3]));
        let err = s.read_exact(4).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn read_up_to_returns_what_is_left() {
        let mut s = BinaryStream::new(Cursor::new(vec![1, 2, 3]));
        assert_eq!(s.read_up_to(8).unwrap(), vec![1, 2, 3]);
        assert!(s.read_up_to(8).unwrap().is_empty());
    }

    #[test]
    fn big_endian_helpers() {
        let mut s = BinaryStream::new(Cursor::new(Vec::new()));
        s.append_u16_be(0x0102).unwrap();
        s.append_u32_be(0x0304_0506).unwrap();
        assert_eq!(s.get_ref().get_ref(), &vec![1, 2, 3, 4, 5, 6]);

        s.seek_absolute(0).unwrap();
        assert_eq!(s.read_u16_be().unwrap(), 0x0102);
        assert_eq!(s.read_u32_be().unwrap(), 0x0304_0506);
    }

    #[test]
    fn stream_len_keeps_cursor() {
        let mut s = BinaryStream::new(Cursor::new(vec![0u8; 10]));
        s.seek_absolute(4).unwrap();
        assert_eq!(s.stream_len().unwrap(), 10);
        assert_eq!(s.position().unwrap(), 4);
    }

    #[test]
    fn copy_exact_detects_short_source() {
        let mut s = BinaryStream::new(Cursor::new(vec![7u8; 5]));
        let mut out = Vec::new();
        s.copy_exact_to(3, &mut out).unwrap();
        assert_eq!(out, vec![7, 7, 7]);
        let err = s.copy_exact_to(3, &mut out).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
