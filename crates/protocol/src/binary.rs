//! Byte-level reading and writing utilities for the game protocol.
//!
//! All multi-byte values are big-endian.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::ProtocolError;

/// A reader for parsing inbound packet payloads.
#[derive(Debug)]
pub struct BinaryReader {
    buf: Bytes,
}

impl BinaryReader {
    /// Create a new reader from raw bytes.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { buf: data.into() }
    }

    /// Returns remaining bytes.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    #[inline]
    fn ensure(&self, n: usize) -> Result<(), ProtocolError> {
        if self.buf.remaining() >= n {
            Ok(())
        } else {
            Err(ProtocolError::UnexpectedEof)
        }
    }

    #[inline]
    pub fn get_u8(&mut self) -> Result<u8, ProtocolError> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    #[inline]
    pub fn get_i8(&mut self) -> Result<i8, ProtocolError> {
        self.ensure(1)?;
        Ok(self.buf.get_i8())
    }

    #[inline]
    pub fn get_u16(&mut self) -> Result<u16, ProtocolError> {
        self.ensure(2)?;
        Ok(self.buf.get_u16())
    }

    #[inline]
    pub fn get_i16(&mut self) -> Result<i16, ProtocolError> {
        self.ensure(2)?;
        Ok(self.buf.get_i16())
    }

    #[inline]
    pub fn get_u32(&mut self) -> Result<u32, ProtocolError> {
        self.ensure(4)?;
        Ok(self.buf.get_u32())
    }

    #[inline]
    pub fn get_i32(&mut self) -> Result<i32, ProtocolError> {
        self.ensure(4)?;
        Ok(self.buf.get_i32())
    }

    /// Read a null-terminated string.
    pub fn get_string(&mut self) -> Result<String, ProtocolError> {
        let mut bytes = Vec::new();
        loop {
            match self.get_u8()? {
                0 => break,
                b => bytes.push(b),
            }
        }
        String::from_utf8(bytes).map_err(|_| ProtocolError::MalformedString)
    }
}

/// A writer for building outbound packet payloads.
#[derive(Debug, Default)]
pub struct BinaryWriter {
    buf: BytesMut,
}

impl BinaryWriter {
    /// Create a new writer with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(64)
    }

    /// Create a new writer with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// Returns the current length.
    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns true if empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[inline]
    pub fn put_u8(&mut self, v: u8) {
        self.buf.put_u8(v);
    }

    #[inline]
    pub fn put_i8(&mut self, v: i8) {
        self.buf.put_i8(v);
    }

    #[inline]
    pub fn put_u16(&mut self, v: u16) {
        self.buf.put_u16(v);
    }

    #[inline]
    pub fn put_i16(&mut self, v: i16) {
        self.buf.put_i16(v);
    }

    #[inline]
    pub fn put_u32(&mut self, v: u32) {
        self.buf.put_u32(v);
    }

    #[inline]
    pub fn put_i32(&mut self, v: i32) {
        self.buf.put_i32(v);
    }

    /// Write a null-terminated string.
    pub fn put_string(&mut self, s: &str) {
        self.buf.put_slice(s.as_bytes());
        self.buf.put_u8(0);
    }

    /// Write raw bytes.
    pub fn put_slice(&mut self, data: &[u8]) {
        self.buf.put_slice(data);
    }

    /// Consume the writer and return the built buffer.
    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }

    /// Get current buffer as a slice.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_big_endian_layout() {
        let mut w = BinaryWriter::new();
        w.put_u16(0x1234);
        w.put_i32(-2);
        assert_eq!(w.as_slice(), &[0x12, 0x34, 0xFF, 0xFF, 0xFF, 0xFE]);
    }

    #[test]
    fn test_string() {
        let mut w = BinaryWriter::new();
        w.put_string("hello");
        let data = w.finish();
        let mut r = BinaryReader::new(data);
        assert_eq!(r.get_string().unwrap(), "hello");
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_short_read_is_error() {
        let mut r = BinaryReader::new(vec![0x01]);
        assert!(matches!(r.get_u16(), Err(ProtocolError::UnexpectedEof)));
    }
}
