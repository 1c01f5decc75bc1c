//! Bit-level packing for entity and zone update records.
//!
//! Fields are written most-significant-bit first into a shared cursor. The
//! cursor is only re-aligned to a byte boundary when the record is finished.

use bytes::{Bytes, BytesMut};

use crate::ProtocolError;

/// MSB-first bit writer.
#[derive(Debug, Default)]
pub struct BitWriter {
    buf: BytesMut,
    bit_pos: usize,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::with_capacity(64)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            bit_pos: 0,
        }
    }

    /// Number of bits written so far.
    #[inline]
    pub fn bit_len(&self) -> usize {
        self.bit_pos
    }

    /// Write the low `count` bits of `value` (1..=32).
    pub fn put_bits(&mut self, count: u32, value: u32) {
        debug_assert!((1..=32).contains(&count), "bit count {count} out of range");
        for shift in (0..count).rev() {
            let byte_index = self.bit_pos >> 3;
            if byte_index == self.buf.len() {
                self.buf.extend_from_slice(&[0]);
            }
            if (value >> shift) & 1 != 0 {
                self.buf[byte_index] |= 0x80 >> (self.bit_pos & 7);
            }
            self.bit_pos += 1;
        }
    }

    #[inline]
    pub fn put_bool(&mut self, value: bool) {
        self.put_bits(1, value as u32);
    }

    /// Byte-align and return the packed record.
    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}

/// MSB-first bit reader, the inverse of [`BitWriter`].
#[derive(Debug)]
pub struct BitReader {
    buf: Bytes,
    bit_pos: usize,
}

impl BitReader {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            buf: data.into(),
            bit_pos: 0,
        }
    }

    /// Read `count` bits (1..=32) as an unsigned value.
    pub fn get_bits(&mut self, count: u32) -> Result<u32, ProtocolError> {
        if self.bit_pos + count as usize > self.buf.len() * 8 {
            return Err(ProtocolError::UnexpectedEof);
        }
        let mut value = 0u32;
        for _ in 0..count {
            let byte = self.buf[self.bit_pos >> 3];
            let bit = (byte >> (7 - (self.bit_pos & 7))) & 1;
            value = (value << 1) | bit as u32;
            self.bit_pos += 1;
        }
        Ok(value)
    }

    #[inline]
    pub fn get_bool(&mut self) -> Result<bool, ProtocolError> {
        Ok(self.get_bits(1)? == 1)
    }

    /// Byte offset of the first byte after the bit section.
    pub fn byte_position(&self) -> usize {
        self.bit_pos.div_ceil(8)
    }
}
