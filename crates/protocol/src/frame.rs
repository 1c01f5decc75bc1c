//! Opcode framing.
//!
//! A frame is one scrambled opcode byte, an optional length prefix selected by
//! the packet's size class, and the payload bytes.

use bytes::{BufMut, Bytes, BytesMut};

use crate::{IsaacRandom, ProtocolError};

/// Size class of an outbound packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketSize {
    /// Payload length is known to both sides; no prefix.
    Fixed(usize),
    /// One-byte length prefix.
    VarByte,
    /// Two-byte length prefix.
    VarShort,
}

/// An encoded packet waiting to be framed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GamePacket {
    pub opcode: u8,
    pub size: PacketSize,
    pub payload: Bytes,
}

impl GamePacket {
    pub fn new(opcode: u8, size: PacketSize, payload: Bytes) -> Self {
        Self { opcode, size, payload }
    }

    fn check_size(&self) -> Result<(), ProtocolError> {
        let len = self.payload.len();
        let fits = match self.size {
            PacketSize::Fixed(expected) => {
                if expected != len {
                    return Err(ProtocolError::SizeMismatch {
                        opcode: self.opcode,
                        expected,
                        actual: len,
                    });
                }
                true
            }
            PacketSize::VarByte => len <= u8::MAX as usize,
            PacketSize::VarShort => len <= u16::MAX as usize,
        };
        if fits {
            Ok(())
        } else {
            Err(ProtocolError::PayloadTooLarge { len, size: self.size })
        }
    }
}

/// Frames outbound packets, scrambling opcodes with the connection keystream.
#[derive(Debug)]
pub struct PacketEncoder {
    cipher: IsaacRandom,
}

impl PacketEncoder {
    pub fn new(cipher: IsaacRandom) -> Self {
        Self { cipher }
    }

    /// Append one framed packet to `out`.
    ///
    /// The keystream only advances when the packet is actually written.
    pub fn encode(&mut self, packet: &GamePacket, out: &mut BytesMut) -> Result<(), ProtocolError> {
        packet.check_size()?;
        let key = self.cipher.next_int();
        out.put_u8(packet.opcode.wrapping_add(key as u8));
        match packet.size {
            PacketSize::Fixed(_) => {}
            PacketSize::VarByte => out.put_u8(packet.payload.len() as u8),
            PacketSize::VarShort => out.put_u16(packet.payload.len() as u16),
        }
        out.put_slice(&packet.payload);
        Ok(())
    }
}

/// Descrambles inbound opcodes.
#[derive(Debug)]
pub struct PacketDecoder {
    cipher: IsaacRandom,
}

impl PacketDecoder {
    pub fn new(cipher: IsaacRandom) -> Self {
        Self { cipher }
    }

    /// Split one inbound message into its plain opcode and payload.
    pub fn decode(&mut self, frame: &[u8]) -> Result<(u8, Bytes), ProtocolError> {
        let (&scrambled, payload) = frame.split_first().ok_or(ProtocolError::UnexpectedEof)?;
        let key = self.cipher.next_int();
        Ok((scrambled.wrapping_sub(key as u8), Bytes::copy_from_slice(payload)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed() -> [u32; 4] {
        [11, 22, 33, 44]
    }

    #[test]
    fn test_var_short_frame_layout() {
        let mut encoder = PacketEncoder::new(IsaacRandom::new(&seed()));
        let mut reference = IsaacRandom::new(&seed());
        let packet = GamePacket::new(7, PacketSize::VarShort, Bytes::from_static(&[1, 2, 3]));

        let mut out = BytesMut::new();
        encoder.encode(&packet, &mut out).unwrap();

        let expected_opcode = 7u8.wrapping_add(reference.next_int() as u8);
        assert_eq!(out.as_ref(), &[expected_opcode, 0, 3, 1, 2, 3]);
    }

    #[test]
    fn test_rejected_packet_does_not_advance_keystream() {
        let mut encoder = PacketEncoder::new(IsaacRandom::new(&seed()));
        let mut reference = IsaacRandom::new(&seed());
        let mut out = BytesMut::new();

        let oversized = GamePacket::new(1, PacketSize::VarByte, Bytes::from(vec![0u8; 300]));
        assert!(matches!(
            encoder.encode(&oversized, &mut out),
            Err(ProtocolError::PayloadTooLarge { len: 300, .. })
        ));
        let mismatch = GamePacket::new(2, PacketSize::Fixed(2), Bytes::from_static(&[0]));
        assert!(encoder.encode(&mismatch, &mut out).is_err());
        assert!(out.is_empty());

        let ok = GamePacket::new(3, PacketSize::Fixed(0), Bytes::new());
        encoder.encode(&ok, &mut out).unwrap();
        assert_eq!(out[0], 3u8.wrapping_add(reference.next_int() as u8));
    }

    #[test]
    fn test_decoder_inverts_encoder() {
        let mut encoder = PacketEncoder::new(IsaacRandom::new(&seed()));
        let mut decoder = PacketDecoder::new(IsaacRandom::new(&seed()));
        for opcode in [0u8, 98, 255] {
            let mut out = BytesMut::new();
            let packet = GamePacket::new(opcode, PacketSize::Fixed(1), Bytes::from_static(&[9]));
            encoder.encode(&packet, &mut out).unwrap();
            let (plain, payload) = decoder.decode(&out).unwrap();
            assert_eq!(plain, opcode);
            assert_eq!(payload.as_ref(), &[9]);
        }
    }
}
