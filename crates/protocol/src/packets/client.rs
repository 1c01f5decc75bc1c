//! Client -> Server packet parsing.

use bytes::Bytes;

use crate::{BinaryReader, ProtocolError};

use super::ClientOpcode;

/// Parsed client packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientPacket {
    /// Keep-alive.
    NoTimeout,
    /// Walk request from a game view or minimap click.
    Walk { x: u16, y: u16, run: bool },
    /// First option on a loc; the server walks the player to it.
    OpLoc1 { id: u16, x: u16, y: u16, run: bool },
    /// Public chat (0x28).
    PublicChat { message: String },
    /// Logout request (0x15).
    Logout,
}

/// First message on a connection: the client's keystream seeds and name.
///
/// The client scrambles outbound opcodes with the seeds as given; the server
/// scrambles its own with every seed offset by 50.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRequest {
    pub seeds: [u32; 4],
    pub username: String,
}

impl LoginRequest {
    pub const SERVER_SEED_OFFSET: u32 = 50;

    pub fn parse(payload: Bytes) -> Result<Self, ProtocolError> {
        let mut reader = BinaryReader::new(payload);
        let mut seeds = [0u32; 4];
        for seed in &mut seeds {
            *seed = reader.get_u32()?;
        }
        let username = reader.get_string()?;
        Ok(Self { seeds, username })
    }

    /// Seeds for descrambling what the client sends.
    pub fn decoder_seeds(&self) -> [u32; 4] {
        self.seeds
    }

    /// Seeds for scrambling what the server sends.
    pub fn encoder_seeds(&self) -> [u32; 4] {
        self.seeds.map(|seed| seed.wrapping_add(Self::SERVER_SEED_OFFSET))
    }
}

impl ClientPacket {
    /// Parse a client packet from its descrambled opcode and payload.
    pub fn parse(opcode: u8, payload: Bytes) -> Result<Self, ProtocolError> {
        let mut reader = BinaryReader::new(payload);

        match ClientOpcode::try_from(opcode)? {
            ClientOpcode::NoTimeout => Ok(ClientPacket::NoTimeout),
            ClientOpcode::MoveGameClick | ClientOpcode::MoveMinimapClick => {
                let x = reader.get_u16()?;
                let y = reader.get_u16()?;
                let run = reader.get_u8()? != 0;
                Ok(ClientPacket::Walk { x, y, run })
            }
            ClientOpcode::OpLoc1 => {
                let id = reader.get_u16()?;
                let x = reader.get_u16()?;
                let y = reader.get_u16()?;
                let run = reader.get_u8()? != 0;
                Ok(ClientPacket::OpLoc1 { id, x, y, run })
            }
            ClientOpcode::PublicChat => {
                let message = reader.get_string()?;
                Ok(ClientPacket::PublicChat { message })
            }
            ClientOpcode::Logout => Ok(ClientPacket::Logout),
        }
    }
}
