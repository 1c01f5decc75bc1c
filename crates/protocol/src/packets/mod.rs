//! Packet definitions.
//!
//! This module contains both client->server and server->client packet types.

mod client;
mod info;
mod server;

pub use client::*;
pub use info::*;
pub use server::*;

/// Opcodes for client -> server packets.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientOpcode {
    /// Keep-alive, no payload.
    NoTimeout = 0,
    /// Logout request.
    Logout = 21,
    /// Public chat message.
    PublicChat = 40,
    /// First option on a loc (walks to it).
    OpLoc1 = 64,
    /// Walk by clicking the game view.
    MoveGameClick = 98,
    /// Walk by clicking the minimap.
    MoveMinimapClick = 99,
}

impl TryFrom<u8> for ClientOpcode {
    type Error = crate::ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => ClientOpcode::NoTimeout,
            21 => ClientOpcode::Logout,
            40 => ClientOpcode::PublicChat,
            64 => ClientOpcode::OpLoc1,
            98 => ClientOpcode::MoveGameClick,
            99 => ClientOpcode::MoveMinimapClick,
            _ => return Err(crate::ProtocolError::InvalidOpcode(value)),
        })
    }
}

/// Opcodes for server -> client packets.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerOpcode {
    /// Clear one zone; its full content follows.
    UpdateZoneFullFollows = 0,
    /// Several zone updates enclosed in one packet.
    UpdateZonePartialEnclosed = 6,
    /// Npc visibility and visual updates.
    NpcInfoSmallViewport = 7,
    /// Projectile launched from a zone tile.
    MapProjanim = 13,
    /// Ground object removed.
    ObjDel = 14,
    /// Select the zone for the single update that follows.
    UpdateZonePartialFollows = 24,
    /// Loc removed.
    LocDel = 33,
    /// Minimap destination flag.
    SetMapFlag = 43,
    /// Recentre the scene on a new middle zone.
    RebuildNormal = 54,
    /// Ground object added.
    ObjAdd = 58,
    /// Logout acknowledged.
    LogoutFull = 68,
    /// Loc added or changed.
    LocAddChange = 69,
    /// Player visibility and visual updates.
    PlayerInfo = 79,
}
