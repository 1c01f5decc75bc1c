//! Wire protocol for the world server.
//!
//! This crate contains:
//! - Byte and bit level reading/writing utilities
//! - The ISAAC keystream used to scramble opcodes
//! - Opcode framing
//! - Packet definitions and builders
//! - Shared world geometry constants

mod binary;
mod bits;
mod error;
mod frame;
mod isaac;
pub mod packets;

pub use binary::{BinaryReader, BinaryWriter};
pub use bits::{BitReader, BitWriter};
pub use error::ProtocolError;
pub use frame::{GamePacket, PacketDecoder, PacketEncoder, PacketSize};
pub use isaac::IsaacRandom;

/// Tiles per zone edge.
pub const ZONE_SIZE: i32 = 8;
/// Tiles per mapsquare edge.
pub const MAPSQUARE_SIZE: i32 = 64;
/// Zones per scene edge.
pub const VIEWPORT_SIZE: i32 = 13;
/// Zones between the scene's middle zone and its edge.
pub const VIEWPORT_RADIUS: i32 = VIEWPORT_SIZE / 2;
/// Chebyshev tile distance within which characters are visible.
pub const INTEREST_RADIUS: i32 = 15;
/// Interest radius rounded up to whole zones.
pub const INTEREST_RADIUS_ZONES: i32 = (INTEREST_RADIUS + ZONE_SIZE - 1) / ZONE_SIZE;
/// Width of the wrapped relative coordinate space in an addition record.
pub const INTEREST_SIZE: i32 = 32;
