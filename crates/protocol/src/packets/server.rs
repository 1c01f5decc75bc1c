//! Server -> Client packet building.

use crate::{BinaryWriter, GamePacket, PacketSize};

use super::ServerOpcode;

/// Pack a zone-relative tile offset (0..8 on each axis) into one byte.
#[inline]
pub fn pack_zone_offset(x: u8, y: u8) -> u8 {
    ((x & 0x7) << 4) | (y & 0x7)
}

/// Projectile launch record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectileLaunch {
    pub id: u16,
    pub start_height: u8,
    pub end_height: u8,
    /// Target index plus the category offset (npc + 1, player + 32769).
    pub target: u16,
    pub angle: u8,
    pub steepness: u8,
    pub delay: u16,
    pub lifetime: u16,
    /// Start tile, zone-relative.
    pub x: u8,
    pub y: u8,
    /// Target tile minus start tile.
    pub dx: i8,
    pub dy: i8,
}

/// A change inside one zone, addressed by zone-relative tile offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZoneUpdate {
    ObjAdd {
        id: u16,
        quantity: u16,
        x: u8,
        y: u8,
    },
    ObjDel {
        id: u16,
        x: u8,
        y: u8,
    },
    LocAddChange {
        id: u16,
        shape: u8,
        orientation: u8,
        x: u8,
        y: u8,
    },
    LocDel {
        shape: u8,
        orientation: u8,
        x: u8,
        y: u8,
    },
    Projectile(ProjectileLaunch),
}

impl ZoneUpdate {
    pub fn opcode(&self) -> ServerOpcode {
        match self {
            ZoneUpdate::ObjAdd { .. } => ServerOpcode::ObjAdd,
            ZoneUpdate::ObjDel { .. } => ServerOpcode::ObjDel,
            ZoneUpdate::LocAddChange { .. } => ServerOpcode::LocAddChange,
            ZoneUpdate::LocDel { .. } => ServerOpcode::LocDel,
            ZoneUpdate::Projectile(_) => ServerOpcode::MapProjanim,
        }
    }

    /// Index used when the update is enclosed in a batched packet.
    pub fn enclosed_index(&self) -> u8 {
        match self {
            ZoneUpdate::ObjAdd { .. } => 0,
            ZoneUpdate::ObjDel { .. } => 1,
            ZoneUpdate::LocAddChange { .. } => 2,
            ZoneUpdate::LocDel { .. } => 3,
            ZoneUpdate::Projectile(_) => 4,
        }
    }

    fn payload_len(&self) -> usize {
        match self {
            ZoneUpdate::ObjAdd { .. } => 5,
            ZoneUpdate::ObjDel { .. } => 3,
            ZoneUpdate::LocAddChange { .. } => 4,
            ZoneUpdate::LocDel { .. } => 2,
            ZoneUpdate::Projectile(_) => 15,
        }
    }

    fn write_payload(&self, w: &mut BinaryWriter) {
        match self {
            ZoneUpdate::ObjAdd { id, quantity, x, y } => {
                w.put_u16(*id);
                w.put_u16(*quantity);
                w.put_u8(pack_zone_offset(*x, *y));
            }
            ZoneUpdate::ObjDel { id, x, y } => {
                w.put_u16(*id);
                w.put_u8(pack_zone_offset(*x, *y));
            }
            ZoneUpdate::LocAddChange { id, shape, orientation, x, y } => {
                w.put_u16(*id);
                w.put_u8((shape << 2) | (orientation & 0x3));
                w.put_u8(pack_zone_offset(*x, *y));
            }
            ZoneUpdate::LocDel { shape, orientation, x, y } => {
                w.put_u8((shape << 2) | (orientation & 0x3));
                w.put_u8(pack_zone_offset(*x, *y));
            }
            ZoneUpdate::Projectile(p) => {
                w.put_u8(pack_zone_offset(p.x, p.y));
                w.put_i8(p.dx);
                w.put_i8(p.dy);
                w.put_u16(p.target);
                w.put_u16(p.id);
                w.put_u8(p.start_height);
                w.put_u8(p.end_height);
                w.put_u16(p.delay);
                w.put_u16(p.lifetime);
                w.put_u8(p.angle);
                w.put_u8(p.steepness);
            }
        }
    }

    /// Build the standalone packet for this update.
    pub fn to_packet(&self) -> GamePacket {
        let len = self.payload_len();
        let mut w = BinaryWriter::with_capacity(len);
        self.write_payload(&mut w);
        GamePacket::new(self.opcode() as u8, PacketSize::Fixed(len), w.finish())
    }
}

/// Build an UpdateZonePartialFollows packet. `x`/`y` are the zone's tile
/// offset from the scene base.
pub fn build_update_zone_partial_follows(x: u8, y: u8) -> GamePacket {
    let mut w = BinaryWriter::with_capacity(2);
    w.put_u8(x);
    w.put_u8(y);
    GamePacket::new(ServerOpcode::UpdateZonePartialFollows as u8, PacketSize::Fixed(2), w.finish())
}

/// Build an UpdateZoneFullFollows packet (clears the zone client-side).
pub fn build_update_zone_full_follows(x: u8, y: u8) -> GamePacket {
    let mut w = BinaryWriter::with_capacity(2);
    w.put_u8(x);
    w.put_u8(y);
    GamePacket::new(ServerOpcode::UpdateZoneFullFollows as u8, PacketSize::Fixed(2), w.finish())
}

/// Build an UpdateZonePartialEnclosed packet carrying several updates.
pub fn build_update_zone_partial_enclosed(x: u8, y: u8, updates: &[ZoneUpdate]) -> GamePacket {
    let mut w = BinaryWriter::with_capacity(2 + updates.len() * 8);
    w.put_u8(x);
    w.put_u8(y);
    for update in updates {
        w.put_u8(update.enclosed_index());
        update.write_payload(&mut w);
    }
    GamePacket::new(ServerOpcode::UpdateZonePartialEnclosed as u8, PacketSize::VarShort, w.finish())
}

/// Build a RebuildNormal packet: new middle zone plus the region keys of
/// every mapsquare the client must now load.
pub fn build_rebuild_normal(zone_x: u16, zone_y: u16, keys: &[[i32; 4]]) -> GamePacket {
    let mut w = BinaryWriter::with_capacity(6 + keys.len() * 16);
    w.put_u16(zone_x);
    w.put_u16(zone_y);
    w.put_u16(keys.len() as u16);
    for key in keys {
        for word in key {
            w.put_i32(*word);
        }
    }
    GamePacket::new(ServerOpcode::RebuildNormal as u8, PacketSize::VarShort, w.finish())
}

/// Build a SetMapFlag packet. Offsets are relative to the scene base;
/// 0xFF on both axes clears the flag.
pub fn build_set_map_flag(x: u8, y: u8) -> GamePacket {
    let mut w = BinaryWriter::with_capacity(2);
    w.put_u8(x);
    w.put_u8(y);
    GamePacket::new(ServerOpcode::SetMapFlag as u8, PacketSize::Fixed(2), w.finish())
}

/// Build a LogoutFull packet.
pub fn build_logout_full() -> GamePacket {
    GamePacket::new(ServerOpcode::LogoutFull as u8, PacketSize::Fixed(0), bytes::Bytes::new())
}
