//! Placed scenery.

use protocol::packets::ZoneUpdate;

use crate::template::LocTemplate;
use crate::world::Tile;

/// Map slot per loc shape. Only one loc per slot may occupy a tile.
pub const MAP_SLOTS: [u8; 23] = [
    0, 0, 0, 0, 1, 1, 1, 1, 1, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 3,
];

/// A loc placed in the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Loc {
    pub id: u16,
    /// Shape (0..=22): walls, wall decorations, centrepieces, ground decorations.
    pub shape: u8,
    /// Quarter turns clockwise (0..=3).
    pub orientation: u8,
    pub pos: Tile,
}

impl Loc {
    pub fn new(id: u16, shape: u8, orientation: u8, pos: Tile) -> Self {
        Self {
            id,
            shape,
            orientation: orientation & 0x3,
            pos,
        }
    }

    /// Map slot; unknown shapes fall into the centrepiece slot.
    pub fn slot(&self) -> u8 {
        MAP_SLOTS.get(self.shape as usize).copied().unwrap_or(2)
    }

    /// Key identifying this loc's slot within its zone.
    pub fn map_key(&self) -> u8 {
        let (x, y) = self.pos.zone_local();
        map_key(x, y, self.slot())
    }

    pub fn add_change_update(&self) -> ZoneUpdate {
        let (x, y) = self.pos.zone_local();
        ZoneUpdate::LocAddChange {
            id: self.id,
            shape: self.shape,
            orientation: self.orientation,
            x,
            y,
        }
    }

    pub fn delete_update(&self) -> ZoneUpdate {
        let (x, y) = self.pos.zone_local();
        ZoneUpdate::LocDel {
            shape: self.shape,
            orientation: self.orientation,
            x,
            y,
        }
    }

    /// Footprint size after rotation.
    pub fn size(&self, template: &LocTemplate) -> (i32, i32) {
        if self.orientation & 1 == 0 {
            (template.width as i32, template.length as i32)
        } else {
            (template.length as i32, template.width as i32)
        }
    }

    /// Access-block sides (bit 0 north, 1 east, 2 south, 3 west) after rotation.
    pub fn access_block(&self, template: &LocTemplate) -> u8 {
        let flags = template.access_block & 0xF;
        if self.orientation == 0 {
            flags
        } else {
            ((flags << self.orientation) & 0xF) | (flags >> (4 - self.orientation))
        }
    }
}

/// Build a map key from a zone-local offset and a slot.
#[inline]
pub fn map_key(local_x: u8, local_y: u8, slot: u8) -> u8 {
    ((local_x & 7) << 5) | ((local_y & 7) << 2) | (slot & 3)
}
