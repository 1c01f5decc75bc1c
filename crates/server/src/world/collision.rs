//! Per-tile collision flags.

use bitflags::bitflags;

bitflags! {
    /// Blocking state of one tile.
    ///
    /// Wall bits name the side (or corner) of the tile that is walled off.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CollisionFlags: u32 {
        const WALL_NORTH_WEST = 0x1;
        const WALL_NORTH = 0x2;
        const WALL_NORTH_EAST = 0x4;
        const WALL_EAST = 0x8;
        const WALL_SOUTH_EAST = 0x10;
        const WALL_SOUTH = 0x20;
        const WALL_SOUTH_WEST = 0x40;
        const WALL_WEST = 0x80;
        const OBJECT = 0x100;
        const FLOOR_DECORATION = 0x8_0000;
        const FLOOR = 0x20_0000;
        const UNLOADED = 0x100_0000;

        /// Blocks any movement onto the tile.
        const BLOCK_TILE = Self::OBJECT.bits() | Self::FLOOR_DECORATION.bits()
            | Self::FLOOR.bits() | Self::UNLOADED.bits();

        /// Tile cannot be entered moving west (blocked by its east wall).
        const BLOCK_EAST = Self::BLOCK_TILE.bits() | Self::WALL_EAST.bits();
        /// Tile cannot be entered moving east.
        const BLOCK_WEST = Self::BLOCK_TILE.bits() | Self::WALL_WEST.bits();
        /// Tile cannot be entered moving south.
        const BLOCK_NORTH = Self::BLOCK_TILE.bits() | Self::WALL_NORTH.bits();
        /// Tile cannot be entered moving north.
        const BLOCK_SOUTH = Self::BLOCK_TILE.bits() | Self::WALL_SOUTH.bits();

        const BLOCK_NORTH_EAST = Self::BLOCK_TILE.bits() | Self::WALL_NORTH.bits()
            | Self::WALL_NORTH_EAST.bits() | Self::WALL_EAST.bits();
        const BLOCK_NORTH_WEST = Self::BLOCK_TILE.bits() | Self::WALL_NORTH.bits()
            | Self::WALL_NORTH_WEST.bits() | Self::WALL_WEST.bits();
        const BLOCK_SOUTH_EAST = Self::BLOCK_TILE.bits() | Self::WALL_SOUTH.bits()
            | Self::WALL_SOUTH_EAST.bits() | Self::WALL_EAST.bits();
        const BLOCK_SOUTH_WEST = Self::BLOCK_TILE.bits() | Self::WALL_SOUTH.bits()
            | Self::WALL_SOUTH_WEST.bits() | Self::WALL_WEST.bits();
    }
}

impl CollisionFlags {
    /// Whether any bit of `mask` is set.
    #[inline]
    pub fn blocks(self, mask: CollisionFlags) -> bool {
        self.intersects(mask)
    }
}

/// Collision words for one 8x8 zone, indexed `x + y * 8`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneCollision {
    flags: [u32; 64],
}

impl Default for ZoneCollision {
    fn default() -> Self {
        Self { flags: [0; 64] }
    }
}

impl ZoneCollision {
    #[inline]
    fn slot(x: u8, y: u8) -> usize {
        (x as usize & 7) + ((y as usize & 7) << 3)
    }

    #[inline]
    pub fn get(&self, x: u8, y: u8) -> CollisionFlags {
        CollisionFlags::from_bits_retain(self.flags[Self::slot(x, y)])
    }

    #[inline]
    pub fn add(&mut self, x: u8, y: u8, flags: CollisionFlags) {
        self.flags[Self::slot(x, y)] |= flags.bits();
    }

    #[inline]
    pub fn remove(&mut self, x: u8, y: u8, flags: CollisionFlags) {
        self.flags[Self::slot(x, y)] &= !flags.bits();
    }
}
