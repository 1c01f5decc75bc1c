//! Destination predicates.

use crate::world::Tile;

/// Where a path should end.
pub trait Destination {
    /// Nominal target tile; alternative search is centred here.
    fn tile(&self) -> Tile;

    /// Whether a mover of `size` standing at `(x, y)` has arrived.
    fn reached(&self, x: i32, y: i32, size: i32) -> bool;
}

/// Arrive exactly on a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DestinationTile(pub Tile);

impl Destination for DestinationTile {
    fn tile(&self) -> Tile {
        self.0
    }

    fn reached(&self, x: i32, y: i32, _size: i32) -> bool {
        x == self.0.x && y == self.0.y
    }
}

/// Side bits for [`DestinationRect::blocked_sides`].
pub mod side {
    pub const NORTH: u8 = 0x1;
    pub const EAST: u8 = 0x2;
    pub const SOUTH: u8 = 0x4;
    pub const WEST: u8 = 0x8;
}

/// Arrive orthogonally next to a rectangular footprint (a loc or a character).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DestinationRect {
    /// South-west tile of the footprint.
    pub origin: Tile,
    pub width: i32,
    pub length: i32,
    /// Sides that cannot be used to reach the footprint.
    pub blocked_sides: u8,
}

impl DestinationRect {
    pub fn new(origin: Tile, width: i32, length: i32, blocked_sides: u8) -> Self {
        Self {
            origin,
            width: width.max(1),
            length: length.max(1),
            blocked_sides,
        }
    }

    fn open(&self, side: u8) -> bool {
        self.blocked_sides & side == 0
    }
}

impl Destination for DestinationRect {
    fn tile(&self) -> Tile {
        self.origin
    }

    fn reached(&self, x: i32, y: i32, size: i32) -> bool {
        let (rx, ry) = (self.origin.x, self.origin.y);
        let overlaps_x = x < rx + self.width && x + size > rx;
        let overlaps_y = y < ry + self.length && y + size > ry;

        (x + size == rx && overlaps_y && self.open(side::WEST))
            || (x == rx + self.width && overlaps_y && self.open(side::EAST))
            || (y + size == ry && overlaps_x && self.open(side::SOUTH))
            || (y == ry + self.length && overlaps_x && self.open(side::NORTH))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_accepts_orthogonal_neighbours_only() {
        let rect = DestinationRect::new(Tile::new(0, 10, 10), 2, 2, 0);
        assert!(rect.reached(9, 10, 1));
        assert!(rect.reached(12, 11, 1));
        assert!(rect.reached(10, 9, 1));
        assert!(rect.reached(11, 12, 1));
        assert!(!rect.reached(9, 9, 1));
        assert!(!rect.reached(12, 12, 1));
        assert!(!rect.reached(10, 10, 1));
    }

    #[test]
    fn test_blocked_side_is_not_an_arrival() {
        let rect = DestinationRect::new(Tile::new(0, 10, 10), 1, 1, side::WEST | side::NORTH);
        assert!(!rect.reached(9, 10, 1));
        assert!(!rect.reached(10, 11, 1));
        assert!(rect.reached(11, 10, 1));
        assert!(rect.reached(10, 9, 1));
    }

    #[test]
    fn test_large_mover_touching_rect() {
        let rect = DestinationRect::new(Tile::new(0, 10, 10), 1, 1, 0);
        assert!(rect.reached(8, 9, 2));
        assert!(!rect.reached(7, 9, 2));
    }
}
