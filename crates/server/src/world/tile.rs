//! Tile and zone coordinates.

use std::fmt;

use protocol::{INTEREST_RADIUS, MAPSQUARE_SIZE, ZONE_SIZE};
use serde::{Deserialize, Serialize};

/// An absolute world coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
pub struct Tile {
    pub floor: u8,
    pub x: i32,
    pub y: i32,
}

impl Tile {
    pub const fn new(floor: u8, x: i32, y: i32) -> Self {
        Self { floor, x, y }
    }

    /// Same floor, shifted by `(dx, dy)`.
    #[inline]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            floor: self.floor,
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// The zone containing this tile.
    #[inline]
    pub const fn zone(self) -> ZoneCoord {
        ZoneCoord {
            floor: self.floor,
            x: self.x >> 3,
            y: self.y >> 3,
        }
    }

    /// Offset inside the containing zone (0..8 on each axis).
    #[inline]
    pub const fn zone_local(self) -> (u8, u8) {
        ((self.x & (ZONE_SIZE - 1)) as u8, (self.y & (ZONE_SIZE - 1)) as u8)
    }

    /// Chebyshev distance, ignoring floor.
    #[inline]
    pub fn chebyshev(self, other: Tile) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }

    /// Whether `other` is on the same floor within `distance` tiles on both axes.
    #[inline]
    pub fn within(self, other: Tile, distance: i32) -> bool {
        self.floor == other.floor && self.chebyshev(other) <= distance
    }

    /// Whether a character at `other` is visible from here.
    #[inline]
    pub fn is_interested_in(self, other: Tile) -> bool {
        self.within(other, INTEREST_RADIUS)
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.floor, self.x, self.y)
    }
}

/// A zone coordinate: tile coordinate divided by the zone size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ZoneCoord {
    pub floor: u8,
    pub x: i32,
    pub y: i32,
}

impl ZoneCoord {
    pub const fn new(floor: u8, x: i32, y: i32) -> Self {
        Self { floor, x, y }
    }

    /// South-west tile of this zone.
    #[inline]
    pub const fn base_tile(self) -> Tile {
        Tile {
            floor: self.floor,
            x: self.x * ZONE_SIZE,
            y: self.y * ZONE_SIZE,
        }
    }

    #[inline]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            floor: self.floor,
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// Chebyshev distance in zones, ignoring floor.
    #[inline]
    pub fn chebyshev(self, other: ZoneCoord) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }

    /// Mapsquare index on one axis.
    #[inline]
    pub const fn mapsquare(zone: i32) -> i32 {
        zone * ZONE_SIZE / MAPSQUARE_SIZE
    }
}

impl fmt::Display for ZoneCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "zone({}, {}, {})", self.floor, self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_of_tile() {
        let tile = Tile::new(0, 3222, 3235);
        assert_eq!(tile.zone(), ZoneCoord::new(0, 402, 404));
        assert_eq!(tile.zone_local(), (6, 3));
        assert_eq!(tile.zone().base_tile(), Tile::new(0, 3216, 3232));
    }

    #[test]
    fn test_negative_tiles_floor_into_zones() {
        let tile = Tile::new(0, -1, -9);
        assert_eq!(tile.zone(), ZoneCoord::new(0, -1, -2));
        assert_eq!(tile.zone_local(), (7, 7));
    }

    #[test]
    fn test_interest_ignores_other_floors() {
        let a = Tile::new(0, 100, 100);
        assert!(a.is_interested_in(Tile::new(0, 115, 85)));
        assert!(!a.is_interested_in(Tile::new(0, 116, 100)));
        assert!(!a.is_interested_in(Tile::new(1, 100, 100)));
    }
}
