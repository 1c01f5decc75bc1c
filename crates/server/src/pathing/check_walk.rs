//! Single-step legality checks for a square mover.
//!
//! `(x, y)` is the mover's south-west tile and `size` its footprint edge. A
//! diagonal step also checks the corner flags along both leading edges, and
//! the north-east check walks the far diagonal rather than the east edge.
//! Both quirks must match the client, so they are kept as is.

use crate::world::{CollisionFlags as F, ZoneMap};

#[inline]
fn blocked(map: &ZoneMap, floor: u8, x: i32, y: i32, mask: F) -> bool {
    map.collision_flags(floor, x, y).blocks(mask)
}

pub fn can_move_west(map: &ZoneMap, floor: u8, x: i32, y: i32, size: i32) -> bool {
    (0..size).all(|i| !blocked(map, floor, x - 1, y + i, F::BLOCK_EAST))
}

pub fn can_move_east(map: &ZoneMap, floor: u8, x: i32, y: i32, size: i32) -> bool {
    (0..size).all(|i| !blocked(map, floor, x + size, y + i, F::BLOCK_WEST))
}

pub fn can_move_south(map: &ZoneMap, floor: u8, x: i32, y: i32, size: i32) -> bool {
    (0..size).all(|i| !blocked(map, floor, x + i, y - 1, F::BLOCK_NORTH))
}

pub fn can_move_north(map: &ZoneMap, floor: u8, x: i32, y: i32, size: i32) -> bool {
    (0..size).all(|i| !blocked(map, floor, x + i, y + size, F::BLOCK_SOUTH))
}

pub fn can_move_south_west(map: &ZoneMap, floor: u8, x: i32, y: i32, size: i32) -> bool {
    if blocked(map, floor, x + size - 1, y - 1, F::BLOCK_NORTH)
        || blocked(map, floor, x - 1, y + size - 1, F::BLOCK_EAST)
    {
        return false;
    }
    (0..size).all(|i| {
        !blocked(map, floor, x + i - 1, y - 1, F::BLOCK_NORTH_EAST)
            && !blocked(map, floor, x - 1, y + i - 1, F::BLOCK_NORTH_EAST)
    })
}

pub fn can_move_south_east(map: &ZoneMap, floor: u8, x: i32, y: i32, size: i32) -> bool {
    if blocked(map, floor, x, y - 1, F::BLOCK_NORTH)
        || blocked(map, floor, x + size, y + size - 1, F::BLOCK_WEST)
    {
        return false;
    }
    (0..size).all(|i| {
        !blocked(map, floor, x + size - i, y - 1, F::BLOCK_NORTH_WEST)
            && !blocked(map, floor, x + size, y + i - 1, F::BLOCK_NORTH_WEST)
    })
}

pub fn can_move_north_west(map: &ZoneMap, floor: u8, x: i32, y: i32, size: i32) -> bool {
    if blocked(map, floor, x + size - 1, y + size, F::BLOCK_SOUTH)
        || blocked(map, floor, x - 1, y, F::BLOCK_EAST)
    {
        return false;
    }
    (0..size).all(|i| {
        !blocked(map, floor, x - 1, y + size - i, F::BLOCK_SOUTH_EAST)
            && !blocked(map, floor, x + i - 1, y + size, F::BLOCK_SOUTH_EAST)
    })
}

pub fn can_move_north_east(map: &ZoneMap, floor: u8, x: i32, y: i32, size: i32) -> bool {
    if blocked(map, floor, x, y + size, F::BLOCK_SOUTH)
        || blocked(map, floor, x + size, y, F::BLOCK_WEST)
    {
        return false;
    }
    (0..size).all(|i| {
        !blocked(map, floor, x + size, y + size - i, F::BLOCK_SOUTH_WEST)
            && !blocked(map, floor, x + size - i, y + size - i, F::BLOCK_SOUTH_WEST)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{Tile, ZoneCoord};

    fn open_map() -> ZoneMap {
        let mut map = ZoneMap::new();
        map.load_area(0, (0, 0), (3, 3));
        map
    }

    #[test]
    fn test_open_ground_allows_every_direction() {
        let map = open_map();
        let (x, y) = (10, 10);
        assert!(can_move_west(&map, 0, x, y, 1));
        assert!(can_move_east(&map, 0, x, y, 1));
        assert!(can_move_south(&map, 0, x, y, 1));
        assert!(can_move_north(&map, 0, x, y, 1));
        assert!(can_move_south_west(&map, 0, x, y, 1));
        assert!(can_move_south_east(&map, 0, x, y, 1));
        assert!(can_move_north_west(&map, 0, x, y, 1));
        assert!(can_move_north_east(&map, 0, x, y, 1));
    }

    #[test]
    fn test_east_wall_blocks_entering_from_the_east() {
        let mut map = open_map();
        map.add_collision(Tile::new(0, 9, 10), F::WALL_EAST);
        assert!(!can_move_west(&map, 0, 10, 10, 1));
        assert!(can_move_east(&map, 0, 8, 10, 1));
    }

    #[test]
    fn test_diagonal_needs_both_straight_neighbours() {
        let mut map = open_map();
        map.add_collision(Tile::new(0, 11, 10), F::OBJECT);
        assert!(!can_move_north_east(&map, 0, 10, 10, 1));
        assert!(!can_move_south_east(&map, 0, 10, 10, 1));
        assert!(can_move_north_west(&map, 0, 10, 10, 1));

        let mut map = open_map();
        map.add_collision(Tile::new(0, 10, 9), F::OBJECT);
        assert!(!can_move_south_west(&map, 0, 10, 10, 1));
        assert!(!can_move_south_east(&map, 0, 10, 10, 1));
        assert!(can_move_north_east(&map, 0, 10, 10, 1));
    }

    #[test]
    fn test_world_edge_is_blocked() {
        let mut map = ZoneMap::new();
        map.load_zone(ZoneCoord::new(0, 0, 0));
        assert!(!can_move_west(&map, 0, 0, 3, 1));
        assert!(!can_move_north_east(&map, 0, 7, 7, 1));
        assert!(can_move_north_east(&map, 0, 6, 6, 1));
    }

    #[test]
    fn test_large_mover_checks_whole_edge() {
        let mut map = open_map();
        map.add_collision(Tile::new(0, 12, 11), F::OBJECT);
        assert!(!can_move_east(&map, 0, 10, 10, 2));
        assert!(can_move_east(&map, 0, 10, 10, 1));
    }
}
