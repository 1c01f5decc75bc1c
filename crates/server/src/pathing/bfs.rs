//! Breadth-first pathfinder.
//!
//! Searches a fixed 104x104 window centred on the start tile. The frontier is
//! a 4096-entry ring buffer; in a very open window it can wrap over unread
//! entries, which ends the search early with whatever was found so far. The
//! client's pathfinder behaves the same way, so the wrap is accepted rather
//! than guarded against.

use crate::world::{Tile, ZoneMap};

use super::check_walk::*;
use super::destination::Destination;

/// Edge length of the search window.
pub const SEARCH_SIZE: i32 = 104;
/// Frontier ring buffer capacity.
pub const QUEUE_CAPACITY: usize = 4096;
/// Radius of the alternative-destination scan around the nominal target.
pub const ALTERNATIVE_RANGE: i32 = 10;
/// Cells at or beyond this BFS distance are ignored by the alternative scan.
pub const MAX_ALTERNATIVE_PATH: i32 = 99;

const HALF: i32 = SEARCH_SIZE / 2;
const CELLS: usize = (SEARCH_SIZE * SEARCH_SIZE) as usize;

// Direction to walk back towards the start.
const BACK_NORTH: u8 = 0x1;
const BACK_EAST: u8 = 0x2;
const BACK_SOUTH: u8 = 0x4;
const BACK_WEST: u8 = 0x8;
/// Marks the start cell as visited; it has no way back.
const START: u8 = 0x10;

/// Reusable search buffers.
#[derive(Debug, Clone)]
pub struct BfsPathfinder {
    directions: Vec<u8>,
    distances: Vec<i32>,
    queue: Vec<(i32, i32)>,
}

impl Default for BfsPathfinder {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn cell(x: i32, y: i32) -> usize {
    (x * SEARCH_SIZE + y) as usize
}

impl BfsPathfinder {
    pub fn new() -> Self {
        Self {
            directions: vec![0; CELLS],
            distances: vec![i32::MAX; CELLS],
            queue: vec![(0, 0); QUEUE_CAPACITY],
        }
    }

    fn reset(&mut self) {
        self.directions.fill(0);
        self.distances.fill(i32::MAX);
    }

    /// Compute a path from `start` to `destination` for a mover of `size`.
    ///
    /// The result excludes `start` and includes the end tile. It is empty
    /// when the destination is already satisfied at `start`, or when nothing
    /// (including an alternative, if allowed) can be reached.
    pub fn find_path(
        &mut self,
        start: Tile,
        destination: &dyn Destination,
        size: i32,
        allow_alternative: bool,
        map: &ZoneMap,
    ) -> Vec<Tile> {
        self.reset();
        let floor = start.floor;
        let base_x = start.x - HALF;
        let base_y = start.y - HALF;
        let limit = SEARCH_SIZE - size;

        self.directions[cell(HALF, HALF)] = START;
        self.distances[cell(HALF, HALF)] = 0;
        self.queue[0] = (HALF, HALF);
        let mut read = 0usize;
        let mut write = 1usize;
        let mut end = None;

        while read != write {
            let (cx, cy) = self.queue[read];
            read = (read + 1) & (QUEUE_CAPACITY - 1);
            let (ax, ay) = (cx + base_x, cy + base_y);

            if destination.reached(ax, ay, size) {
                end = Some((cx, cy));
                break;
            }

            let next = self.distances[cell(cx, cy)] + 1;
            let mut visit = |this: &mut Self, x: i32, y: i32, back: u8| {
                let c = cell(x, y);
                this.directions[c] = back;
                this.distances[c] = next;
                this.queue[write] = (x, y);
                write = (write + 1) & (QUEUE_CAPACITY - 1);
            };

            if cx > 0
                && self.directions[cell(cx - 1, cy)] == 0
                && can_move_west(map, floor, ax, ay, size)
            {
                visit(self, cx - 1, cy, BACK_EAST);
            }
            if cx < limit
                && self.directions[cell(cx + 1, cy)] == 0
                && can_move_east(map, floor, ax, ay, size)
            {
                visit(self, cx + 1, cy, BACK_WEST);
            }
            if cy > 0
                && self.directions[cell(cx, cy - 1)] == 0
                && can_move_south(map, floor, ax, ay, size)
            {
                visit(self, cx, cy - 1, BACK_NORTH);
            }
            if cy < limit
                && self.directions[cell(cx, cy + 1)] == 0
                && can_move_north(map, floor, ax, ay, size)
            {
                visit(self, cx, cy + 1, BACK_SOUTH);
            }
            if cx > 0
                && cy > 0
                && self.directions[cell(cx - 1, cy - 1)] == 0
                && can_move_south_west(map, floor, ax, ay, size)
            {
                visit(self, cx - 1, cy - 1, BACK_NORTH | BACK_EAST);
            }
            if cx < limit
                && cy > 0
                && self.directions[cell(cx + 1, cy - 1)] == 0
                && can_move_south_east(map, floor, ax, ay, size)
            {
                visit(self, cx + 1, cy - 1, BACK_NORTH | BACK_WEST);
            }
            if cx > 0
                && cy < limit
                && self.directions[cell(cx - 1, cy + 1)] == 0
                && can_move_north_west(map, floor, ax, ay, size)
            {
                visit(self, cx - 1, cy + 1, BACK_SOUTH | BACK_EAST);
            }
            if cx < limit
                && cy < limit
                && self.directions[cell(cx + 1, cy + 1)] == 0
                && can_move_north_east(map, floor, ax, ay, size)
            {
                visit(self, cx + 1, cy + 1, BACK_SOUTH | BACK_WEST);
            }
        }

        if end.is_none() && allow_alternative {
            let target = destination.tile();
            end = self.closest_alternative(target.x - base_x, target.y - base_y);
        }

        match end {
            Some((x, y)) if (x, y) != (HALF, HALF) => self.backtrace(x, y, base_x, base_y, floor),
            _ => Vec::new(),
        }
    }

    /// Visited cell nearest to `(tx, ty)` by squared distance, then by BFS distance.
    fn closest_alternative(&self, tx: i32, ty: i32) -> Option<(i32, i32)> {
        let mut best = None;
        let mut best_cost = i32::MAX;
        let mut best_distance = i32::MAX;
        for x in (tx - ALTERNATIVE_RANGE)..=(tx + ALTERNATIVE_RANGE) {
            for y in (ty - ALTERNATIVE_RANGE)..=(ty + ALTERNATIVE_RANGE) {
                if !(0..SEARCH_SIZE).contains(&x) || !(0..SEARCH_SIZE).contains(&y) {
                    continue;
                }
                let distance = self.distances[cell(x, y)];
                if distance >= MAX_ALTERNATIVE_PATH {
                    continue;
                }
                let (dx, dy) = (x - tx, y - ty);
                let cost = dx * dx + dy * dy;
                if cost < best_cost || (cost == best_cost && distance < best_distance) {
                    best = Some((x, y));
                    best_cost = cost;
                    best_distance = distance;
                }
            }
        }
        best
    }

    fn backtrace(&self, mut x: i32, mut y: i32, base_x: i32, base_y: i32, floor: u8) -> Vec<Tile> {
        let mut path = Vec::with_capacity(self.distances[cell(x, y)].max(0) as usize);
        // Every step lowers the BFS distance by one, so this bound is never hit
        // on a consistent direction grid.
        for _ in 0..CELLS {
            let back = self.directions[cell(x, y)];
            if back == START || back == 0 {
                break;
            }
            path.push(Tile::new(floor, x + base_x, y + base_y));
            if back & BACK_EAST != 0 {
                x += 1;
            } else if back & BACK_WEST != 0 {
                x -= 1;
            }
            if back & BACK_NORTH != 0 {
                y += 1;
            } else if back & BACK_SOUTH != 0 {
                y -= 1;
            }
        }
        path.reverse();
        path
    }
}

/// One-shot search with freshly allocated buffers.
pub fn find_path(
    start: Tile,
    destination: &dyn Destination,
    size: i32,
    allow_alternative: bool,
    map: &ZoneMap,
) -> Vec<Tile> {
    BfsPathfinder::new().find_path(start, destination, size, allow_alternative, map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pathing::{DestinationRect, DestinationTile};
    use crate::world::CollisionFlags;

    fn open_map() -> ZoneMap {
        let mut map = ZoneMap::new();
        map.load_area(0, (0, 0), (15, 15));
        map
    }

    #[test]
    fn test_straight_line() {
        let map = open_map();
        let start = Tile::new(0, 50, 50);
        let path = find_path(start, &DestinationTile(Tile::new(0, 54, 50)), 1, false, &map);
        assert_eq!(
            path,
            (51..=54).map(|x| Tile::new(0, x, 50)).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_diagonal_preferred_when_open() {
        let map = open_map();
        let start = Tile::new(0, 50, 50);
        let path = find_path(start, &DestinationTile(Tile::new(0, 53, 53)), 1, false, &map);
        assert_eq!(path.len(), 3);
        assert_eq!(path.last(), Some(&Tile::new(0, 53, 53)));
    }

    #[test]
    fn test_reached_at_start_is_empty() {
        let map = open_map();
        let start = Tile::new(0, 50, 50);
        assert!(find_path(start, &DestinationTile(start), 1, true, &map).is_empty());
        let rect = DestinationRect::new(Tile::new(0, 51, 50), 1, 1, 0);
        assert!(find_path(start, &rect, 1, true, &map).is_empty());
    }

    #[test]
    fn test_routes_around_wall() {
        let mut map = open_map();
        for y in 45..=55 {
            map.add_collision(Tile::new(0, 52, y), CollisionFlags::OBJECT);
        }
        let start = Tile::new(0, 50, 50);
        let goal = Tile::new(0, 54, 50);
        let path = find_path(start, &DestinationTile(goal), 1, false, &map);
        assert_eq!(path.last(), Some(&goal));
        assert!(path.iter().all(|t| t.x != 52 || !(45..=55).contains(&t.y)));
        for pair in std::iter::once(&start).chain(path.iter()).collect::<Vec<_>>().windows(2) {
            assert_eq!(pair[0].chebyshev(*pair[1]), 1);
        }
    }

    #[test]
    fn test_unreachable_without_alternative_is_empty() {
        let mut map = open_map();
        let goal = Tile::new(0, 60, 60);
        map.add_collision(goal, CollisionFlags::OBJECT);
        let path = find_path(Tile::new(0, 50, 50), &DestinationTile(goal), 1, false, &map);
        assert!(path.is_empty());
    }

    #[test]
    fn test_alternative_picks_nearest_reachable_tile() {
        let mut map = open_map();
        let goal = Tile::new(0, 60, 50);
        map.add_collision(goal, CollisionFlags::OBJECT);
        let path = find_path(Tile::new(0, 50, 50), &DestinationTile(goal), 1, true, &map);
        assert_eq!(path.last(), Some(&Tile::new(0, 59, 50)));
        assert_eq!(path.len(), 9);
    }
}
