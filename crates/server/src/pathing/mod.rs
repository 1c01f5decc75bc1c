//! Collision-aware pathfinding.

mod bfs;
mod check_walk;
mod destination;

pub use bfs::{
    find_path, BfsPathfinder, ALTERNATIVE_RANGE, MAX_ALTERNATIVE_PATH, QUEUE_CAPACITY, SEARCH_SIZE,
};
pub use check_walk::{
    can_move_east, can_move_north, can_move_north_east, can_move_north_west, can_move_south,
    can_move_south_east, can_move_south_west, can_move_west,
};
pub use destination::{side, Destination, DestinationRect, DestinationTile};
