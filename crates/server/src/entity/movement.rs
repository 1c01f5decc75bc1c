//! Movement state machine.

use crate::world::Tile;

use super::character::{Character, PostAction};
use super::update_flags::UpdateFlags;

/// How a character moved this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MovementType {
    #[default]
    Stay,
    Walk,
    Run,
    Teleport,
}

impl MovementType {
    /// Wire value of the temporary movement update.
    pub fn code(self) -> u8 {
        match self {
            MovementType::Stay => 0,
            MovementType::Walk => 1,
            MovementType::Run => 2,
            MovementType::Teleport => 127,
        }
    }
}

/// Movement state saved before a step so it can be undone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepSnapshot {
    pos: Tile,
    last_pos: Tile,
    follow_pos: Tile,
    orientation: u16,
    movement: MovementType,
    flags: UpdateFlags,
    post_actions: usize,
}

/// 11-bit orientation for a step of `(dx, dy)`, indexed `[2 - dy][dx + 2]`.
/// `-1` marks the zero step.
const ORIENTATION_TABLE: [[i16; 5]; 5] = [
    [768, 768, 1024, 1280, 1280],
    [768, 768, 1024, 1280, 1280],
    [512, 512, -1, 1536, 1536],
    [256, 256, 0, 1792, 1792],
    [256, 256, 0, 1792, 1792],
];

/// Orientation when moving from `prev` to `new`. `None` for a zero step or a
/// jump too long for the table.
pub fn orientation_between(prev: Tile, new: Tile) -> Option<u16> {
    let dx = new.x - prev.x;
    let dy = new.y - prev.y;
    if !(-2..=2).contains(&dx) || !(-2..=2).contains(&dy) {
        return None;
    }
    match ORIENTATION_TABLE[(2 - dy) as usize][(dx + 2) as usize] {
        -1 => None,
        value => Some(value as u16),
    }
}

/// 3-bit direction code for a single step, as used by the visibility blocks.
pub fn direction_code(dx: i32, dy: i32) -> Option<u8> {
    Some(match (dx, dy) {
        (-1, 1) => 0,
        (0, 1) => 1,
        (1, 1) => 2,
        (-1, 0) => 3,
        (1, 0) => 4,
        (-1, -1) => 5,
        (0, -1) => 6,
        (1, -1) => 7,
        _ => return None,
    })
}

impl Character {
    /// Queue a teleport. Clears any planned path.
    pub fn teleport(&mut self, to: Tile) {
        self.teleport_target = Some(to);
        self.path.clear();
    }

    /// Replace the planned path.
    pub fn set_path(&mut self, path: impl IntoIterator<Item = Tile>) {
        self.path.clear();
        self.path.extend(path);
    }

    /// Advance one tick of movement. Returns whether the position changed.
    pub fn advance(&mut self) -> bool {
        self.last_pos = self.pos;
        if let Some(target) = self.teleport_target {
            self.movement = MovementType::Teleport;
            self.flags |= UpdateFlags::MOVEMENT;
            self.pos = target;
            self.follow_pos = target.offset(-1, 0);
            self.post_actions.push(PostAction::ClearTeleport);
            return true;
        }
        let Some(first) = self.path.pop_front() else {
            return false;
        };
        if !self.run_mode {
            self.movement = MovementType::Walk;
            self.follow_pos = self.pos;
            self.pos = first;
        } else {
            match self.path.front().copied() {
                None => {
                    self.movement = MovementType::Walk;
                    self.flags |= UpdateFlags::MOVEMENT;
                    self.follow_pos = self.pos;
                    self.pos = first;
                }
                Some(second) if self.pos.chebyshev(second) <= 1 => {
                    // Cutting a corner: two tiles consumed, one tile travelled.
                    self.path.pop_front();
                    self.movement = MovementType::Walk;
                    self.follow_pos = first;
                    self.pos = second;
                }
                Some(second) => {
                    self.path.pop_front();
                    self.movement = MovementType::Run;
                    self.follow_pos = first;
                    self.pos = second;
                }
            }
        }
        if let Some(orientation) = orientation_between(self.follow_pos, self.pos) {
            self.orientation = orientation;
        }
        true
    }

    /// Capture what [`Character::advance`] may change.
    pub fn snapshot_step(&self) -> StepSnapshot {
        StepSnapshot {
            pos: self.pos,
            last_pos: self.last_pos,
            follow_pos: self.follow_pos,
            orientation: self.orientation,
            movement: self.movement,
            flags: self.flags,
            post_actions: self.post_actions.len(),
        }
    }

    /// Undo a step. The rest of the path and any pending teleport are dropped.
    pub fn revert_step(&mut self, before: StepSnapshot) {
        self.pos = before.pos;
        self.last_pos = before.last_pos;
        self.follow_pos = before.follow_pos;
        self.orientation = before.orientation;
        self.movement = before.movement;
        self.flags = before.flags;
        self.post_actions.truncate(before.post_actions);
        self.path.clear();
        self.teleport_target = None;
    }

    /// Direction codes to send for this tick's movement.
    pub fn step_directions(&self) -> Option<(u8, Option<u8>)> {
        match self.movement {
            MovementType::Walk => {
                let walk = direction_code(self.pos.x - self.last_pos.x, self.pos.y - self.last_pos.y)?;
                Some((walk, None))
            }
            MovementType::Run => {
                let first = direction_code(
                    self.follow_pos.x - self.last_pos.x,
                    self.follow_pos.y - self.last_pos.y,
                )?;
                let second = direction_code(
                    self.pos.x - self.follow_pos.x,
                    self.pos.y - self.follow_pos.y,
                )?;
                Some((first, Some(second)))
            }
            MovementType::Stay | MovementType::Teleport => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::ZoneId;

    fn at(x: i32, y: i32) -> Character {
        Character::new(1, Tile::new(0, x, y), ZoneId(0), 1)
    }

    #[test]
    fn test_walk_consumes_one_tile() {
        let mut c = at(10, 10);
        c.set_path([Tile::new(0, 11, 10), Tile::new(0, 12, 10)]);
        assert!(c.advance());
        assert_eq!(c.pos, Tile::new(0, 11, 10));
        assert_eq!(c.movement, MovementType::Walk);
        assert_eq!(c.path.len(), 1);
        assert_eq!(c.orientation, 1536);
        assert_eq!(c.step_directions(), Some((4, None)));
    }

    #[test]
    fn test_revert_step_restores_everything_advance_touched() {
        let mut c = at(10, 10);
        c.orientation = 512;
        c.flags = UpdateFlags::CHAT;
        let before = c.snapshot_step();
        c.teleport(Tile::new(0, 40, 40));
        c.set_path([Tile::new(0, 11, 10)]);
        assert!(c.advance());

        c.revert_step(before);
        assert_eq!(c.snapshot_step(), before);
        assert!(c.post_actions.is_empty());
        assert!(c.path.is_empty());
        assert!(c.teleport_target.is_none());
    }

    #[test]
    fn test_run_consumes_two_tiles() {
        let mut c = at(10, 10);
        c.run_mode = true;
        c.set_path([Tile::new(0, 11, 10), Tile::new(0, 12, 10)]);
        c.advance();
        assert_eq!(c.pos, Tile::new(0, 12, 10));
        assert_eq!(c.movement, MovementType::Run);
        assert!(c.path.is_empty());
        assert_eq!(c.step_directions(), Some((4, Some(4))));
    }

    #[test]
    fn test_run_with_one_tile_left_walks() {
        let mut c = at(10, 10);
        c.run_mode = true;
        c.set_path([Tile::new(0, 10, 11)]);
        c.advance();
        assert_eq!(c.movement, MovementType::Walk);
        assert!(c.flags.contains(UpdateFlags::MOVEMENT));
        assert_eq!(c.orientation, 1024);
    }

    #[test]
    fn test_run_around_corner_walks() {
        let mut c = at(10, 10);
        c.run_mode = true;
        c.set_path([Tile::new(0, 11, 10), Tile::new(0, 11, 11), Tile::new(0, 12, 12)]);
        c.advance();
        assert_eq!(c.pos, Tile::new(0, 11, 11));
        assert_eq!(c.movement, MovementType::Walk);
        assert_eq!(c.path.len(), 1);
        assert_eq!(c.step_directions(), Some((2, None)));
    }

    #[test]
    fn test_teleport_overrides_path() {
        let mut c = at(10, 10);
        c.set_path([Tile::new(0, 11, 10)]);
        c.teleport(Tile::new(1, 50, 50));
        assert!(c.path.is_empty());
        c.advance();
        assert_eq!(c.pos, Tile::new(1, 50, 50));
        assert_eq!(c.follow_pos, Tile::new(1, 49, 50));
        assert_eq!(c.movement, MovementType::Teleport);
        assert_eq!(c.teleport_target, Some(Tile::new(1, 50, 50)));
        c.post_process();
        assert_eq!(c.teleport_target, None);
        assert_eq!(c.movement, MovementType::Stay);
    }

    #[test]
    fn test_stationary_keeps_orientation() {
        let mut c = at(10, 10);
        c.orientation = 256;
        assert!(!c.advance());
        assert_eq!(c.orientation, 256);
        assert_eq!(orientation_between(c.pos, c.pos), None);
    }

    #[test]
    fn test_direction_codes() {
        assert_eq!(direction_code(-1, 1), Some(0));
        assert_eq!(direction_code(1, -1), Some(7));
        assert_eq!(direction_code(0, 0), None);
        assert_eq!(direction_code(2, 0), None);
    }
}
