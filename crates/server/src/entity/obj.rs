//! Ground objects and projectiles.

use crate::error::CharacterRef;
use crate::world::Tile;

/// An item stack lying on a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Obj {
    pub id: u16,
    pub quantity: u16,
}

impl Obj {
    pub fn new(id: u16, quantity: u16) -> Self {
        Self { id, quantity }
    }
}

/// An in-flight projectile, sent once to every player watching the start zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Projectile {
    pub id: u16,
    pub start: Tile,
    pub target: CharacterRef,
    /// Target position at launch.
    pub target_pos: Tile,
    pub start_height: u8,
    pub end_height: u8,
    pub angle: u8,
    pub steepness: u8,
    /// Client cycles before the projectile appears.
    pub delay: u16,
    /// Client cycles from launch to impact.
    pub lifetime: u16,
}

impl Projectile {
    /// Target index as the client expects it: npcs offset by 1, players by 32769.
    pub fn target_code(&self) -> u16 {
        match self.target {
            CharacterRef::Npc(index) => index.wrapping_add(1),
            CharacterRef::Player(index) => index.wrapping_add(32769),
        }
    }
}
