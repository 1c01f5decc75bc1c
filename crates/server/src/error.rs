//! World error types.

use thiserror::Error;

use crate::world::Tile;

/// Identifies a character in error reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharacterRef {
    Npc(u16),
    Player(u16),
}

impl std::fmt::Display for CharacterRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CharacterRef::Npc(index) => write!(f, "npc #{index}"),
            CharacterRef::Player(index) => write!(f, "player #{index}"),
        }
    }
}

/// Invariant violations raised by the simulation.
///
/// None of these are recoverable for the operation that raised them; the
/// tick loop aborts that entity's turn and reports the error.
#[derive(Debug, Error)]
pub enum WorldError {
    #[error("{who} at {pos} is not inside any loaded zone")]
    CharacterOutsideZone { who: CharacterRef, pos: Tile },

    #[error("No loaded zone at {0}")]
    UnloadedTile(Tile),

    #[error("No region key for mapsquare {region:#06x}")]
    MissingRegionKey { region: u16 },

    #[error("Scheduler for {who} still busy after {passes} passes")]
    SchedulerLivelock { who: CharacterRef, passes: u32 },

    #[error("Unknown {kind} template {id}")]
    UnknownTemplate { kind: &'static str, id: u16 },

    #[error("Unknown character {0}")]
    UnknownCharacter(CharacterRef),

    #[error("Character arena is full")]
    ArenaFull,

    #[error("Projectile from {from} to {to} does not fit a single launch")]
    ProjectileOutOfRange { from: Tile, to: Tile },
}
