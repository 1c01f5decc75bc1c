//! World entities.
//!
//! Players and npcs share a [`Character`]; the [`Actor`] trait gives generic
//! code (arenas, movement, visibility) access to it.

mod character;
mod loc;
mod movement;
mod npc;
mod obj;
mod player;
mod update_flags;

pub use character::{
    lock_code, ActiveSequence, Character, ChatMessage, PostAction, SpotAnimation,
    CLIENT_CYCLES_PER_TICK, MESSAGE_DURATION, NO_ANIMATION,
};
pub use loc::{map_key, Loc, MAP_SLOTS};
pub use movement::{direction_code, orientation_between, MovementType, StepSnapshot};
pub use npc::Npc;
pub use obj::{Obj, Projectile};
pub use player::Player;
pub use update_flags::{UpdateFlags, UpdateKind};

use protocol::packets::InfoCategory;

use crate::error::CharacterRef;
use crate::world::Zone;

/// A character stored in a [`crate::world::CharacterArena`].
pub trait Actor: Send + Sync {
    /// Which visibility list this kind of character appears in.
    const CATEGORY: InfoCategory;

    fn character(&self) -> &Character;

    fn character_mut(&mut self) -> &mut Character;

    fn reference(&self) -> CharacterRef {
        let index = self.character().index;
        match Self::CATEGORY {
            InfoCategory::Npc => CharacterRef::Npc(index),
            InfoCategory::Player => CharacterRef::Player(index),
        }
    }

    /// Id sent with an npc addition.
    fn spawn_id(&self) -> Option<u16> {
        None
    }

    /// Indices of this kind resident in `zone`.
    fn residents(zone: &Zone) -> &[u16];

    fn enter(zone: &mut Zone, index: u16);

    fn leave(zone: &mut Zone, index: u16);
}
