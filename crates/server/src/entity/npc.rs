//! Non-player characters.

use protocol::packets::InfoCategory;

use crate::world::{Tile, Zone, ZoneId};

use super::character::Character;
use super::Actor;

#[derive(Debug)]
pub struct Npc {
    pub character: Character,
    /// Template id, sent to clients as the spawn id.
    pub template_id: u16,
    /// Where the npc was first placed.
    pub spawn: Tile,
}

impl Npc {
    pub fn new(index: u16, template_id: u16, pos: Tile, zone: ZoneId, size: u8) -> Self {
        Self {
            character: Character::new(index, pos, zone, size),
            template_id,
            spawn: pos,
        }
    }
}

impl Actor for Npc {
    const CATEGORY: InfoCategory = InfoCategory::Npc;

    fn character(&self) -> &Character {
        &self.character
    }

    fn character_mut(&mut self) -> &mut Character {
        &mut self.character
    }

    fn spawn_id(&self) -> Option<u16> {
        Some(self.template_id)
    }

    fn residents(zone: &Zone) -> &[u16] {
        &zone.npcs
    }

    fn enter(zone: &mut Zone, index: u16) {
        zone.add_npc(index);
    }

    fn leave(zone: &mut Zone, index: u16) {
        zone.remove_npc(index);
    }
}
