//! Connected players.

use protocol::packets::{build_logout_full, InfoCategory};
use protocol::GamePacket;
use tracing::debug;

use crate::interest::{SceneManager, VisibilityTracker};
use crate::world::{Tile, Zone, ZoneId};

use super::character::Character;
use super::Actor;

#[derive(Debug)]
pub struct Player {
    pub character: Character,
    pub username: String,
    pub scene: SceneManager,
    pub npc_tracker: VisibilityTracker,
    pub player_tracker: VisibilityTracker,
    /// Position or facing changed since the last save.
    pub persist_dirty: bool,
    /// Logout requested; the player is removed at the end of the tick.
    pub logout_staged: bool,
    /// Packets built this tick, flushed once the tick's updates are complete.
    pub outbound: Vec<GamePacket>,
}

impl Player {
    pub fn new(index: u16, username: impl Into<String>, pos: Tile, zone: ZoneId) -> Self {
        Self {
            character: Character::new(index, pos, zone, 1),
            username: username.into(),
            scene: SceneManager::new(),
            npc_tracker: VisibilityTracker::new(InfoCategory::Npc),
            player_tracker: VisibilityTracker::new(InfoCategory::Player),
            persist_dirty: false,
            logout_staged: false,
            outbound: Vec::new(),
        }
    }

    pub fn write(&mut self, packet: GamePacket) {
        self.outbound.push(packet);
    }

    pub fn take_outbound(&mut self) -> Vec<GamePacket> {
        std::mem::take(&mut self.outbound)
    }

    /// Acknowledge the logout and mark the player for removal. Idempotent.
    pub fn stage_logout(&mut self) {
        if self.logout_staged {
            return;
        }
        debug!("Staging logout for {} (#{})", self.username, self.character.index);
        self.logout_staged = true;
        self.write(build_logout_full());
    }
}

impl Actor for Player {
    const CATEGORY: InfoCategory = InfoCategory::Player;

    fn character(&self) -> &Character {
        &self.character
    }

    fn character_mut(&mut self) -> &mut Character {
        &mut self.character
    }

    fn residents(zone: &Zone) -> &[u16] {
        &zone.players
    }

    fn enter(zone: &mut Zone, index: u16) {
        zone.add_player(index);
    }

    fn leave(zone: &mut Zone, index: u16) {
        zone.remove_player(index);
    }
}
