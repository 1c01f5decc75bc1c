//! One character's scheduler turn against the live world.

use tracing::{trace, warn};

use crate::entity::{Actor, Character};
use crate::error::{CharacterRef, WorldError};
use crate::pathing::{BfsPathfinder, DestinationRect, DestinationTile};
use crate::template::TemplateRepository;
use crate::world::{Tile, World, ZoneMap};

use super::scheduler::{Event, Executor, Resume, TaskSlot};
use super::state::{Task, TaskState, Wait};

/// The map and one character, borrowed together.
fn split(world: &mut World, who: CharacterRef) -> Result<(&ZoneMap, &mut Character), WorldError> {
    let World { map, npcs, players } = world;
    let character = match who {
        CharacterRef::Npc(index) => npcs.get_mut(index).map(Actor::character_mut),
        CharacterRef::Player(index) => players.get_mut(index).map(Actor::character_mut),
    }
    .ok_or(WorldError::UnknownCharacter(who))?;
    Ok((&*map, character))
}

/// Handles events and resumes tasks for the character `who`.
pub struct CharacterTurn<'a> {
    pub world: &'a mut World,
    pub templates: &'a dyn TemplateRepository,
    pub pathfinder: &'a mut BfsPathfinder,
    pub who: CharacterRef,
    /// Current tick.
    pub now: u64,
}

impl<'a> CharacterTurn<'a> {
    pub fn new(
        world: &'a mut World,
        templates: &'a dyn TemplateRepository,
        pathfinder: &'a mut BfsPathfinder,
        who: CharacterRef,
        now: u64,
    ) -> Self {
        Self {
            world,
            templates,
            pathfinder,
            who,
            now,
        }
    }

    fn character_mut(&mut self) -> Result<&mut Character, WorldError> {
        self.world
            .character_mut(self.who)
            .ok_or(WorldError::UnknownCharacter(self.who))
    }

    fn handle(&mut self, event: Event) -> Result<(), WorldError> {
        trace!("{} handling {:?}", self.who, event);
        match event {
            Event::Walk { x, y, run } => self.walk(x, y, run),
            Event::LocClick { id, x, y, run } => self.approach_loc(id, x, y, run),
            Event::PublicChat { effects, message } => {
                let now = self.now;
                self.character_mut()?.talk(effects, message, now);
                Ok(())
            }
            Event::Moved => {
                if let CharacterRef::Player(index) = self.who {
                    if let Some(player) = self.world.players.get_mut(index) {
                        player.persist_dirty = true;
                    }
                }
                Ok(())
            }
            Event::Logout => {
                if let CharacterRef::Player(index) = self.who {
                    if let Some(player) = self.world.players.get_mut(index) {
                        player.stage_logout();
                    }
                }
                Ok(())
            }
        }
    }

    fn walk(&mut self, x: u16, y: u16, run: bool) -> Result<(), WorldError> {
        let (map, character) = split(self.world, self.who)?;
        let target = Tile::new(character.pos.floor, x as i32, y as i32);
        let path = self.pathfinder.find_path(
            character.pos,
            &DestinationTile(target),
            character.size as i32,
            true,
            map,
        );
        character.set_run_mode(run);
        character.scheduler.cancel(TaskSlot::Normal);
        let end = path.last().copied();
        character.set_path(path);
        self.send_map_flag(end);
        Ok(())
    }

    fn approach_loc(&mut self, id: u16, x: u16, y: u16, run: bool) -> Result<(), WorldError> {
        let who = self.who;
        let (map, character) = split(self.world, who)?;

        let tile = Tile::new(character.pos.floor, x as i32, y as i32);
        let found = map.zone_at(tile).and_then(|zone| map.get(zone)).and_then(|zone| zone.find_loc(id, tile));
        let Some(loc) = found else {
            warn!("{} clicked loc {} at {} but it is not there", who, id, tile);
            return Ok(());
        };
        let template = self
            .templates
            .loc(loc.id)
            .ok_or(WorldError::UnknownTemplate { kind: "loc", id: loc.id })?;
        let (width, length) = loc.size(template);
        let destination = DestinationRect::new(loc.pos, width, length, loc.access_block(template));
        let path = self.pathfinder.find_path(character.pos, &destination, character.size as i32, true, map);

        character.set_run_mode(run);
        let end = path.last().copied();
        character.set_path(path);
        character.scheduler.start(
            TaskSlot::Normal,
            Task::new(Wait::PathComplete, TaskState::AwaitArrival { destination }),
        );
        self.send_map_flag(end);
        Ok(())
    }

    /// Point the player's minimap flag at the end of their new path.
    fn send_map_flag(&mut self, end: Option<Tile>) {
        let CharacterRef::Player(index) = self.who else {
            return;
        };
        let Some(player) = self.world.players.get_mut(index) else {
            return;
        };
        let flag = match end {
            Some(tile) => player.scene.map_flag(tile),
            None => player.scene.map_flag(Tile::new(0, -1, -1)),
        };
        if let Some(flag) = flag {
            player.write(flag);
        }
    }
}

impl Executor for CharacterTurn<'_> {
    fn who(&self) -> CharacterRef {
        self.who
    }

    fn drain_events(&mut self) -> Result<usize, WorldError> {
        let mut handled = 0;
        while let Some(event) = self.character_mut()?.scheduler.pop_event() {
            self.handle(event)?;
            handled += 1;
        }
        Ok(handled)
    }

    fn resume_tasks(&mut self) -> Result<bool, WorldError> {
        let now = self.now;
        let (_, character) = split(self.world, self.who)?;
        let mut progressed = false;
        for slot in character.scheduler.active_slots() {
            let Some(mut task) = character.scheduler.take(slot) else {
                continue;
            };
            match task.resume(character, now) {
                Resume::Pending => character.scheduler.restore(slot, task),
                Resume::Advanced => {
                    progressed = true;
                    character.scheduler.restore(slot, task);
                }
                Resume::Finished => progressed = true,
            }
        }
        Ok(progressed)
    }

    fn has_events(&self) -> bool {
        self.world
            .character(self.who)
            .is_some_and(|character| character.scheduler.has_events())
    }
}
