//! The shared world: zones, collision and every character.
//!
//! Content changes (collision, locs, ground objects, projectiles) go through
//! [`World`] so that each change is queued for every player whose scene
//! covers the affected zone.

mod arena;
mod collision;
mod tile;
mod zone;

pub use arena::CharacterArena;
pub use collision::{CollisionFlags, ZoneCollision};
pub use tile::{Tile, ZoneCoord};
pub use zone::{Zone, ZoneId, ZoneMap};

use protocol::packets::{ProjectileLaunch, ZoneUpdate};
use tracing::{debug, info};

use crate::entity::{Actor, Character, Loc, Npc, Obj, Player, Projectile};
use crate::error::{CharacterRef, WorldError};
use crate::task::Event;
use crate::template::{LocTemplate, RegionKeys, TemplateRepository};

/// Npc indices available per world.
pub const NPC_CAPACITY: u16 = 8192;
/// Player indices available per world.
pub const PLAYER_CAPACITY: u16 = 2048;

#[derive(Debug)]
pub struct World {
    pub map: ZoneMap,
    pub npcs: CharacterArena<Npc>,
    pub players: CharacterArena<Player>,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    pub fn new() -> Self {
        Self::with_capacity(NPC_CAPACITY, PLAYER_CAPACITY)
    }

    pub fn with_capacity(npcs: u16, players: u16) -> Self {
        Self {
            map: ZoneMap::new(),
            npcs: CharacterArena::new(npcs),
            players: CharacterArena::new(players),
        }
    }

    pub fn load_zone(&mut self, coord: ZoneCoord) -> ZoneId {
        self.map.load_zone(coord)
    }

    pub fn load_area(&mut self, floor: u8, from: (i32, i32), to: (i32, i32)) {
        self.map.load_area(floor, from, to);
    }

    #[inline]
    pub fn zone_at(&self, tile: Tile) -> Option<ZoneId> {
        self.map.zone_at(tile)
    }

    #[inline]
    pub fn collision_flags(&self, floor: u8, x: i32, y: i32) -> CollisionFlags {
        self.map.collision_flags(floor, x, y)
    }

    pub fn add_collision(&mut self, tile: Tile, flags: CollisionFlags) -> bool {
        self.map.add_collision(tile, flags)
    }

    pub fn remove_collision(&mut self, tile: Tile, flags: CollisionFlags) -> bool {
        self.map.remove_collision(tile, flags)
    }

    /// A character by reference.
    pub fn character(&self, who: CharacterRef) -> Option<&Character> {
        match who {
            CharacterRef::Npc(index) => self.npcs.get(index).map(Actor::character),
            CharacterRef::Player(index) => self.players.get(index).map(Actor::character),
        }
    }

    pub fn character_mut(&mut self, who: CharacterRef) -> Option<&mut Character> {
        match who {
            CharacterRef::Npc(index) => self.npcs.get_mut(index).map(Actor::character_mut),
            CharacterRef::Player(index) => self.players.get_mut(index).map(Actor::character_mut),
        }
    }

    /// Lock `who` onto `target`, facing it now. `None` releases the lock.
    ///
    /// Entry point for gameplay rules such as combat and dialogue.
    pub fn turn_to_lock(&mut self, who: CharacterRef, target: Option<CharacterRef>) -> Result<(), WorldError> {
        let facing = match target {
            Some(target) => {
                let other = self.character(target).ok_or(WorldError::UnknownCharacter(target))?;
                Some((target, other.pos, other.size))
            }
            None => None,
        };
        let character = self.character_mut(who).ok_or(WorldError::UnknownCharacter(who))?;
        match facing {
            Some((target, pos, size)) => character.turn_to_lock(target, pos, size),
            None => character.release_lock(),
        }
        Ok(())
    }

    /// Queue `update` for every player watching the zone containing `tile`.
    fn publish(&mut self, tile: Tile, update: ZoneUpdate) {
        let coord = tile.zone();
        let Some(zone) = self.map.zone(coord) else {
            return;
        };
        for &index in &zone.subscribers {
            if let Some(player) = self.players.get_mut(index) {
                player.scene.queue(coord, update.clone());
            }
        }
    }

    /// Place a loc from map data. Not announced; clients get it with the map.
    pub fn load_static_loc(
        &mut self,
        loc: Loc,
        templates: &dyn TemplateRepository,
    ) -> Result<bool, WorldError> {
        let template = loc_template(templates, loc.id)?;
        let Some(zone) = self.map.zone_mut_at(loc.pos) else {
            return Ok(false);
        };
        zone.static_locs.insert(loc.map_key(), loc);
        apply_footprint(&mut self.map, &loc, template, true);
        Ok(true)
    }

    /// Add or replace the loc in `loc`'s slot.
    pub fn add_loc(&mut self, loc: Loc, templates: &dyn TemplateRepository) -> Result<bool, WorldError> {
        let template = loc_template(templates, loc.id)?;
        let key = loc.map_key();
        let Some(zone) = self.map.zone_mut_at(loc.pos) else {
            return Ok(false);
        };
        let previous = match zone.loc(key).copied() {
            Some(previous) => Some((previous, loc_template(templates, previous.id)?)),
            None => None,
        };
        zone.added_locs.insert(key, loc);
        zone.deleted_locs.remove(&key);
        if let Some((previous, previous_template)) = previous {
            apply_footprint(&mut self.map, &previous, previous_template, false);
        }
        apply_footprint(&mut self.map, &loc, template, true);
        self.publish(loc.pos, loc.add_change_update());
        Ok(true)
    }

    /// Remove the visible loc `loc`. Returns false when it is not there.
    pub fn remove_loc(&mut self, loc: Loc, templates: &dyn TemplateRepository) -> Result<bool, WorldError> {
        let key = loc.map_key();
        let Some(zone) = self.map.zone_mut_at(loc.pos) else {
            return Ok(false);
        };
        let Some(current) = zone.loc(key).copied().filter(|current| current.id == loc.id) else {
            return Ok(false);
        };
        let template = loc_template(templates, current.id)?;
        zone.added_locs.remove(&key);
        if let Some(original) = zone.static_locs.get(&key).copied() {
            zone.deleted_locs.insert(key, original);
        }
        apply_footprint(&mut self.map, &current, template, false);
        self.publish(current.pos, current.delete_update());
        Ok(true)
    }

    pub fn add_obj(&mut self, tile: Tile, obj: Obj) -> bool {
        let (x, y) = tile.zone_local();
        let Some(zone) = self.map.zone_mut_at(tile) else {
            return false;
        };
        zone.objs.entry((x, y)).or_default().push(obj);
        self.publish(
            tile,
            ZoneUpdate::ObjAdd {
                id: obj.id,
                quantity: obj.quantity,
                x,
                y,
            },
        );
        true
    }

    /// Remove the first stack of `id` on `tile`.
    pub fn remove_obj(&mut self, tile: Tile, id: u16) -> Option<Obj> {
        let (x, y) = tile.zone_local();
        let zone = self.map.zone_mut_at(tile)?;
        let stacks = zone.objs.get_mut(&(x, y))?;
        let position = stacks.iter().position(|obj| obj.id == id)?;
        let obj = stacks.remove(position);
        if stacks.is_empty() {
            zone.objs.remove(&(x, y));
        }
        self.publish(tile, ZoneUpdate::ObjDel { id, x, y });
        Some(obj)
    }

    /// Announce a projectile to everyone watching its start zone.
    ///
    /// Returns `Ok(false)` when the start tile is not loaded. The target must
    /// lie within a signed byte of the start on both axes.
    pub fn launch_projectile(&mut self, projectile: Projectile) -> Result<bool, WorldError> {
        if self.map.zone_at(projectile.start).is_none() {
            return Ok(false);
        }
        let out_of_range = || WorldError::ProjectileOutOfRange {
            from: projectile.start,
            to: projectile.target_pos,
        };
        let dx = i8::try_from(projectile.target_pos.x - projectile.start.x).map_err(|_| out_of_range())?;
        let dy = i8::try_from(projectile.target_pos.y - projectile.start.y).map_err(|_| out_of_range())?;
        let (x, y) = projectile.start.zone_local();
        let launch = ProjectileLaunch {
            id: projectile.id,
            start_height: projectile.start_height,
            end_height: projectile.end_height,
            target: projectile.target_code(),
            angle: projectile.angle,
            steepness: projectile.steepness,
            delay: projectile.delay,
            lifetime: projectile.lifetime,
            x,
            y,
            dx,
            dy,
        };
        self.publish(projectile.start, ZoneUpdate::Projectile(launch));
        Ok(true)
    }

    pub fn spawn_npc(
        &mut self,
        template_id: u16,
        pos: Tile,
        templates: &dyn TemplateRepository,
    ) -> Result<u16, WorldError> {
        let template = templates.npc(template_id).ok_or(WorldError::UnknownTemplate {
            kind: "npc",
            id: template_id,
        })?;
        let zone = self.map.zone_at(pos).ok_or(WorldError::UnloadedTile(pos))?;
        let size = template.size;
        let index = self
            .npcs
            .insert_with(|index| Npc::new(index, template_id, pos, zone, size))?;
        if let Some(zone) = self.map.get_mut(zone) {
            Npc::enter(zone, index);
        }
        debug!("Spawned npc #{} ({}) at {}", index, template.name, pos);
        Ok(index)
    }

    pub fn remove_npc(&mut self, index: u16) -> Option<Npc> {
        let npc = self.npcs.remove(index)?;
        if let Some(zone) = self.map.get_mut(npc.character.zone) {
            Npc::leave(zone, index);
        }
        Some(npc)
    }

    /// Place a newly logged in player and build their first scene.
    pub fn add_player(
        &mut self,
        username: &str,
        pos: Tile,
        regions: &RegionKeys,
    ) -> Result<u16, WorldError> {
        let zone = self.map.zone_at(pos).ok_or(WorldError::UnloadedTile(pos))?;
        let index = self
            .players
            .insert_with(|index| Player::new(index, username, pos, zone))?;
        if let Some(zone) = self.map.get_mut(zone) {
            Player::enter(zone, index);
        }
        let player = self
            .players
            .get_mut(index)
            .ok_or(WorldError::UnknownCharacter(CharacterRef::Player(index)))?;
        if let Err(e) = player
            .scene
            .rebuild(pos.zone(), &mut self.map, index, regions, &mut player.outbound)
        {
            self.remove_player(index);
            return Err(e);
        }
        info!("Player {} logged in as #{} at {}", username, index, pos);
        Ok(index)
    }

    pub fn remove_player(&mut self, index: u16) -> Option<Player> {
        let mut player = self.players.remove(index)?;
        if let Some(zone) = self.map.get_mut(player.character.zone) {
            Player::leave(zone, index);
        }
        player.scene.unsubscribe_all(&mut self.map, index);
        Some(player)
    }

    /// Advance every character one step. Characters whose move fails are
    /// left where they were and reported.
    pub fn process_movement(&mut self) -> Vec<(CharacterRef, WorldError)> {
        let mut errors = Vec::new();
        for index in self.npcs.indices() {
            if let Err(e) = step(&mut self.map, &mut self.npcs, index) {
                errors.push((CharacterRef::Npc(index), e));
            }
        }
        for index in self.players.indices() {
            if let Err(e) = step(&mut self.map, &mut self.players, index) {
                errors.push((CharacterRef::Player(index), e));
            }
        }
        errors
    }

    /// End-of-tick cleanup for every character and scene.
    pub fn post_process(&mut self) {
        for (_, npc) in self.npcs.iter_mut() {
            npc.character.post_process();
        }
        for (_, player) in self.players.iter_mut() {
            player.character.post_process();
            player.scene.post_process();
        }
        self.npcs.release_pending();
        self.players.release_pending();
    }
}

fn loc_template(templates: &dyn TemplateRepository, id: u16) -> Result<&LocTemplate, WorldError> {
    templates
        .loc(id)
        .ok_or(WorldError::UnknownTemplate { kind: "loc", id })
}

/// Set or clear the blocking footprint of a solid loc.
fn apply_footprint(map: &mut ZoneMap, loc: &Loc, template: &LocTemplate, add: bool) {
    if !template.solid {
        return;
    }
    let (width, length) = loc.size(template);
    for dx in 0..width {
        for dy in 0..length {
            let tile = loc.pos.offset(dx, dy);
            if add {
                map.add_collision(tile, CollisionFlags::OBJECT);
            } else {
                map.remove_collision(tile, CollisionFlags::OBJECT);
            }
        }
    }
}

/// Advance one character and keep its zone membership in step with its
/// position.
fn step<T: Actor>(map: &mut ZoneMap, arena: &mut CharacterArena<T>, index: u16) -> Result<bool, WorldError> {
    let Some(actor) = arena.get_mut(index) else {
        return Ok(false);
    };
    let who = actor.reference();
    let character = actor.character_mut();
    let before = character.snapshot_step();
    if !character.advance() {
        return Ok(false);
    }
    let Some(zone) = map.zone_at(character.pos) else {
        let pos = character.pos;
        character.revert_step(before);
        return Err(WorldError::CharacterOutsideZone { who, pos });
    };
    if zone != character.zone {
        if let Some(old) = map.get_mut(character.zone) {
            T::leave(old, index);
        }
        if let Some(new) = map.get_mut(zone) {
            T::enter(new, index);
        }
        character.zone = zone;
    }
    character.scheduler.raise(Event::Moved);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::UpdateFlags;
    use crate::template::{NpcTemplate, StaticTemplates};

    fn templates() -> StaticTemplates {
        let mut templates = StaticTemplates::new();
        templates.add_npc(NpcTemplate {
            id: 1,
            name: "Man".into(),
            size: 1,
        });
        templates.add_loc(LocTemplate {
            id: 1276,
            name: "Tree".into(),
            width: 2,
            length: 2,
            solid: true,
            access_block: 0,
        });
        templates
    }

    fn world() -> World {
        let mut world = World::new();
        world.load_area(0, (0, 0), (20, 20));
        world
    }

    fn watching_player(world: &mut World) -> u16 {
        world
            .add_player("watcher", Tile::new(0, 80, 80), &RegionKeys::new(true))
            .unwrap()
    }

    #[test]
    fn test_zone_transfer_on_move() {
        let mut world = world();
        let index = world.spawn_npc(1, Tile::new(0, 7, 4), &templates()).unwrap();
        let start_zone = world.zone_at(Tile::new(0, 7, 4)).unwrap();
        world.npcs.get_mut(index).unwrap().character.set_path([Tile::new(0, 8, 4)]);

        assert!(world.process_movement().is_empty());
        let npc = &world.npcs.get(index).unwrap().character;
        let new_zone = world.zone_at(Tile::new(0, 8, 4)).unwrap();
        assert_eq!(npc.zone, new_zone);
        assert!(world.map.get(new_zone).unwrap().npcs.contains(&index));
        assert!(!world.map.get(start_zone).unwrap().npcs.contains(&index));
        assert!(npc.scheduler.has_events());
    }

    #[test]
    fn test_move_outside_world_is_reverted() {
        let mut world = world();
        let index = world.spawn_npc(1, Tile::new(0, 5, 5), &templates()).unwrap();
        world.npcs.get_mut(index).unwrap().character.teleport(Tile::new(0, 500, 500));

        let errors = world.process_movement();
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            errors[0].1,
            WorldError::CharacterOutsideZone { who: CharacterRef::Npc(_), .. }
        ));
        let npc = &world.npcs.get(index).unwrap().character;
        assert_eq!(npc.pos, Tile::new(0, 5, 5));
        assert!(npc.teleport_target.is_none());
    }

    #[test]
    fn test_spawn_outside_world_fails() {
        let mut world = world();
        assert!(matches!(
            world.spawn_npc(1, Tile::new(0, 900, 900), &templates()),
            Err(WorldError::UnloadedTile(_))
        ));
        assert!(world.npcs.is_empty());
    }

    #[test]
    fn test_solid_loc_blocks_footprint_until_removed() {
        let mut world = world();
        let tree = Loc::new(1276, 10, 0, Tile::new(0, 30, 30));
        assert!(world.add_loc(tree, &templates()).unwrap());
        assert!(world.collision_flags(0, 31, 31).contains(CollisionFlags::OBJECT));
        assert!(world.remove_loc(tree, &templates()).unwrap());
        assert!(world.collision_flags(0, 31, 31).is_empty());
        assert!(!world.remove_loc(tree, &templates()).unwrap());
    }

    #[test]
    fn test_removing_static_loc_marks_it_deleted() {
        let mut world = world();
        let tree = Loc::new(1276, 10, 0, Tile::new(0, 30, 30));
        world.load_static_loc(tree, &templates()).unwrap();
        assert!(world.remove_loc(tree, &templates()).unwrap());
        let zone = world.map.zone(tree.pos.zone()).unwrap();
        assert_eq!(zone.deleted_locs.get(&tree.map_key()), Some(&tree));
        assert!(zone.loc(tree.map_key()).is_none());
    }

    #[test]
    fn test_changes_reach_subscribers() {
        let mut world = world();
        let index = watching_player(&mut world);
        let tile = Tile::new(0, 82, 83);
        assert!(world.add_obj(tile, Obj::new(995, 5)));
        assert_eq!(world.remove_obj(tile, 995), Some(Obj::new(995, 5)));
        assert_eq!(world.remove_obj(tile, 995), None);
        let queued = world.players.get(index).unwrap().scene.queued(tile.zone());
        assert_eq!(
            queued,
            &[
                ZoneUpdate::ObjAdd { id: 995, quantity: 5, x: 2, y: 3 },
                ZoneUpdate::ObjDel { id: 995, x: 2, y: 3 },
            ]
        );
    }

    fn projectile(start: Tile, target: CharacterRef, target_pos: Tile) -> Projectile {
        Projectile {
            id: 10,
            start,
            target,
            target_pos,
            start_height: 40,
            end_height: 36,
            angle: 16,
            steepness: 64,
            delay: 51,
            lifetime: 80,
        }
    }

    #[test]
    fn test_projectile_beyond_a_byte_is_rejected() {
        let mut world = world();
        let index = watching_player(&mut world);
        let start = Tile::new(0, 81, 81);
        let far = start.offset(128, 0);
        let err = world
            .launch_projectile(projectile(start, CharacterRef::Player(index), far))
            .unwrap_err();
        assert!(matches!(err, WorldError::ProjectileOutOfRange { to, .. } if to == far));
        assert!(world.players.get(index).unwrap().scene.queued(start.zone()).is_empty());

        let near = start.offset(-128, 127);
        assert!(world.launch_projectile(projectile(start, CharacterRef::Player(index), near)).unwrap());
    }

    #[test]
    fn test_projectile_target_offsets() {
        let mut world = world();
        let index = watching_player(&mut world);
        let start = Tile::new(0, 81, 81);
        assert!(world.launch_projectile(projectile(start, CharacterRef::Player(index), Tile::new(0, 84, 79))).unwrap());
        let queued = world.players.get(index).unwrap().scene.queued(start.zone());
        let [ZoneUpdate::Projectile(launch)] = queued else {
            panic!("expected one projectile, got {queued:?}");
        };
        assert_eq!(launch.target, index + 32769);
        assert_eq!((launch.dx, launch.dy), (3, -2));
    }

    #[test]
    fn test_turn_to_lock_faces_the_target() {
        let mut world = world();
        let index = watching_player(&mut world);
        let npc = world.spawn_npc(1, Tile::new(0, 85, 80), &templates()).unwrap();
        let who = CharacterRef::Player(index);

        world.turn_to_lock(who, Some(CharacterRef::Npc(npc))).unwrap();
        let c = world.character(who).unwrap();
        assert_eq!(c.interacting, Some(CharacterRef::Npc(npc)));
        assert_eq!(c.orientation, 1536);
        assert!(c.flags.contains(UpdateFlags::ORIENTATION | UpdateFlags::TURN_LOCK));

        let missing = CharacterRef::Npc(npc + 1);
        assert!(matches!(
            world.turn_to_lock(who, Some(missing)),
            Err(WorldError::UnknownCharacter(m)) if m == missing
        ));
        world.turn_to_lock(who, None).unwrap();
        assert!(world.character(who).unwrap().interacting.is_none());
    }

    #[test]
    fn test_removed_player_leaves_zone_and_scene() {
        let mut world = world();
        let index = watching_player(&mut world);
        let zone = world.zone_at(Tile::new(0, 80, 80)).unwrap();
        assert!(world.remove_player(index).is_some());
        assert!(!world.map.get(zone).unwrap().players.contains(&index));
        assert!(world.map.get(zone).unwrap().subscribers.is_empty());
    }
}
