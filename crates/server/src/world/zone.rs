//! Zones and the zone arena.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use protocol::packets::ZoneUpdate;

use crate::entity::{Loc, Obj};

use super::collision::{CollisionFlags, ZoneCollision};
use super::tile::{Tile, ZoneCoord};

/// Stable handle to a zone in the [`ZoneMap`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ZoneId(pub u32);

/// An 8x8 tile region on one floor.
#[derive(Debug)]
pub struct Zone {
    pub coord: ZoneCoord,
    pub collision: ZoneCollision,
    /// Locs from the map data, by map key.
    pub static_locs: BTreeMap<u8, Loc>,
    /// Locs added or changed at runtime, by map key.
    pub added_locs: BTreeMap<u8, Loc>,
    /// Static locs removed at runtime, by map key.
    pub deleted_locs: BTreeMap<u8, Loc>,
    /// Ground objects by zone-local tile offset.
    pub objs: BTreeMap<(u8, u8), Vec<Obj>>,
    /// Resident npc indices.
    pub npcs: Vec<u16>,
    /// Resident player indices.
    pub players: Vec<u16>,
    /// Players whose scene currently covers this zone.
    pub subscribers: BTreeSet<u16>,
}

impl Zone {
    pub fn new(coord: ZoneCoord) -> Self {
        Self {
            coord,
            collision: ZoneCollision::default(),
            static_locs: BTreeMap::new(),
            added_locs: BTreeMap::new(),
            deleted_locs: BTreeMap::new(),
            objs: BTreeMap::new(),
            npcs: Vec::new(),
            players: Vec::new(),
            subscribers: BTreeSet::new(),
        }
    }

    /// The loc currently occupying `key`, if any.
    pub fn loc(&self, key: u8) -> Option<&Loc> {
        self.added_locs.get(&key).or_else(|| {
            if self.deleted_locs.contains_key(&key) {
                None
            } else {
                self.static_locs.get(&key)
            }
        })
    }

    /// Find a visible loc by id on a tile.
    pub fn find_loc(&self, id: u16, tile: Tile) -> Option<Loc> {
        let (x, y) = tile.zone_local();
        (0..4u8)
            .filter_map(|slot| self.loc(crate::entity::map_key(x, y, slot)))
            .find(|loc| loc.id == id)
            .copied()
    }

    /// Everything a client needs to rebuild this zone from scratch.
    pub fn snapshot(&self) -> Vec<ZoneUpdate> {
        let mut updates = Vec::new();
        for (&(x, y), objs) in &self.objs {
            updates.extend(objs.iter().map(|obj| ZoneUpdate::ObjAdd {
                id: obj.id,
                quantity: obj.quantity,
                x,
                y,
            }));
        }
        updates.extend(self.added_locs.values().map(Loc::add_change_update));
        updates.extend(self.deleted_locs.values().map(Loc::delete_update));
        updates
    }

    pub fn add_npc(&mut self, index: u16) {
        if !self.npcs.contains(&index) {
            self.npcs.push(index);
        }
    }

    pub fn remove_npc(&mut self, index: u16) {
        if let Some(pos) = self.npcs.iter().position(|&i| i == index) {
            self.npcs.swap_remove(pos);
        }
    }

    pub fn add_player(&mut self, index: u16) {
        if !self.players.contains(&index) {
            self.players.push(index);
        }
    }

    pub fn remove_player(&mut self, index: u16) {
        if let Some(pos) = self.players.iter().position(|&i| i == index) {
            self.players.swap_remove(pos);
        }
    }
}

/// All loaded zones plus the collision query surface.
#[derive(Debug, Default)]
pub struct ZoneMap {
    zones: Vec<Zone>,
    index: HashMap<ZoneCoord, ZoneId>,
}

impl ZoneMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the zone at `coord` if it does not exist yet.
    pub fn load_zone(&mut self, coord: ZoneCoord) -> ZoneId {
        if let Some(&id) = self.index.get(&coord) {
            return id;
        }
        let id = ZoneId(self.zones.len() as u32);
        self.zones.push(Zone::new(coord));
        self.index.insert(coord, id);
        id
    }

    /// Load every zone in an inclusive rectangle of zone coordinates.
    pub fn load_area(&mut self, floor: u8, from: (i32, i32), to: (i32, i32)) {
        for x in from.0..=to.0 {
            for y in from.1..=to.1 {
                self.load_zone(ZoneCoord::new(floor, x, y));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    #[inline]
    pub fn zone_id(&self, coord: ZoneCoord) -> Option<ZoneId> {
        self.index.get(&coord).copied()
    }

    /// The zone containing `tile`.
    #[inline]
    pub fn zone_at(&self, tile: Tile) -> Option<ZoneId> {
        self.zone_id(tile.zone())
    }

    #[inline]
    pub fn get(&self, id: ZoneId) -> Option<&Zone> {
        self.zones.get(id.0 as usize)
    }

    #[inline]
    pub fn get_mut(&mut self, id: ZoneId) -> Option<&mut Zone> {
        self.zones.get_mut(id.0 as usize)
    }

    pub fn zone(&self, coord: ZoneCoord) -> Option<&Zone> {
        self.zone_id(coord).and_then(|id| self.get(id))
    }

    pub fn zone_mut(&mut self, coord: ZoneCoord) -> Option<&mut Zone> {
        let id = self.zone_id(coord)?;
        self.get_mut(id)
    }

    pub fn zone_mut_at(&mut self, tile: Tile) -> Option<&mut Zone> {
        let id = self.zone_at(tile)?;
        self.get_mut(id)
    }

    /// Collision flags for a tile. Tiles outside the loaded world are
    /// [`CollisionFlags::UNLOADED`].
    #[inline]
    pub fn collision_flags(&self, floor: u8, x: i32, y: i32) -> CollisionFlags {
        let tile = Tile::new(floor, x, y);
        match self.zone_at(tile).and_then(|id| self.get(id)) {
            Some(zone) => {
                let (lx, ly) = tile.zone_local();
                zone.collision.get(lx, ly)
            }
            None => CollisionFlags::UNLOADED,
        }
    }

    /// Set flags on a loaded tile. Returns false when the tile is unloaded.
    pub fn add_collision(&mut self, tile: Tile, flags: CollisionFlags) -> bool {
        let (lx, ly) = tile.zone_local();
        match self.zone_mut_at(tile) {
            Some(zone) => {
                zone.collision.add(lx, ly, flags);
                true
            }
            None => false,
        }
    }

    /// Clear flags on a loaded tile. Returns false when the tile is unloaded.
    pub fn remove_collision(&mut self, tile: Tile, flags: CollisionFlags) -> bool {
        let (lx, ly) = tile.zone_local();
        match self.zone_mut_at(tile) {
            Some(zone) => {
                zone.collision.remove(lx, ly, flags);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outside_world_is_unloaded() {
        let mut map = ZoneMap::new();
        map.load_zone(ZoneCoord::new(0, 10, 10));
        assert_eq!(map.collision_flags(0, 80, 80), CollisionFlags::empty());
        assert_eq!(map.collision_flags(0, 88, 80), CollisionFlags::UNLOADED);
        assert_eq!(map.collision_flags(1, 80, 80), CollisionFlags::UNLOADED);
        assert!(map.zone_at(Tile::new(0, 79, 80)).is_none());
    }

    #[test]
    fn test_load_zone_is_idempotent() {
        let mut map = ZoneMap::new();
        let a = map.load_zone(ZoneCoord::new(0, 1, 1));
        let b = map.load_zone(ZoneCoord::new(0, 1, 1));
        assert_eq!(a, b);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_collision_lands_in_owning_zone() {
        let mut map = ZoneMap::new();
        map.load_area(0, (0, 0), (1, 1));
        assert!(map.add_collision(Tile::new(0, 9, 3), CollisionFlags::OBJECT));
        assert!(!map.add_collision(Tile::new(0, 16, 3), CollisionFlags::OBJECT));
        assert_eq!(map.collision_flags(0, 9, 3), CollisionFlags::OBJECT);
        assert_eq!(map.collision_flags(0, 1, 3), CollisionFlags::empty());
    }

    #[test]
    fn test_snapshot_lists_runtime_changes_only() {
        let mut zone = Zone::new(ZoneCoord::new(0, 0, 0));
        let stat = Loc::new(5, 10, 0, Tile::new(0, 2, 2));
        zone.static_locs.insert(stat.map_key(), stat);
        zone.deleted_locs.insert(stat.map_key(), stat);
        let added = Loc::new(6, 22, 1, Tile::new(0, 3, 4));
        zone.added_locs.insert(added.map_key(), added);
        zone.objs.insert((1, 1), vec![Obj::new(995, 10)]);
        assert_eq!(
            zone.snapshot(),
            vec![
                ZoneUpdate::ObjAdd { id: 995, quantity: 10, x: 1, y: 1 },
                ZoneUpdate::LocAddChange { id: 6, shape: 22, orientation: 1, x: 3, y: 4 },
                ZoneUpdate::LocDel { shape: 10, orientation: 0, x: 2, y: 2 },
            ]
        );
    }

    #[test]
    fn test_deleted_static_loc_is_hidden() {
        let mut zone = Zone::new(ZoneCoord::new(0, 0, 0));
        let loc = Loc::new(5, 10, 0, Tile::new(0, 2, 2));
        zone.static_locs.insert(loc.map_key(), loc);
        assert_eq!(zone.find_loc(5, Tile::new(0, 2, 2)), Some(loc));
        zone.deleted_locs.insert(loc.map_key(), loc);
        assert_eq!(zone.find_loc(5, Tile::new(0, 2, 2)), None);
    }
}
