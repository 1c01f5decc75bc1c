//! Which moving entities a player's client currently knows about.

use fixedbitset::FixedBitSet;
use protocol::packets::{AddedEntity, EntityInfo, InfoCategory, LocalUpdate};
use protocol::{INTEREST_RADIUS_ZONES, INTEREST_SIZE};

use crate::entity::{Actor, Character, MovementType};
use crate::world::{CharacterArena, ZoneMap};

/// Most entities a client tracks per list.
pub const MAX_TRACKED: usize = 255;

#[derive(Debug)]
pub struct VisibilityTracker {
    category: InfoCategory,
    /// Known indices in the order the client lists them.
    known: Vec<u16>,
    known_set: FixedBitSet,
}

impl VisibilityTracker {
    pub fn new(category: InfoCategory) -> Self {
        Self {
            category,
            known: Vec::new(),
            known_set: FixedBitSet::new(),
        }
    }

    pub fn category(&self) -> InfoCategory {
        self.category
    }

    pub fn known(&self) -> &[u16] {
        &self.known
    }

    pub fn is_known(&self, index: u16) -> bool {
        self.known_set.contains(index as usize)
    }

    pub fn reset(&mut self) {
        self.known.clear();
        self.known_set.clear();
    }

    /// Build this tick's block for `observer` and update the known list.
    ///
    /// Known entities that vanished, teleported or left the interest radius
    /// are removed. Then up to `max_additions` unknown entities resident in
    /// nearby zones and within the interest radius are added.
    pub fn update<T: Actor>(
        &mut self,
        observer: &Character,
        arena: &CharacterArena<T>,
        map: &ZoneMap,
        max_additions: usize,
    ) -> EntityInfo {
        debug_assert_eq!(self.category, T::CATEGORY);
        let mut info = EntityInfo::new(self.category);
        let mut retained = Vec::with_capacity(self.known.len());

        for &index in &self.known {
            let visible = arena
                .get(index)
                .map(|actor| actor.character())
                .filter(|c| c.movement != MovementType::Teleport)
                .filter(|c| observer.pos.is_interested_in(c.pos));
            let Some(c) = visible else {
                self.known_set.set(index as usize, false);
                info.local.push(LocalUpdate::Remove);
                continue;
            };
            let has_visual = c.flags.has_visual(self.category);
            let update = match c.step_directions() {
                Some((direction, None)) => LocalUpdate::Walk { direction, has_visual },
                Some((first, Some(second))) => LocalUpdate::Run { first, second, has_visual },
                None if has_visual => LocalUpdate::Visual,
                None => LocalUpdate::NoChange,
            };
            if has_visual {
                info.visuals.push(c.visual_updates(self.category));
            }
            info.local.push(update);
            retained.push(index);
        }

        // Players never list themselves.
        let own_index = (self.category == InfoCategory::Player).then_some(observer.index);
        let centre = observer.pos.zone();
        let mut added = 0;
        'zones: for dx in -INTEREST_RADIUS_ZONES..=INTEREST_RADIUS_ZONES {
            for dy in -INTEREST_RADIUS_ZONES..=INTEREST_RADIUS_ZONES {
                let Some(zone) = map.zone(centre.offset(dx, dy)) else {
                    continue;
                };
                for &index in T::residents(zone) {
                    if added >= max_additions || retained.len() >= MAX_TRACKED {
                        break 'zones;
                    }
                    if Some(index) == own_index || self.known_set.contains(index as usize) {
                        continue;
                    }
                    let Some(actor) = arena.get(index) else {
                        continue;
                    };
                    let c = actor.character();
                    if !observer.pos.is_interested_in(c.pos) {
                        continue;
                    }
                    let has_visual = c.flags.has_visual(self.category);
                    info.added.push(AddedEntity {
                        index,
                        orientation: ((c.orientation >> 8) & 0x7) as u8,
                        dx: ((c.pos.x - observer.pos.x) & (INTEREST_SIZE - 1)) as u8,
                        dy: ((c.pos.y - observer.pos.y) & (INTEREST_SIZE - 1)) as u8,
                        teleport: c.movement == MovementType::Teleport,
                        spawn_id: actor.spawn_id(),
                        has_visual,
                    });
                    if has_visual {
                        info.visuals.push(c.visual_updates(self.category));
                    }
                    self.known_set.grow(index as usize + 1);
                    self.known_set.insert(index as usize);
                    retained.push(index);
                    added += 1;
                }
            }
        }

        self.known = retained;
        info
    }
}
