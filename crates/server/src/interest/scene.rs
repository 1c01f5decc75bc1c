//! Per-player zone window.
//!
//! A player's client holds a 13x13 window of zones around a middle zone.
//! Changes to a zone are queued per window cell while the tick runs and sent
//! in one batch by [`SceneManager::synchronize`]. When the player drifts more
//! than [`REBUILD_DISTANCE`] zones from the middle, the window is recentred:
//! cells present in both windows keep their queues, cells new to the client
//! get a full resend of the zone's runtime content.

use protocol::packets::{
    build_rebuild_normal, build_set_map_flag, build_update_zone_full_follows,
    build_update_zone_partial_enclosed, build_update_zone_partial_follows, ZoneUpdate,
};
use protocol::{GamePacket, INTEREST_RADIUS_ZONES, VIEWPORT_RADIUS, VIEWPORT_SIZE, ZONE_SIZE};
use tracing::debug;

use crate::error::WorldError;
use crate::template::RegionKeys;
use crate::world::{Tile, ZoneCoord, ZoneMap};

/// Zones the player may drift from the middle before the window is rebuilt.
pub const REBUILD_DISTANCE: i32 = VIEWPORT_RADIUS - INTEREST_RADIUS_ZONES;

const CELLS: usize = (VIEWPORT_SIZE * VIEWPORT_SIZE) as usize;
/// Window edge in tiles.
const WINDOW_TILES: i32 = VIEWPORT_SIZE * ZONE_SIZE;

#[derive(Debug)]
pub struct SceneManager {
    middle: Option<ZoneCoord>,
    queues: Vec<Vec<ZoneUpdate>>,
}

impl Default for SceneManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Window cell for `coord`, if the window around `middle` covers it.
fn cell_of(middle: ZoneCoord, coord: ZoneCoord) -> Option<usize> {
    if coord.floor != middle.floor {
        return None;
    }
    let cx = coord.x - middle.x + VIEWPORT_RADIUS;
    let cy = coord.y - middle.y + VIEWPORT_RADIUS;
    if (0..VIEWPORT_SIZE).contains(&cx) && (0..VIEWPORT_SIZE).contains(&cy) {
        Some((cx * VIEWPORT_SIZE + cy) as usize)
    } else {
        None
    }
}

/// Every `(cell, zone)` of the window around `middle`.
fn window(middle: ZoneCoord) -> impl Iterator<Item = (usize, ZoneCoord)> {
    (0..VIEWPORT_SIZE).flat_map(move |cx| {
        (0..VIEWPORT_SIZE).map(move |cy| {
            (
                (cx * VIEWPORT_SIZE + cy) as usize,
                middle.offset(cx - VIEWPORT_RADIUS, cy - VIEWPORT_RADIUS),
            )
        })
    })
}

/// Region keys for every mapsquare the window around `middle` touches,
/// mapsquare x outer, y inner.
fn region_keys(middle: ZoneCoord, regions: &RegionKeys) -> Result<Vec<[i32; 4]>, WorldError> {
    let min_x = ZoneCoord::mapsquare(middle.x - VIEWPORT_RADIUS);
    let max_x = ZoneCoord::mapsquare(middle.x + VIEWPORT_RADIUS);
    let min_y = ZoneCoord::mapsquare(middle.y - VIEWPORT_RADIUS);
    let max_y = ZoneCoord::mapsquare(middle.y + VIEWPORT_RADIUS);
    let mut keys = Vec::with_capacity(((max_x - min_x + 1) * (max_y - min_y + 1)) as usize);
    for x in min_x..=max_x {
        for y in min_y..=max_y {
            keys.push(regions.get(x, y)?);
        }
    }
    Ok(keys)
}

impl SceneManager {
    pub fn new() -> Self {
        Self {
            middle: None,
            queues: vec![Vec::new(); CELLS],
        }
    }

    pub fn middle(&self) -> Option<ZoneCoord> {
        self.middle
    }

    /// South-west zone of the window.
    pub fn origin(&self) -> Option<ZoneCoord> {
        self.middle
            .map(|middle| middle.offset(-VIEWPORT_RADIUS, -VIEWPORT_RADIUS))
    }

    pub fn contains(&self, coord: ZoneCoord) -> bool {
        self.middle.and_then(|middle| cell_of(middle, coord)).is_some()
    }

    /// Updates waiting for `coord` this tick.
    pub fn queued(&self, coord: ZoneCoord) -> &[ZoneUpdate] {
        match self.middle.and_then(|middle| cell_of(middle, coord)) {
            Some(cell) => &self.queues[cell],
            None => &[],
        }
    }

    /// Queue a change to `coord`. Ignored when the window does not cover it.
    pub fn queue(&mut self, coord: ZoneCoord, update: ZoneUpdate) {
        if let Some(cell) = self.middle.and_then(|middle| cell_of(middle, coord)) {
            self.queues[cell].push(update);
        }
    }

    pub fn needs_rebuild(&self, current: ZoneCoord) -> bool {
        match self.middle {
            None => true,
            Some(middle) => {
                middle.floor != current.floor || middle.chebyshev(current) > REBUILD_DISTANCE
            }
        }
    }

    /// Rebuild around `current` if the player has drifted too far.
    pub fn check_reload(
        &mut self,
        current: ZoneCoord,
        map: &mut ZoneMap,
        index: u16,
        regions: &RegionKeys,
        out: &mut Vec<GamePacket>,
    ) -> Result<bool, WorldError> {
        if !self.needs_rebuild(current) {
            return Ok(false);
        }
        self.rebuild(current, map, index, regions, out)?;
        Ok(true)
    }

    /// Recentre the window on `current`, moving the subscriptions of player
    /// `index` along with it. Also used for the initial window at login.
    pub fn rebuild(
        &mut self,
        current: ZoneCoord,
        map: &mut ZoneMap,
        index: u16,
        regions: &RegionKeys,
        out: &mut Vec<GamePacket>,
    ) -> Result<(), WorldError> {
        // Keys first so a missing one leaves the old window intact.
        let keys = region_keys(current, regions)?;

        let old_middle = self.middle.take();
        let mut old_queues = std::mem::replace(&mut self.queues, vec![Vec::new(); CELLS]);
        if let Some(old) = old_middle {
            for (_, coord) in window(old) {
                if let Some(zone) = map.zone_mut(coord) {
                    zone.subscribers.remove(&index);
                }
            }
        }

        self.middle = Some(current);
        out.push(build_rebuild_normal(current.x as u16, current.y as u16, &keys));

        let mut carried = 0;
        for (cell, coord) in window(current) {
            let old_cell = old_middle.and_then(|old| cell_of(old, coord));
            if let Some(old_cell) = old_cell {
                self.queues[cell] = std::mem::take(&mut old_queues[old_cell]);
                carried += 1;
            }
            let Some(zone) = map.zone_mut(coord) else {
                continue;
            };
            zone.subscribers.insert(index);
            if old_cell.is_none() {
                self.queues[cell] = zone.snapshot();
            }
        }
        debug!(
            "Rebuilt scene of player #{} around {} ({} cells carried)",
            index, current, carried
        );
        Ok(())
    }

    /// Emit this tick's zone updates.
    pub fn synchronize(
        &mut self,
        current: ZoneCoord,
        map: &mut ZoneMap,
        index: u16,
        regions: &RegionKeys,
        out: &mut Vec<GamePacket>,
    ) -> Result<(), WorldError> {
        self.check_reload(current, map, index, regions, out)?;
        let (Some(middle), Some(origin)) = (self.middle, self.origin()) else {
            return Ok(());
        };
        for (cell, coord) in window(middle) {
            let queue = &self.queues[cell];
            if queue.is_empty() {
                continue;
            }
            let x = ((coord.x - origin.x) * ZONE_SIZE) as u8;
            let y = ((coord.y - origin.y) * ZONE_SIZE) as u8;
            if let [update] = queue.as_slice() {
                out.push(build_update_zone_partial_follows(x, y));
                out.push(update.to_packet());
            } else {
                out.push(build_update_zone_partial_enclosed(x, y, queue));
            }
        }
        Ok(())
    }

    /// Drop this tick's queues.
    pub fn post_process(&mut self) {
        for queue in &mut self.queues {
            queue.clear();
        }
    }

    /// Tell the client to forget every zone in the window.
    pub fn clear(&self, out: &mut Vec<GamePacket>) {
        let (Some(middle), Some(origin)) = (self.middle, self.origin()) else {
            return;
        };
        for (_, coord) in window(middle) {
            let x = ((coord.x - origin.x) * ZONE_SIZE) as u8;
            let y = ((coord.y - origin.y) * ZONE_SIZE) as u8;
            out.push(build_update_zone_full_follows(x, y));
        }
    }

    /// Drop every subscription held by player `index`.
    pub fn unsubscribe_all(&mut self, map: &mut ZoneMap, index: u16) {
        if let Some(middle) = self.middle.take() {
            for (_, coord) in window(middle) {
                if let Some(zone) = map.zone_mut(coord) {
                    zone.subscribers.remove(&index);
                }
            }
        }
        self.post_process();
    }

    /// Minimap flag at `tile`; cleared when the tile is outside the window.
    pub fn map_flag(&self, tile: Tile) -> Option<GamePacket> {
        let base = self.origin()?.base_tile();
        let (dx, dy) = (tile.x - base.x, tile.y - base.y);
        if (0..WINDOW_TILES).contains(&dx) && (0..WINDOW_TILES).contains(&dy) {
            Some(build_set_map_flag(dx as u8, dy as u8))
        } else {
            Some(build_set_map_flag(0xFF, 0xFF))
        }
    }
}
