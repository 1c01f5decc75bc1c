//! Game state and main loop.

use crate::config::Config;
use crate::entity::Actor;
use crate::error::{CharacterRef, WorldError};
use crate::interest::VisibilityTracker;
use crate::pathing::BfsPathfinder;
use crate::task::{run_until_quiescent, CharacterTurn, Event, TaskSlot};
use crate::template::{RegionKeys, TemplateRepository};
use crate::world::{World, ZoneCoord};
use futures_util::FutureExt;
use protocol::packets::{ClientPacket, InfoCategory, LoginRequest};
use rand::Rng;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::client::{ConnectionId, FlushError, Inbound, Session};

/// Main game state.
pub struct GameState {
    pub config: Config,
    pub world: World,
    pub templates: Box<dyn TemplateRepository>,
    pub regions: RegionKeys,
    pub tick_count: u64,

    pathfinder: BfsPathfinder,

    // Logged in connections and the player each one controls
    sessions: HashMap<ConnectionId, Session>,
    connections: HashMap<u16, ConnectionId>,

    inbound: mpsc::UnboundedReceiver<Inbound>,

    // Average tick duration in milliseconds (exponential moving average).
    pub update_time_avg: f64,
}

impl GameState {
    pub fn new(
        config: Config,
        templates: Box<dyn TemplateRepository>,
        regions: RegionKeys,
        inbound: mpsc::UnboundedReceiver<Inbound>,
    ) -> Self {
        let mut world = World::new();
        for area in &config.world.areas {
            world.load_area(area.floor, area.from, area.to);
        }
        info!("Loaded {} zones", world.map.len());

        let mut spawned = 0;
        for spawn in &config.npc.spawns {
            match world.spawn_npc(spawn.template, spawn.tile, templates.as_ref()) {
                Ok(_) => spawned += 1,
                Err(e) => warn!("Skipping npc spawn {} at {}: {}", spawn.template, spawn.tile, e),
            }
        }
        info!("Spawned {} npcs", spawned);

        Self {
            config,
            world,
            templates,
            regions,
            tick_count: 0,
            pathfinder: BfsPathfinder::new(),
            sessions: HashMap::new(),
            connections: HashMap::new(),
            inbound,
            update_time_avg: 0.0,
        }
    }

    /// Nothing to simulate for: no one is online or logging in.
    pub fn is_idle(&self) -> bool {
        self.sessions.is_empty() && self.inbound.is_empty()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Run one world tick.
    pub fn tick(&mut self) {
        let tick_start = std::time::Instant::now();
        self.tick_count += 1;

        // Players whose logout was flushed last tick leave before anything else runs.
        self.remove_staged_logouts();

        let inbound_start = std::time::Instant::now();
        self.drain_inbound();
        let inbound_time = inbound_start.elapsed();

        let scheduler_start = std::time::Instant::now();
        self.wander_npcs();
        for index in self.world.npcs.indices() {
            self.run_scheduler(CharacterRef::Npc(index));
        }
        for index in self.world.players.indices() {
            self.run_scheduler(CharacterRef::Player(index));
        }
        let scheduler_time = scheduler_start.elapsed();

        let movement_start = std::time::Instant::now();
        for (who, e) in self.world.process_movement() {
            error!("Movement failed for {}: {}", who, e);
            self.abort(who);
        }
        let movement_time = movement_start.elapsed();

        let sync_start = std::time::Instant::now();
        for index in self.world.players.indices() {
            if let Err(e) = self.synchronize_player(index) {
                error!("Update failed for player #{}: {}", index, e);
                self.abort(CharacterRef::Player(index));
            }
        }
        let sync_time = sync_start.elapsed();

        let flush_start = std::time::Instant::now();
        let flushed = self.flush();
        let flush_time = flush_start.elapsed();

        self.world.post_process();
        let total_time = tick_start.elapsed();

        // Log performance metrics every 400 ticks
        if self.tick_count % 400 == 0 {
            debug!(
                "Tick #{}: {:.2}ms total | inbound={:.2}ms scheduler={:.2}ms move={:.2}ms sync={:.2}ms flush={:.2}ms | {} npcs, {} players, {} bytes out",
                self.tick_count,
                total_time.as_secs_f64() * 1000.0,
                inbound_time.as_secs_f64() * 1000.0,
                scheduler_time.as_secs_f64() * 1000.0,
                movement_time.as_secs_f64() * 1000.0,
                sync_time.as_secs_f64() * 1000.0,
                flush_time.as_secs_f64() * 1000.0,
                self.world.npcs.len(),
                self.world.players.len(),
                flushed,
            );
        }
    }

    fn drain_inbound(&mut self) {
        while let Ok(message) = self.inbound.try_recv() {
            match message {
                Inbound::Login {
                    connection,
                    addr,
                    request,
                    outbound,
                } => self.handle_login(connection, addr, request, outbound),
                Inbound::Packet { connection, packet } => self.handle_packet(connection, packet),
                Inbound::Disconnected { connection } => {
                    let Some(session) = self.sessions.get(&connection) else {
                        continue;
                    };
                    info!("Connection {} from {} closed", connection, session.addr);
                    if let Some(player) = self.world.players.get_mut(session.player) {
                        player.stage_logout();
                    }
                }
            }
        }
    }

    fn handle_login(
        &mut self,
        connection: ConnectionId,
        addr: SocketAddr,
        request: LoginRequest,
        outbound: mpsc::Sender<bytes::Bytes>,
    ) {
        let online = self
            .world
            .players
            .iter()
            .any(|(_, player)| player.username.eq_ignore_ascii_case(&request.username));
        if online {
            warn!("Rejected login from {}: {} is already online", addr, request.username);
            return;
        }
        let spawn = self.config.world.spawn;
        match self.world.add_player(&request.username, spawn, &self.regions) {
            Ok(index) => {
                info!("{} logged in from {} as player #{}", request.username, addr, index);
                self.sessions
                    .insert(connection, Session::new(connection, addr, index, &request, outbound));
                self.connections.insert(index, connection);
            }
            // Dropping `outbound` closes the connection.
            Err(e) => warn!("Rejected login from {} as {}: {}", addr, request.username, e),
        }
    }

    fn handle_packet(&mut self, connection: ConnectionId, packet: ClientPacket) {
        let Some(session) = self.sessions.get(&connection) else {
            return;
        };
        let event = match packet {
            ClientPacket::NoTimeout => return,
            ClientPacket::Walk { x, y, run } => Event::Walk { x, y, run },
            ClientPacket::OpLoc1 { id, x, y, run } => Event::LocClick { id, x, y, run },
            ClientPacket::PublicChat { message } => Event::PublicChat { effects: 0, message },
            ClientPacket::Logout => Event::Logout,
        };
        if let Some(player) = self.world.players.get_mut(session.player) {
            player.character.scheduler.raise(event);
        }
    }

    /// Let idle npcs pick a random spot near where they spawned.
    fn wander_npcs(&mut self) {
        let range = self.config.npc.wander_range;
        let chance = self.config.npc.wander_chance;
        if range <= 0 || chance <= 0.0 {
            return;
        }
        let mut rng = rand::rng();
        for (_, npc) in self.world.npcs.iter_mut() {
            let c = &mut npc.character;
            let idle = c.path.is_empty()
                && c.teleport_target.is_none()
                && c.scheduler.task(TaskSlot::Normal).is_none()
                && !c.scheduler.has_events();
            if !idle || !rng.random_bool(chance.min(1.0)) {
                continue;
            }
            let x = npc.spawn.x + rng.random_range(-range..=range);
            let y = npc.spawn.y + rng.random_range(-range..=range);
            c.scheduler.raise(Event::Walk {
                x: x.clamp(0, u16::MAX as i32) as u16,
                y: y.clamp(0, u16::MAX as i32) as u16,
                run: false,
            });
        }
    }

    fn run_scheduler(&mut self, who: CharacterRef) {
        let max_passes = self.config.interest.scheduler_max_passes;
        let mut turn = CharacterTurn::new(
            &mut self.world,
            self.templates.as_ref(),
            &mut self.pathfinder,
            who,
            self.tick_count,
        );
        if let Err(e) = run_until_quiescent(&mut turn, max_passes) {
            error!("Scheduler turn aborted: {}", e);
            self.abort(who);
        }
    }

    /// Drop a character's queued work after a failure. Players are logged out.
    fn abort(&mut self, who: CharacterRef) {
        match who {
            CharacterRef::Npc(index) => {
                if let Some(npc) = self.world.npcs.get_mut(index) {
                    npc.character.scheduler.clear();
                }
            }
            CharacterRef::Player(index) => {
                if let Some(player) = self.world.players.get_mut(index) {
                    player.character.scheduler.clear();
                    player.stage_logout();
                }
            }
        }
    }

    /// Scene changes, then npc and player info for one player.
    fn synchronize_player(&mut self, index: u16) -> Result<(), WorldError> {
        let max_additions = self.config.interest.max_additions_per_tick;
        let World { map, npcs, players } = &mut self.world;
        let missing = WorldError::UnknownCharacter(CharacterRef::Player(index));

        let player = players.get_mut(index).ok_or(missing)?;
        let current: ZoneCoord = player.character.pos.zone();
        player
            .scene
            .synchronize(current, map, index, &self.regions, &mut player.outbound)?;

        // Trackers are taken out so the arenas can be read while they update.
        let mut npc_tracker = std::mem::replace(
            &mut player.npc_tracker,
            VisibilityTracker::new(InfoCategory::Npc),
        );
        let mut player_tracker = std::mem::replace(
            &mut player.player_tracker,
            VisibilityTracker::new(InfoCategory::Player),
        );
        let (npc_info, player_info) = {
            let observer = players
                .get(index)
                .map(Actor::character)
                .ok_or(WorldError::UnknownCharacter(CharacterRef::Player(index)))?;
            (
                npc_tracker.update(observer, &*npcs, &*map, max_additions),
                player_tracker.update(observer, &*players, &*map, max_additions),
            )
        };

        let player = players
            .get_mut(index)
            .ok_or(WorldError::UnknownCharacter(CharacterRef::Player(index)))?;
        player.npc_tracker = npc_tracker;
        player.player_tracker = player_tracker;
        player.write(npc_info.to_packet());
        player.write(player_info.to_packet());
        Ok(())
    }

    /// Hand every player's packets for this tick to their connection.
    /// Returns the number of bytes queued.
    fn flush(&mut self) -> usize {
        let mut total = 0;
        for session in self.sessions.values_mut() {
            let Some(player) = self.world.players.get_mut(session.player) else {
                continue;
            };
            let packets = player.take_outbound();
            match session.flush(&packets) {
                Ok(len) => total += len,
                Err(FlushError::Closed) => {
                    debug!("Connection {} already closed", session.connection);
                    player.logout_staged = true;
                }
                Err(e) => {
                    warn!("Dropping {} ({}): {}", player.username, session.addr, e);
                    player.logout_staged = true;
                }
            }
        }
        total
    }

    fn remove_staged_logouts(&mut self) {
        let staged: Vec<u16> = self
            .world
            .players
            .iter()
            .filter(|(_, player)| player.logout_staged)
            .map(|(index, _)| index)
            .collect();
        for index in staged {
            if let Some(player) = self.world.remove_player(index) {
                info!("{} logged out", player.username);
            }
            // Dropping the session closes the connection's outbound channel.
            if let Some(connection) = self.connections.remove(&index) {
                self.sessions.remove(&connection);
            }
        }
    }
}

/// Run the tick loop until the process exits.
pub async fn run_game_loop(state: Arc<RwLock<GameState>>, tick_interval_ms: u64) {
    let start = Instant::now() + Duration::from_millis(tick_interval_ms);
    let mut ticker = interval_at(start, Duration::from_millis(tick_interval_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        let scheduled = ticker.tick().await;

        // Hibernate when no users are connected to reduce CPU usage
        {
            let game = state.read().await;
            if game.is_idle() {
                drop(game);
                sleep(Duration::from_millis((tick_interval_ms / 4).max(50))).await;
                continue;
            }
        }

        // Drain any backlog of tick events so we always process the most recent tick.
        let mut skipped = 0u32;
        while ticker.tick().now_or_never().is_some() {
            skipped += 1;
        }
        if skipped > 0 {
            debug!(
                "Skipped {} ticks to stay current (lag: {:?})",
                skipped,
                Instant::now().saturating_duration_since(scheduled)
            );
        }

        let mut game = state.write().await;
        let tick_start = std::time::Instant::now();
        game.tick();
        let tick_ms = tick_start.elapsed().as_secs_f64() * 1000.0;
        game.update_time_avg = game.update_time_avg * 0.5 + tick_ms * 0.5;

        let tick_budget = tick_interval_ms as f64 * 0.9;
        if tick_ms > tick_budget {
            warn!(
                "Slow tick #{}: {:.3}ms (budget: {:.1}ms) - {} players, {} npcs",
                game.tick_count,
                tick_ms,
                tick_budget,
                game.world.players.len(),
                game.world.npcs.len()
            );
        }
    }
}
