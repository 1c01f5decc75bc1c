//! Server configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::world::Tile;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub world: WorldConfig,
    #[serde(default)]
    pub interest: InterestConfig,
    #[serde(default)]
    pub npc: NpcConfig,
}

impl Config {
    /// Load configuration from `config.toml` or use defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = Path::new("config.toml");
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&contents)?)
        } else {
            info!("No config.toml found, creating default config");
            let default_config = Self::default();
            std::fs::write(path, toml::to_string_pretty(&default_config)?)?;
            Ok(default_config)
        }
    }
}

/// Server networking and general settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Bind address.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Server name shown in logs.
    #[serde(default = "default_name")]
    pub name: String,
    /// Tick interval in milliseconds.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
    /// Outbound messages buffered per connection before it is dropped.
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
            max_connections: default_max_connections(),
            name: default_name(),
            tick_interval_ms: default_tick_interval(),
            outbound_buffer: default_outbound_buffer(),
        }
    }
}

fn default_port() -> u16 {
    43594
}
fn default_bind() -> String {
    "0.0.0.0".to_string()
}
fn default_max_connections() -> usize {
    2000
}
fn default_name() -> String {
    "World Server".to_string()
}
fn default_tick_interval() -> u64 {
    600
}
fn default_outbound_buffer() -> usize {
    64
}

/// Rectangle of zones on one floor to load at startup, bounds inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct ZoneArea {
    pub floor: u8,
    pub from: (i32, i32),
    pub to: (i32, i32),
}

/// World content and placement.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorldConfig {
    /// Where new players appear.
    #[serde(default = "default_spawn")]
    pub spawn: Tile,
    /// TOML file with npc, loc, sequence, spot animation and health bar templates.
    #[serde(default)]
    pub templates: Option<PathBuf>,
    /// TOML file mapping region ids to their four keys.
    #[serde(default)]
    pub region_keys: Option<PathBuf>,
    /// Send zero keys for regions without one instead of refusing the rebuild.
    #[serde(default)]
    pub allow_missing_keys: bool,
    /// Zones to load.
    #[serde(default = "default_areas")]
    pub areas: Vec<ZoneArea>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            spawn: default_spawn(),
            templates: None,
            region_keys: None,
            allow_missing_keys: false,
            areas: default_areas(),
        }
    }
}

fn default_spawn() -> Tile {
    Tile::new(0, 3222, 3235)
}
fn default_areas() -> Vec<ZoneArea> {
    // Ten mapsquares around the default spawn.
    vec![ZoneArea {
        floor: 0,
        from: (376, 376),
        to: (431, 431),
    }]
}

/// Interest management and scheduling bounds.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InterestConfig {
    /// New entities a client is told about per list per tick.
    #[serde(default = "default_max_additions")]
    pub max_additions_per_tick: usize,
    /// Scheduler passes per character per tick before it is treated as livelocked.
    #[serde(default = "default_max_passes")]
    pub scheduler_max_passes: u32,
}

impl Default for InterestConfig {
    fn default() -> Self {
        Self {
            max_additions_per_tick: default_max_additions(),
            scheduler_max_passes: default_max_passes(),
        }
    }
}

fn default_max_additions() -> usize {
    16
}
fn default_max_passes() -> u32 {
    64
}

/// A fixed npc placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct NpcSpawn {
    pub template: u16,
    pub tile: Tile,
}

/// Npc placement and idle behaviour.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NpcConfig {
    #[serde(default)]
    pub spawns: Vec<NpcSpawn>,
    /// Tiles an idle npc may stray from its spawn.
    #[serde(default = "default_wander_range")]
    pub wander_range: i32,
    /// Chance per tick that an idle npc picks a new spot.
    #[serde(default = "default_wander_chance")]
    pub wander_chance: f64,
}

impl Default for NpcConfig {
    fn default() -> Self {
        Self {
            spawns: Vec::new(),
            wander_range: default_wander_range(),
            wander_chance: default_wander_chance(),
        }
    }
}

fn default_wander_range() -> i32 {
    5
}
fn default_wander_chance() -> f64 {
    0.125
}
