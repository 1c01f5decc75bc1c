//! Content templates and region keys.
//!
//! Content definitions are owned by the game state and handed to whatever
//! needs an id lookup. [`StaticTemplates`] is an in-memory repository that can
//! be filled from a TOML file.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::WorldError;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NpcTemplate {
    pub id: u16,
    pub name: String,
    #[serde(default = "default_size")]
    pub size: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LocTemplate {
    pub id: u16,
    pub name: String,
    #[serde(default = "default_size")]
    pub width: u8,
    #[serde(default = "default_size")]
    pub length: u8,
    /// Whether the footprint blocks movement.
    #[serde(default)]
    pub solid: bool,
    /// Sides from which the loc cannot be approached (bit 0 north, clockwise).
    #[serde(default)]
    pub access_block: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SequenceTemplate {
    pub id: u16,
    /// Length in server ticks.
    pub duration: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SpotAnimTemplate {
    pub id: u16,
    /// Sequence that drives the effect; no sequence means it never expires.
    #[serde(default)]
    pub sequence: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HealthBarTemplate {
    pub id: u8,
    /// Bar width in client pixels.
    pub width: u8,
}

fn default_size() -> u8 {
    1
}

/// Id -> definition lookups.
pub trait TemplateRepository: Send + Sync {
    fn npc(&self, id: u16) -> Option<&NpcTemplate>;
    fn loc(&self, id: u16) -> Option<&LocTemplate>;
    fn sequence(&self, id: u16) -> Option<&SequenceTemplate>;
    fn spot_animation(&self, id: u16) -> Option<&SpotAnimTemplate>;
    fn health_bar(&self, id: u8) -> Option<&HealthBarTemplate>;

    /// Ticks a spot animation stays visible, if it ever expires.
    fn spot_animation_duration(&self, id: u16) -> Result<Option<u32>, WorldError> {
        let spot = self
            .spot_animation(id)
            .ok_or(WorldError::UnknownTemplate { kind: "spot animation", id })?;
        Ok(spot
            .sequence
            .and_then(|sequence| self.sequence(sequence))
            .map(|sequence| sequence.duration))
    }
}

/// Template file layout.
#[derive(Debug, Default, Deserialize, Serialize)]
struct TemplateFile {
    #[serde(default)]
    npc: Vec<NpcTemplate>,
    #[serde(default)]
    loc: Vec<LocTemplate>,
    #[serde(default)]
    sequence: Vec<SequenceTemplate>,
    #[serde(default)]
    spot_animation: Vec<SpotAnimTemplate>,
    #[serde(default)]
    health_bar: Vec<HealthBarTemplate>,
}

/// In-memory template repository.
#[derive(Debug, Default, Clone)]
pub struct StaticTemplates {
    npcs: HashMap<u16, NpcTemplate>,
    locs: HashMap<u16, LocTemplate>,
    sequences: HashMap<u16, SequenceTemplate>,
    spot_animations: HashMap<u16, SpotAnimTemplate>,
    health_bars: HashMap<u8, HealthBarTemplate>,
}

impl StaticTemplates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load templates from a TOML file, or start empty when no path is set.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            info!("No template file configured, starting with empty templates");
            return Ok(Self::new());
        };
        let contents = std::fs::read_to_string(path)?;
        let templates = Self::from_toml_str(&contents)?;
        info!(
            "Loaded {} npc, {} loc, {} sequence templates from {:?}",
            templates.npcs.len(),
            templates.locs.len(),
            templates.sequences.len(),
            path
        );
        Ok(templates)
    }

    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        let file: TemplateFile = toml::from_str(contents)?;
        let mut templates = Self::new();
        file.npc.into_iter().for_each(|t| templates.add_npc(t));
        file.loc.into_iter().for_each(|t| templates.add_loc(t));
        file.sequence.into_iter().for_each(|t| templates.add_sequence(t));
        file.spot_animation.into_iter().for_each(|t| templates.add_spot_animation(t));
        file.health_bar.into_iter().for_each(|t| templates.add_health_bar(t));
        Ok(templates)
    }

    pub fn add_npc(&mut self, template: NpcTemplate) {
        self.npcs.insert(template.id, template);
    }

    pub fn add_loc(&mut self, template: LocTemplate) {
        self.locs.insert(template.id, template);
    }

    pub fn add_sequence(&mut self, template: SequenceTemplate) {
        self.sequences.insert(template.id, template);
    }

    pub fn add_spot_animation(&mut self, template: SpotAnimTemplate) {
        self.spot_animations.insert(template.id, template);
    }

    pub fn add_health_bar(&mut self, template: HealthBarTemplate) {
        self.health_bars.insert(template.id, template);
    }
}

impl TemplateRepository for StaticTemplates {
    fn npc(&self, id: u16) -> Option<&NpcTemplate> {
        self.npcs.get(&id)
    }

    fn loc(&self, id: u16) -> Option<&LocTemplate> {
        self.locs.get(&id)
    }

    fn sequence(&self, id: u16) -> Option<&SequenceTemplate> {
        self.sequences.get(&id)
    }

    fn spot_animation(&self, id: u16) -> Option<&SpotAnimTemplate> {
        self.spot_animations.get(&id)
    }

    fn health_bar(&self, id: u8) -> Option<&HealthBarTemplate> {
        self.health_bars.get(&id)
    }
}

/// One entry of the region key file.
#[derive(Debug, Deserialize, Serialize)]
struct RegionKeyEntry {
    mapsquare_x: u8,
    mapsquare_y: u8,
    key: [i32; 4],
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct RegionKeyFile {
    #[serde(default)]
    region: Vec<RegionKeyEntry>,
}

/// Per-mapsquare symmetric keys delivered with every rebuild.
#[derive(Debug, Default, Clone)]
pub struct RegionKeys {
    keys: HashMap<u16, [i32; 4]>,
    allow_missing: bool,
}

impl RegionKeys {
    pub fn new(allow_missing: bool) -> Self {
        Self {
            keys: HashMap::new(),
            allow_missing,
        }
    }

    /// Region id for a mapsquare.
    #[inline]
    pub fn region_id(mapsquare_x: i32, mapsquare_y: i32) -> u16 {
        (((mapsquare_x & 0xFF) << 8) | (mapsquare_y & 0xFF)) as u16
    }

    pub fn load(path: Option<&Path>, allow_missing: bool) -> anyhow::Result<Self> {
        let mut keys = Self::new(allow_missing);
        let Some(path) = path else {
            if !allow_missing {
                warn!("No region key file configured; every rebuild will fail");
            }
            return Ok(keys);
        };
        let contents = std::fs::read_to_string(path)?;
        let file: RegionKeyFile = toml::from_str(&contents)?;
        for entry in file.region {
            keys.insert(entry.mapsquare_x as i32, entry.mapsquare_y as i32, entry.key);
        }
        info!("Loaded {} region keys from {:?}", keys.keys.len(), path);
        Ok(keys)
    }

    pub fn insert(&mut self, mapsquare_x: i32, mapsquare_y: i32, key: [i32; 4]) {
        self.keys.insert(Self::region_id(mapsquare_x, mapsquare_y), key);
    }

    /// Key for one mapsquare. Zero keys stand in for missing ones when allowed.
    pub fn get(&self, mapsquare_x: i32, mapsquare_y: i32) -> Result<[i32; 4], WorldError> {
        let region = Self::region_id(mapsquare_x, mapsquare_y);
        match self.keys.get(&region) {
            Some(key) => Ok(*key),
            None if self.allow_missing => Ok([0; 4]),
            None => Err(WorldError::MissingRegionKey { region }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_templates_from_toml() {
        let templates = StaticTemplates::from_toml_str(
            r#"
            [[npc]]
            id = 3010
            name = "Guard"

            [[loc]]
            id = 1276
            name = "Tree"
            width = 2
            length = 2
            solid = true

            [[sequence]]
            id = 808
            duration = 4

            [[spot_animation]]
            id = 86
            sequence = 808
            "#,
        )
        .unwrap();
        assert_eq!(templates.npc(3010).unwrap().size, 1);
        assert!(templates.loc(1276).unwrap().solid);
        assert_eq!(templates.spot_animation_duration(86).unwrap(), Some(4));
        assert!(templates.spot_animation_duration(87).is_err());
    }

    #[test]
    fn test_region_keys() {
        let mut keys = RegionKeys::new(false);
        keys.insert(50, 50, [1, 2, 3, 4]);
        assert_eq!(RegionKeys::region_id(50, 50), 0x3232);
        assert_eq!(keys.get(50, 50).unwrap(), [1, 2, 3, 4]);
        assert!(matches!(
            keys.get(50, 51),
            Err(WorldError::MissingRegionKey { region: 0x3233 })
        ));
        assert_eq!(RegionKeys::new(true).get(1, 1).unwrap(), [0; 4]);
    }
}
