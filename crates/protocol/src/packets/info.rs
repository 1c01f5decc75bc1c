//! Entity visibility blocks (npc info / player info).
//!
//! Layout: a bit section with the count of already-known entities, one
//! movement record per known entity, the additions terminated by an all-ones
//! index, then a byte section with one visual block per entity whose update
//! flags are set.

use bytes::Bytes;

use crate::{BinaryWriter, BitWriter, GamePacket, PacketSize};

use super::ServerOpcode;

/// Width of an entity index in an addition record.
pub const INDEX_BITS: u32 = 15;
/// Index value that terminates the addition list.
pub const END_OF_ADDITIONS: u32 = (1 << INDEX_BITS) - 1;
/// Width of the spawn id in an npc addition.
pub const SPAWN_ID_BITS: u32 = 14;

/// Which list a visibility block describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoCategory {
    Npc,
    Player,
}

impl InfoCategory {
    fn opcode(self) -> ServerOpcode {
        match self {
            InfoCategory::Npc => ServerOpcode::NpcInfoSmallViewport,
            InfoCategory::Player => ServerOpcode::PlayerInfo,
        }
    }
}

/// Outcome for one already-known entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalUpdate {
    /// Nothing to send: a single 0 bit.
    NoChange,
    /// Only visual updates.
    Visual,
    Walk { direction: u8, has_visual: bool },
    Run { first: u8, second: u8, has_visual: bool },
    /// Drop the entity from the client's list.
    Remove,
}

/// A newly visible entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddedEntity {
    pub index: u16,
    /// Orientation quantised to 3 bits.
    pub orientation: u8,
    /// Position relative to the observer, wrapped into the interest window.
    pub dx: u8,
    pub dy: u8,
    pub teleport: bool,
    /// Template id (npc list only).
    pub spawn_id: Option<u16>,
    pub has_visual: bool,
}

/// A single hit splat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitMarkRecord {
    pub kind: u8,
    pub damage: u16,
    pub delay: u8,
}

/// A health bar change, widths already scaled to the bar's pixel width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthBarRecord {
    Static { id: u8, width: u8, delay: u16 },
    Dynamic { id: u8, start_width: u8, end_width: u8, speed: u16, delay: u16 },
    Remove { id: u8 },
}

/// One visual update, written in the byte section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisualUpdate {
    /// Temporary movement kind (player list only).
    Movement { kind: u8 },
    Orientation { angle: u16 },
    /// Face a character; 0xFFFF clears the lock.
    TurnLockTo { target: u16 },
    /// 0xFFFF stops the current sequence.
    Sequence { id: u16, delay: u8 },
    SpotAnimation { id: u16, height: u16, delay: u16 },
    Hit {
        marks: Vec<HitMarkRecord>,
        bars: Vec<HealthBarRecord>,
    },
    Shout { message: String },
    /// Public chat (player list only).
    Chat { effects: u16, message: String },
}

impl VisualUpdate {
    /// Mask bit for this update in the given list.
    pub fn mask(&self, category: InfoCategory) -> u8 {
        match category {
            InfoCategory::Npc => match self {
                VisualUpdate::Orientation { .. } => 0x01,
                VisualUpdate::Shout { .. } => 0x02,
                VisualUpdate::SpotAnimation { .. } => 0x04,
                VisualUpdate::TurnLockTo { .. } => 0x10,
                VisualUpdate::Sequence { .. } => 0x20,
                VisualUpdate::Hit { .. } => 0x40,
                VisualUpdate::Movement { .. } | VisualUpdate::Chat { .. } => 0,
            },
            InfoCategory::Player => match self {
                VisualUpdate::Movement { .. } => 0x01,
                VisualUpdate::Orientation { .. } => 0x02,
                VisualUpdate::TurnLockTo { .. } => 0x04,
                VisualUpdate::Sequence { .. } => 0x08,
                VisualUpdate::SpotAnimation { .. } => 0x10,
                VisualUpdate::Hit { .. } => 0x20,
                VisualUpdate::Shout { .. } => 0x40,
                VisualUpdate::Chat { .. } => 0x80,
            },
        }
    }

    fn write(&self, w: &mut BinaryWriter) {
        match self {
            VisualUpdate::Movement { kind } => w.put_u8(*kind),
            VisualUpdate::Orientation { angle } => w.put_u16(*angle),
            VisualUpdate::TurnLockTo { target } => w.put_u16(*target),
            VisualUpdate::Sequence { id, delay } => {
                w.put_u16(*id);
                w.put_u8(*delay);
            }
            VisualUpdate::SpotAnimation { id, height, delay } => {
                w.put_u16(*id);
                w.put_u16(*height);
                w.put_u16(*delay);
            }
            VisualUpdate::Hit { marks, bars } => {
                w.put_u8(marks.len() as u8);
                for mark in marks {
                    w.put_u8(mark.kind);
                    w.put_u16(mark.damage);
                    w.put_u8(mark.delay);
                }
                w.put_u8(bars.len() as u8);
                for bar in bars {
                    match *bar {
                        HealthBarRecord::Static { id, width, delay } => {
                            w.put_u8(id);
                            w.put_u16(0);
                            w.put_u16(delay);
                            w.put_u8(width);
                        }
                        HealthBarRecord::Dynamic { id, start_width, end_width, speed, delay } => {
                            w.put_u8(id);
                            w.put_u16(speed);
                            w.put_u16(delay);
                            w.put_u8(start_width);
                            w.put_u8(end_width);
                        }
                        HealthBarRecord::Remove { id } => {
                            w.put_u8(id);
                            w.put_u16(0x7FFF);
                        }
                    }
                }
            }
            VisualUpdate::Shout { message } => w.put_string(message),
            VisualUpdate::Chat { effects, message } => {
                w.put_u16(*effects);
                w.put_string(message);
            }
        }
    }
}

/// A full visibility block for one observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityInfo {
    pub category: InfoCategory,
    /// One entry per entity the client knew before this tick, in list order.
    pub local: Vec<LocalUpdate>,
    pub added: Vec<AddedEntity>,
    /// Visual blocks in list order (known survivors first, then additions).
    pub visuals: Vec<Vec<VisualUpdate>>,
}

impl EntityInfo {
    pub fn new(category: InfoCategory) -> Self {
        Self {
            category,
            local: Vec::new(),
            added: Vec::new(),
            visuals: Vec::new(),
        }
    }

    /// Encode the bit section.
    pub fn encode_bits(&self) -> Bytes {
        let mut bits = BitWriter::with_capacity(4 + self.local.len() / 2 + self.added.len() * 7);
        bits.put_bits(8, self.local.len() as u32);
        for update in &self.local {
            match *update {
                LocalUpdate::NoChange => bits.put_bool(false),
                LocalUpdate::Visual => {
                    bits.put_bool(true);
                    bits.put_bits(2, 0);
                }
                LocalUpdate::Walk { direction, has_visual } => {
                    bits.put_bool(true);
                    bits.put_bits(2, 1);
                    bits.put_bits(3, direction as u32);
                    bits.put_bool(has_visual);
                }
                LocalUpdate::Run { first, second, has_visual } => {
                    bits.put_bool(true);
                    bits.put_bits(2, 2);
                    bits.put_bits(3, first as u32);
                    bits.put_bits(3, second as u32);
                    bits.put_bool(has_visual);
                }
                LocalUpdate::Remove => {
                    bits.put_bool(true);
                    bits.put_bits(2, 3);
                }
            }
        }
        for added in &self.added {
            bits.put_bits(INDEX_BITS, added.index as u32);
            bits.put_bits(3, added.orientation as u32);
            bits.put_bits(5, added.dx as u32);
            bits.put_bits(5, added.dy as u32);
            bits.put_bool(added.teleport);
            if let Some(id) = added.spawn_id {
                bits.put_bits(SPAWN_ID_BITS, id as u32);
            }
            bits.put_bool(added.has_visual);
        }
        bits.put_bits(INDEX_BITS, END_OF_ADDITIONS);
        bits.finish()
    }

    /// Build the framed packet (bit section followed by visual blocks).
    pub fn to_packet(&self) -> GamePacket {
        let bits = self.encode_bits();
        let mut w = BinaryWriter::with_capacity(bits.len() + self.visuals.len() * 8);
        w.put_slice(&bits);
        for block in &self.visuals {
            let mask = block.iter().fold(0u8, |mask, update| mask | update.mask(self.category));
            w.put_u8(mask);
            for update in block {
                update.write(&mut w);
            }
        }
        GamePacket::new(self.category.opcode() as u8, PacketSize::VarShort, w.finish())
    }
}
