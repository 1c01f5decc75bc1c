//! Per-tick dirty marks.

use bitflags::bitflags;
use protocol::packets::InfoCategory;

bitflags! {
    /// Visual changes a character made this tick. Cleared in post-process.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct UpdateFlags: u16 {
        /// Temporary movement kind changed (players only).
        const MOVEMENT = 1 << 0;
        const ORIENTATION = 1 << 1;
        const TURN_LOCK = 1 << 2;
        const SEQUENCE = 1 << 3;
        const SPOT_ANIMATION = 1 << 4;
        const HIT = 1 << 5;
        const SHOUT = 1 << 6;
        /// Public chat (players only).
        const CHAT = 1 << 7;
    }
}

/// One kind of visual update, in encoding priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum UpdateKind {
    Movement,
    Orientation,
    TurnLock,
    Sequence,
    SpotAnimation,
    Hit,
    Shout,
    Chat,
}

/// Encoding order for npc blocks (ascending mask bit).
const NPC_PRIORITY: [UpdateKind; 6] = [
    UpdateKind::Orientation,
    UpdateKind::Shout,
    UpdateKind::SpotAnimation,
    UpdateKind::TurnLock,
    UpdateKind::Sequence,
    UpdateKind::Hit,
];

/// Encoding order for player blocks (ascending mask bit).
const PLAYER_PRIORITY: [UpdateKind; 8] = [
    UpdateKind::Movement,
    UpdateKind::Orientation,
    UpdateKind::TurnLock,
    UpdateKind::Sequence,
    UpdateKind::SpotAnimation,
    UpdateKind::Hit,
    UpdateKind::Shout,
    UpdateKind::Chat,
];

impl UpdateKind {
    pub fn flag(self) -> UpdateFlags {
        match self {
            UpdateKind::Movement => UpdateFlags::MOVEMENT,
            UpdateKind::Orientation => UpdateFlags::ORIENTATION,
            UpdateKind::TurnLock => UpdateFlags::TURN_LOCK,
            UpdateKind::Sequence => UpdateFlags::SEQUENCE,
            UpdateKind::SpotAnimation => UpdateFlags::SPOT_ANIMATION,
            UpdateKind::Hit => UpdateFlags::HIT,
            UpdateKind::Shout => UpdateFlags::SHOUT,
            UpdateKind::Chat => UpdateFlags::CHAT,
        }
    }
}

impl UpdateFlags {
    /// Set kinds in the fixed encoding order for `category`. Kinds the
    /// category cannot encode are skipped.
    pub fn in_priority(self, category: InfoCategory) -> impl Iterator<Item = UpdateKind> {
        let order: &'static [UpdateKind] = match category {
            InfoCategory::Npc => &NPC_PRIORITY,
            InfoCategory::Player => &PLAYER_PRIORITY,
        };
        order.iter().copied().filter(move |kind| self.contains(kind.flag()))
    }

    /// Whether anything encodable for `category` is set.
    pub fn has_visual(self, category: InfoCategory) -> bool {
        self.in_priority(category).next().is_some()
    }
}
