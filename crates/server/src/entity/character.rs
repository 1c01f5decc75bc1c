//! State shared by players and npcs.

use std::collections::VecDeque;

use protocol::packets::{HealthBarRecord, HitMarkRecord, InfoCategory, VisualUpdate};

use crate::error::{CharacterRef, WorldError};
use crate::task::{MessageKind, Scheduler, Task, TaskSlot, TaskState, Wait};
use crate::template::TemplateRepository;
use crate::world::{Tile, ZoneId};

use super::movement::MovementType;
use super::update_flags::{UpdateFlags, UpdateKind};

/// Ticks an overhead message stays up.
pub const MESSAGE_DURATION: u32 = 4;
/// Client animation cycles per server tick.
pub const CLIENT_CYCLES_PER_TICK: u32 = 30;
/// Sequence/spot animation id that tells the client to stop.
pub const NO_ANIMATION: u16 = 0xFFFF;

// Converts a 2D vector angle into the client's 2048-step orientation.
const ANGLE_SCALE: f64 = 325.949;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveSequence {
    pub id: u16,
    pub delay: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpotAnimation {
    pub id: u16,
    pub height: u16,
    pub delay: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub effects: u16,
    pub message: String,
}

/// Work deferred to the end of the tick, after every observer has been sent
/// this tick's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostAction {
    ClearTeleport,
    ClearShout,
    ClearChat,
}

/// Position, movement and visual state of a player or npc.
#[derive(Debug)]
pub struct Character {
    /// Protocol index in the owning arena.
    pub index: u16,
    pub pos: Tile,
    /// Position at the start of the tick.
    pub last_pos: Tile,
    /// Tile the character passed through (run) or came from (walk).
    pub follow_pos: Tile,
    /// Zone this character is resident in.
    pub zone: ZoneId,
    /// Footprint edge length in tiles.
    pub size: u8,
    /// 11-bit facing, 0 = south, increasing clockwise.
    pub orientation: u16,
    /// Tiles left to walk, front first.
    pub path: VecDeque<Tile>,
    pub run_mode: bool,
    pub movement: MovementType,
    pub teleport_target: Option<Tile>,
    pub flags: UpdateFlags,
    /// Character this one keeps facing.
    pub interacting: Option<CharacterRef>,
    pub sequence: Option<ActiveSequence>,
    pub spot_animation: Option<SpotAnimation>,
    pub shout: Option<String>,
    pub chat: Option<ChatMessage>,
    pub hit_marks: Vec<HitMarkRecord>,
    pub health_bars: Vec<HealthBarRecord>,
    pub scheduler: Scheduler,
    pub post_actions: Vec<PostAction>,
}

impl Character {
    pub fn new(index: u16, pos: Tile, zone: ZoneId, size: u8) -> Self {
        Self {
            index,
            pos,
            last_pos: pos,
            follow_pos: pos.offset(-1, 0),
            zone,
            size,
            orientation: 0,
            path: VecDeque::new(),
            run_mode: false,
            movement: MovementType::Stay,
            teleport_target: None,
            flags: UpdateFlags::empty(),
            interacting: None,
            sequence: None,
            spot_animation: None,
            shout: None,
            chat: None,
            hit_marks: Vec::new(),
            health_bars: Vec::new(),
            scheduler: Scheduler::new(),
            post_actions: Vec::new(),
        }
    }

    pub fn set_run_mode(&mut self, run: bool) {
        self.run_mode = run;
    }

    /// Face the centre of a `width` x `length` footprint whose south-west
    /// tile is `target`.
    pub fn turn_to(&mut self, target: Tile, width: i32, length: i32) {
        // Doubled coordinates keep footprint centres on whole numbers.
        let dx = (self.pos.x * 2 + self.size as i32) - (target.x * 2 + width);
        let dy = (self.pos.y * 2 + self.size as i32) - (target.y * 2 + length);
        if dx == 0 && dy == 0 {
            return;
        }
        let angle = (dx as f64).atan2(dy as f64) * ANGLE_SCALE;
        self.orientation = (angle.round() as i32 & 0x7FF) as u16;
        self.flags |= UpdateFlags::ORIENTATION;
    }

    /// Face `target`, standing at `pos` with footprint `size`, and keep
    /// facing it until the lock is replaced or released.
    pub fn turn_to_lock(&mut self, target: CharacterRef, pos: Tile, size: u8) {
        self.turn_to(pos, size as i32, size as i32);
        self.interacting = Some(target);
        self.flags |= UpdateFlags::TURN_LOCK;
    }

    pub fn release_lock(&mut self) {
        self.interacting = None;
        self.flags |= UpdateFlags::TURN_LOCK;
    }

    /// Play sequence `id`. It is cleared once its template duration has passed.
    pub fn animate(
        &mut self,
        id: u16,
        delay: u8,
        now: u64,
        templates: &dyn TemplateRepository,
    ) -> Result<(), WorldError> {
        let template = templates
            .sequence(id)
            .ok_or(WorldError::UnknownTemplate { kind: "sequence", id })?;
        self.sequence = Some(ActiveSequence { id, delay });
        self.flags |= UpdateFlags::SEQUENCE;
        self.scheduler.start(
            TaskSlot::Sequence,
            Task::new(Wait::after(now, template.duration), TaskState::ExpireSequence),
        );
        Ok(())
    }

    pub fn stop_animation(&mut self) {
        self.sequence = None;
        self.flags |= UpdateFlags::SEQUENCE;
        self.scheduler.cancel(TaskSlot::Sequence);
    }

    /// Show spot animation `id` after `delay` client cycles.
    pub fn spot_animate(
        &mut self,
        id: u16,
        height: u16,
        delay: u16,
        now: u64,
        templates: &dyn TemplateRepository,
    ) -> Result<(), WorldError> {
        let duration = templates.spot_animation_duration(id)?;
        self.spot_animation = Some(SpotAnimation { id, height, delay });
        self.flags |= UpdateFlags::SPOT_ANIMATION;
        self.scheduler.start(
            TaskSlot::SpotAnimation,
            Task::new(
                Wait::after(now, delay as u32 / CLIENT_CYCLES_PER_TICK),
                TaskState::SpotAnimationStarted { duration },
            ),
        );
        Ok(())
    }

    /// Overhead text.
    pub fn shout(&mut self, message: impl Into<String>, now: u64) {
        self.shout = Some(message.into());
        self.flags |= UpdateFlags::SHOUT;
        self.scheduler.start(
            TaskSlot::Chat,
            Task::new(
                Wait::after(now, MESSAGE_DURATION),
                TaskState::ExpireMessage(MessageKind::Shout),
            ),
        );
    }

    /// Public chat with client text effects.
    pub fn talk(&mut self, effects: u16, message: impl Into<String>, now: u64) {
        self.chat = Some(ChatMessage {
            effects,
            message: message.into(),
        });
        self.flags |= UpdateFlags::CHAT;
        self.scheduler.start(
            TaskSlot::Chat,
            Task::new(
                Wait::after(now, MESSAGE_DURATION),
                TaskState::ExpireMessage(MessageKind::Chat),
            ),
        );
    }

    pub fn add_hit_mark(&mut self, kind: u8, damage: u16, delay: u8) {
        self.hit_marks.push(HitMarkRecord { kind, damage, delay });
        self.flags |= UpdateFlags::HIT;
    }

    /// Show health bar `id` at `current / max`, scaled to the bar's width.
    pub fn update_health_bar(
        &mut self,
        id: u8,
        current: u32,
        max: u32,
        delay: u16,
        templates: &dyn TemplateRepository,
    ) -> Result<(), WorldError> {
        let width = health_bar_width(templates, id, current, max)?;
        self.health_bars.push(HealthBarRecord::Static { id, width, delay });
        self.flags |= UpdateFlags::HIT;
        Ok(())
    }

    /// Slide health bar `id` from `from / max` to `to / max` over `speed`
    /// client cycles.
    pub fn transition_health_bar(
        &mut self,
        id: u8,
        from: u32,
        to: u32,
        max: u32,
        speed: u16,
        delay: u16,
        templates: &dyn TemplateRepository,
    ) -> Result<(), WorldError> {
        let start_width = health_bar_width(templates, id, from, max)?;
        let end_width = health_bar_width(templates, id, to, max)?;
        self.health_bars.push(HealthBarRecord::Dynamic {
            id,
            start_width,
            end_width,
            speed,
            delay,
        });
        self.flags |= UpdateFlags::HIT;
        Ok(())
    }

    pub fn remove_health_bar(&mut self, id: u8) {
        self.health_bars.push(HealthBarRecord::Remove { id });
        self.flags |= UpdateFlags::HIT;
    }

    /// Visual blocks for this tick in encoding order.
    pub fn visual_updates(&self, category: InfoCategory) -> Vec<VisualUpdate> {
        self.flags
            .in_priority(category)
            .map(|kind| match kind {
                UpdateKind::Movement => VisualUpdate::Movement {
                    kind: self.movement.code(),
                },
                UpdateKind::Orientation => VisualUpdate::Orientation {
                    angle: self.orientation,
                },
                UpdateKind::TurnLock => VisualUpdate::TurnLockTo {
                    target: lock_code(self.interacting),
                },
                UpdateKind::Sequence => match self.sequence {
                    Some(sequence) => VisualUpdate::Sequence {
                        id: sequence.id,
                        delay: sequence.delay,
                    },
                    None => VisualUpdate::Sequence {
                        id: NO_ANIMATION,
                        delay: 0,
                    },
                },
                UpdateKind::SpotAnimation => match self.spot_animation {
                    Some(spot) => VisualUpdate::SpotAnimation {
                        id: spot.id,
                        height: spot.height,
                        delay: spot.delay,
                    },
                    None => VisualUpdate::SpotAnimation {
                        id: NO_ANIMATION,
                        height: 0,
                        delay: 0,
                    },
                },
                UpdateKind::Hit => VisualUpdate::Hit {
                    marks: self.hit_marks.clone(),
                    bars: self.health_bars.clone(),
                },
                UpdateKind::Shout => VisualUpdate::Shout {
                    message: self.shout.clone().unwrap_or_default(),
                },
                UpdateKind::Chat => match &self.chat {
                    Some(chat) => VisualUpdate::Chat {
                        effects: chat.effects,
                        message: chat.message.clone(),
                    },
                    None => VisualUpdate::Chat {
                        effects: 0,
                        message: String::new(),
                    },
                },
            })
            .collect()
    }

    /// End-of-tick cleanup: run deferred actions and drop this tick's marks.
    pub fn post_process(&mut self) {
        for action in self.post_actions.drain(..) {
            match action {
                PostAction::ClearTeleport => self.teleport_target = None,
                PostAction::ClearShout => self.shout = None,
                PostAction::ClearChat => self.chat = None,
            }
        }
        self.flags = UpdateFlags::empty();
        self.movement = MovementType::Stay;
        self.hit_marks.clear();
        self.health_bars.clear();
    }
}

fn health_bar_width(
    templates: &dyn TemplateRepository,
    id: u8,
    current: u32,
    max: u32,
) -> Result<u8, WorldError> {
    let template = templates.health_bar(id).ok_or(WorldError::UnknownTemplate {
        kind: "health bar",
        id: id as u16,
    })?;
    if max == 0 {
        return Ok(0);
    }
    Ok((current.min(max) as u64 * template.width as u64 / max as u64) as u8)
}

/// Turn-lock target as the client reads it: npcs by index, players offset by
/// 32768, 0xFFFF for none.
pub fn lock_code(target: Option<CharacterRef>) -> u16 {
    match target {
        Some(CharacterRef::Npc(index)) => index,
        Some(CharacterRef::Player(index)) => index.wrapping_add(32768),
        None => 0xFFFF,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Resume;
    use crate::template::{HealthBarTemplate, SequenceTemplate, SpotAnimTemplate, StaticTemplates};

    fn character() -> Character {
        Character::new(3, Tile::new(0, 100, 100), ZoneId(0), 1)
    }

    fn templates() -> StaticTemplates {
        let mut templates = StaticTemplates::new();
        templates.add_sequence(SequenceTemplate { id: 7, duration: 3 });
        templates.add_spot_animation(SpotAnimTemplate { id: 9, sequence: Some(7) });
        templates.add_health_bar(HealthBarTemplate { id: 0, width: 30 });
        templates
    }

    #[test]
    fn test_turn_to_cardinals() {
        let mut c = character();
        c.turn_to(Tile::new(0, 100, 90), 1, 1);
        assert_eq!(c.orientation, 0);
        c.turn_to(Tile::new(0, 90, 100), 1, 1);
        assert_eq!(c.orientation, 512);
        c.turn_to(Tile::new(0, 100, 110), 1, 1);
        assert_eq!(c.orientation, 1024);
        c.turn_to(Tile::new(0, 110, 100), 1, 1);
        assert_eq!(c.orientation, 1536);
        assert!(c.flags.contains(UpdateFlags::ORIENTATION));
    }

    #[test]
    fn test_turn_to_own_centre_keeps_orientation() {
        let mut c = character();
        c.orientation = 300;
        c.turn_to(c.pos, 1, 1);
        assert_eq!(c.orientation, 300);
        assert!(c.flags.is_empty());
    }

    #[test]
    fn test_animate_unknown_sequence_fails() {
        let mut c = character();
        let err = c.animate(1, 0, 0, &templates()).unwrap_err();
        assert!(matches!(err, WorldError::UnknownTemplate { kind: "sequence", id: 1 }));
        assert!(c.sequence.is_none());
    }

    #[test]
    fn test_animate_schedules_expiry() {
        let mut c = character();
        c.animate(7, 0, 10, &templates()).unwrap();
        assert_eq!(c.sequence, Some(ActiveSequence { id: 7, delay: 0 }));
        assert_eq!(
            c.scheduler.task(TaskSlot::Sequence).map(|t| t.wait),
            Some(Wait::Ticks { until: 13 })
        );
    }

    #[test]
    fn test_spot_animation_waits_out_delay_then_duration() {
        let mut c = character();
        c.spot_animate(9, 92, 60, 10, &templates()).unwrap();
        assert_eq!(c.spot_animation, Some(SpotAnimation { id: 9, height: 92, delay: 60 }));
        let mut task = c.scheduler.take(TaskSlot::SpotAnimation).unwrap();
        assert_eq!(task.wait, Wait::Ticks { until: 12 });
        assert_eq!(task.resume(&mut c, 12), Resume::Advanced);
        assert_eq!(task.wait, Wait::Ticks { until: 15 });
        assert_eq!(task.resume(&mut c, 15), Resume::Finished);
        assert!(c.spot_animation.is_none());
    }

    #[test]
    fn test_stop_animation_cancels_expiry() {
        let mut c = character();
        c.animate(7, 0, 0, &templates()).unwrap();
        c.stop_animation();
        assert!(c.sequence.is_none());
        assert!(c.scheduler.task(TaskSlot::Sequence).is_none());
        assert!(c.flags.contains(UpdateFlags::SEQUENCE));
    }

    #[test]
    fn test_turn_lock_faces_target_and_release_keeps_orientation() {
        let mut c = character();
        c.turn_to_lock(CharacterRef::Player(2), Tile::new(0, 100, 95), 1);
        assert_eq!(c.orientation, 0);
        assert!(c.flags.contains(UpdateFlags::ORIENTATION | UpdateFlags::TURN_LOCK));
        let updates = c.visual_updates(InfoCategory::Player);
        assert!(updates.contains(&VisualUpdate::TurnLockTo { target: 32770 }));
        assert!(updates.contains(&VisualUpdate::Orientation { angle: 0 }));

        c.post_process();
        c.release_lock();
        assert!(c.interacting.is_none());
        assert_eq!(c.orientation, 0);
        assert_eq!(c.flags, UpdateFlags::TURN_LOCK);
    }

    #[test]
    fn test_turn_to_uses_whole_footprint() {
        // West of a 2x2 footprint, level with its southern row.
        let mut c = Character::new(3, Tile::new(0, 3223, 3236), ZoneId(0), 1);
        c.turn_to(Tile::new(0, 3224, 3236), 2, 2);
        assert_eq!(c.orientation, 1431);

        // A 3x1 footprint straight north: centred, so due north.
        let mut c = character();
        c.turn_to(Tile::new(0, 99, 101), 3, 1);
        assert_eq!(c.orientation, 1024);
    }

    #[test]
    fn test_health_bar_transition_scales_both_ends() {
        let mut c = character();
        c.transition_health_bar(0, 10, 4, 10, 30, 5, &templates()).unwrap();
        assert_eq!(
            c.health_bars,
            vec![HealthBarRecord::Dynamic { id: 0, start_width: 30, end_width: 12, speed: 30, delay: 5 }]
        );
        assert!(c.flags.contains(UpdateFlags::HIT));
        assert!(c.transition_health_bar(4, 1, 0, 1, 30, 0, &templates()).is_err());
    }

    #[test]
    fn test_remove_health_bar() {
        let mut c = character();
        c.remove_health_bar(0);
        assert_eq!(c.health_bars, vec![HealthBarRecord::Remove { id: 0 }]);
        assert!(c.flags.contains(UpdateFlags::HIT));
    }

    #[test]
    fn test_health_bar_scales_to_template_width() {
        let mut c = character();
        c.update_health_bar(0, 5, 10, 0, &templates()).unwrap();
        assert_eq!(c.health_bars, vec![HealthBarRecord::Static { id: 0, width: 15, delay: 0 }]);
        assert!(c.flags.contains(UpdateFlags::HIT));
    }

    #[test]
    fn test_visual_updates_follow_priority() {
        let mut c = character();
        c.add_hit_mark(1, 5, 0);
        c.shout("hi", 0);
        c.turn_to(Tile::new(0, 100, 90), 1, 1);
        let npc = c.visual_updates(InfoCategory::Npc);
        assert!(matches!(npc[0], VisualUpdate::Orientation { angle: 0 }));
        assert!(matches!(npc[1], VisualUpdate::Shout { .. }));
        assert!(matches!(npc[2], VisualUpdate::Hit { .. }));
        let player = c.visual_updates(InfoCategory::Player);
        assert!(matches!(player[1], VisualUpdate::Hit { .. }));
        assert!(matches!(player[2], VisualUpdate::Shout { .. }));
    }

    #[test]
    fn test_post_process_clears_tick_state() {
        let mut c = character();
        c.shout("bye", 0);
        c.add_hit_mark(0, 1, 0);
        c.post_actions.push(PostAction::ClearShout);
        c.post_process();
        assert!(c.flags.is_empty());
        assert!(c.hit_marks.is_empty());
        assert!(c.shout.is_none());
        assert!(c.post_actions.is_empty());
    }

    #[test]
    fn test_lock_codes() {
        assert_eq!(lock_code(Some(CharacterRef::Npc(4))), 4);
        assert_eq!(lock_code(Some(CharacterRef::Player(4))), 32772);
        assert_eq!(lock_code(None), 0xFFFF);
    }
}
