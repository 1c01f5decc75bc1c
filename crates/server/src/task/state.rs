//! Task state machines.
//!
//! A task is a suspension point ([`Wait`]) plus the step to run once it is
//! satisfied ([`TaskState`]). Each resume either leaves the task waiting,
//! moves it to its next suspension point, or finishes it.

use crate::entity::{Character, PostAction};
use crate::pathing::{Destination, DestinationRect};

use super::scheduler::Resume;

/// Condition a task waits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    /// Until the world tick reaches `until`.
    Ticks { until: u64 },
    /// Until the character has nowhere left to walk.
    PathComplete,
}

impl Wait {
    pub fn after(now: u64, ticks: u32) -> Self {
        Wait::Ticks {
            until: now + ticks as u64,
        }
    }

    fn satisfied(&self, character: &Character, now: u64) -> bool {
        match *self {
            Wait::Ticks { until } => now >= until,
            Wait::PathComplete => character.path.is_empty() && character.teleport_target.is_none(),
        }
    }
}

/// Which message an expiry task clears.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Shout,
    Chat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Clear the current sequence.
    ExpireSequence,
    /// Spot animation delay elapsed; wait out its duration next.
    SpotAnimationStarted { duration: Option<u32> },
    /// Clear the current spot animation.
    ExpireSpotAnimation,
    /// Clear an overhead message at the end of the tick.
    ExpireMessage(MessageKind),
    /// Walking towards a footprint; face it once arrived.
    AwaitArrival { destination: DestinationRect },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Task {
    pub wait: Wait,
    pub state: TaskState,
}

impl Task {
    pub fn new(wait: Wait, state: TaskState) -> Self {
        Self { wait, state }
    }

    /// Run the next step if the wait condition holds.
    pub fn resume(&mut self, character: &mut Character, now: u64) -> Resume {
        if !self.wait.satisfied(character, now) {
            return Resume::Pending;
        }
        match self.state {
            TaskState::ExpireSequence => {
                character.sequence = None;
                Resume::Finished
            }
            TaskState::SpotAnimationStarted { duration } => match duration {
                Some(duration) => {
                    self.wait = Wait::after(now, duration);
                    self.state = TaskState::ExpireSpotAnimation;
                    Resume::Advanced
                }
                None => Resume::Finished,
            },
            TaskState::ExpireSpotAnimation => {
                character.spot_animation = None;
                Resume::Finished
            }
            TaskState::ExpireMessage(kind) => {
                character.post_actions.push(match kind {
                    MessageKind::Shout => PostAction::ClearShout,
                    MessageKind::Chat => PostAction::ClearChat,
                });
                Resume::Finished
            }
            TaskState::AwaitArrival { destination } => {
                let size = character.size as i32;
                if destination.reached(character.pos.x, character.pos.y, size) {
                    character.turn_to(destination.origin, destination.width, destination.length);
                }
                Resume::Finished
            }
        }
    }
}
