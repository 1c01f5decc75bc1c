//! Per-entity event queue and task slots.

use std::collections::{BTreeMap, VecDeque};

use tracing::trace;

use crate::error::{CharacterRef, WorldError};

use super::state::Task;

/// Named task slots. Each slot holds at most one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskSlot {
    /// Interactions: walking to something and acting on it.
    Normal,
    Sequence,
    SpotAnimation,
    Chat,
}

/// An occurrence raised against an entity, handled on its scheduler turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Walk { x: u16, y: u16, run: bool },
    LocClick { id: u16, x: u16, y: u16, run: bool },
    PublicChat { effects: u16, message: String },
    /// The entity changed position this tick.
    Moved,
    Logout,
}

/// Outcome of resuming a task once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resume {
    /// Wait condition not met yet.
    Pending,
    /// Moved to its next suspension point.
    Advanced,
    /// Done; the slot is freed.
    Finished,
}

/// Queue of raised events plus the active task per slot.
#[derive(Debug, Default)]
pub struct Scheduler {
    events: VecDeque<Event>,
    tasks: BTreeMap<TaskSlot, Task>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&mut self, event: Event) {
        self.events.push_back(event);
    }

    pub fn pop_event(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    pub fn has_events(&self) -> bool {
        !self.events.is_empty()
    }

    /// Start `task` in `slot`, discarding whatever ran there before.
    pub fn start(&mut self, slot: TaskSlot, task: Task) {
        if self.tasks.insert(slot, task).is_some() {
            trace!("Replaced task in slot {:?}", slot);
        }
    }

    pub fn cancel(&mut self, slot: TaskSlot) {
        self.tasks.remove(&slot);
    }

    pub fn task(&self, slot: TaskSlot) -> Option<&Task> {
        self.tasks.get(&slot)
    }

    pub fn active_slots(&self) -> Vec<TaskSlot> {
        self.tasks.keys().copied().collect()
    }

    /// Take a task out for resumption.
    pub fn take(&mut self, slot: TaskSlot) -> Option<Task> {
        self.tasks.remove(&slot)
    }

    /// Put a resumed task back unless its slot was refilled meanwhile, in
    /// which case the old continuation is dropped.
    pub fn restore(&mut self, slot: TaskSlot, task: Task) {
        self.tasks.entry(slot).or_insert(task);
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.tasks.clear();
    }
}

/// One entity's turn: handles its events and resumes its tasks.
pub trait Executor {
    fn who(&self) -> CharacterRef;

    /// Handle queued events until the queue is empty, including events raised
    /// while handling. Returns how many were handled.
    fn drain_events(&mut self) -> Result<usize, WorldError>;

    /// Resume every active task once. Returns whether any task advanced or finished.
    fn resume_tasks(&mut self) -> Result<bool, WorldError>;

    fn has_events(&self) -> bool;
}

/// Alternate event draining and task resumption until a pass changes
/// nothing. Returns the number of passes taken.
pub fn run_until_quiescent<E: Executor + ?Sized>(
    executor: &mut E,
    max_passes: u32,
) -> Result<u32, WorldError> {
    let mut passes = 0;
    loop {
        if passes >= max_passes {
            return Err(WorldError::SchedulerLivelock {
                who: executor.who(),
                passes,
            });
        }
        passes += 1;
        let drained = executor.drain_events()?;
        let progressed = executor.resume_tasks()?;
        if drained == 0 && !progressed && !executor.has_events() {
            return Ok(passes);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::state::{TaskState, Wait};

    /// Events count down; each resumed "task" raises an event until its budget runs out.
    struct Mock {
        events: VecDeque<u32>,
        raises_left: u32,
        handled: Vec<u32>,
    }

    impl Executor for Mock {
        fn who(&self) -> CharacterRef {
            CharacterRef::Npc(1)
        }

        fn drain_events(&mut self) -> Result<usize, WorldError> {
            let mut count = 0;
            while let Some(event) = self.events.pop_front() {
                self.handled.push(event);
                count += 1;
            }
            Ok(count)
        }

        fn resume_tasks(&mut self) -> Result<bool, WorldError> {
            if self.raises_left == 0 {
                return Ok(false);
            }
            self.raises_left -= 1;
            self.events.push_back(100 + self.raises_left);
            Ok(true)
        }

        fn has_events(&self) -> bool {
            !self.events.is_empty()
        }
    }

    #[test]
    fn test_event_raised_by_task_drains_same_tick() {
        let mut mock = Mock {
            events: VecDeque::from([1]),
            raises_left: 1,
            handled: Vec::new(),
        };
        let passes = run_until_quiescent(&mut mock, 8).unwrap();
        assert_eq!(mock.handled, vec![1, 100]);
        assert!(mock.events.is_empty());
        assert_eq!(passes, 3);
    }

    #[test]
    fn test_livelock_is_reported() {
        let mut mock = Mock {
            events: VecDeque::new(),
            raises_left: u32::MAX,
            handled: Vec::new(),
        };
        let err = run_until_quiescent(&mut mock, 16).unwrap_err();
        assert!(matches!(
            err,
            WorldError::SchedulerLivelock { who: CharacterRef::Npc(1), passes: 16 }
        ));
    }

    #[test]
    fn test_start_on_occupied_slot_discards_previous() {
        let mut scheduler = Scheduler::new();
        scheduler.start(TaskSlot::Normal, Task::new(Wait::Ticks { until: 5 }, TaskState::ExpireSequence));
        scheduler.start(TaskSlot::Normal, Task::new(Wait::Ticks { until: 9 }, TaskState::ExpireSequence));
        assert_eq!(scheduler.active_slots(), vec![TaskSlot::Normal]);
        assert_eq!(scheduler.task(TaskSlot::Normal).map(|t| t.wait), Some(Wait::Ticks { until: 9 }));
    }

    #[test]
    fn test_restore_keeps_task_started_during_resume() {
        let mut scheduler = Scheduler::new();
        scheduler.start(TaskSlot::Chat, Task::new(Wait::Ticks { until: 1 }, TaskState::ExpireSequence));
        let old = scheduler.take(TaskSlot::Chat).unwrap();
        scheduler.start(TaskSlot::Chat, Task::new(Wait::Ticks { until: 7 }, TaskState::ExpireSequence));
        scheduler.restore(TaskSlot::Chat, old);
        assert_eq!(scheduler.task(TaskSlot::Chat).map(|t| t.wait), Some(Wait::Ticks { until: 7 }));
    }
}
