//! Cooperative per-entity scheduling.

mod scheduler;
mod state;
mod turn;

pub use scheduler::{run_until_quiescent, Event, Executor, Resume, Scheduler, TaskSlot};
pub use state::{MessageKind, Task, TaskState, Wait};
pub use turn::CharacterTurn;
