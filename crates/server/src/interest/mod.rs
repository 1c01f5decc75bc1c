//! Per-player interest management: the zone window and the entity lists.

mod scene;
mod tracker;

pub use scene::{SceneManager, REBUILD_DISTANCE};
pub use tracker::{VisibilityTracker, MAX_TRACKED};
