//! Tile-world simulation server library.

pub mod config;
pub mod entity;
pub mod error;
pub mod interest;
pub mod pathing;
pub mod server;
pub mod task;
pub mod template;
pub mod world;

// Re-export commonly used types
pub use config::Config;
pub use error::{CharacterRef, WorldError};
pub use server::{run, GameState};
pub use world::{Tile, World};
