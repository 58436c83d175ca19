//! Game module
//!
//! The boundary between the session layer and the map state:
//! - Decoded entity records (characters, mobs, NPCs, drops, reactors)
//! - World collaborator traits the packet handlers call into

pub mod records;
pub mod world;

pub use records::Point;
pub use world::{EventLog, World, WorldEvent};
