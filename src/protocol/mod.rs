//! Protocol module
//!
//! Message-level protocol for the game connection:
//! - Handshake (server hello that seeds the cipher)
//! - Opcode tables
//! - Dispatch table and the map object handlers
//! - Shared sub-record parsers (look, movement)
//! - Outgoing packet definitions

pub mod dispatcher;
pub mod handshake;
pub mod look;
pub mod map_objects;
pub mod movement;
pub mod opcodes;
pub mod packets;

pub use dispatcher::{DispatchOutcome, Dispatcher, PacketHandler};
pub use handshake::Handshake;
pub use opcodes::{RecvOpcode, SendOpcode};
