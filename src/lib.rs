//! Maple Network Library
//!
//! Client-side session layer for the game connection: turns a partially
//! delivered byte stream into decrypted, opcode-tagged packets and forwards
//! the decoded entity events to the game world.
//!
//! ## Modules
//!
//! - `config` - Client configuration management
//! - `crypto` - Packet cipher (ISAAC keystream, header keys)
//! - `error` - Error types and result definitions
//! - `game` - Entity records and the world collaborator interface
//! - `net` - Transport, framing and session management
//! - `protocol` - Handshake, opcodes, dispatch and packet handlers

pub mod config;
pub mod crypto;
pub mod error;
pub mod game;
pub mod net;
pub mod protocol;

// Re-export commonly used types
pub use config::ClientConfig;
pub use error::{MapleError, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
