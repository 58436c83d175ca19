//! Cryptography module
//!
//! Packet obfuscation for the game connection:
//! - ISAAC keystream generator
//! - Per-direction header keys and payload transform

pub mod cipher;
pub mod isaac;

// Re-export commonly used types
pub use cipher::{ConnectionCipher, KeyMaterial, PacketKey, HEADER_LENGTH};
pub use isaac::Isaac;
