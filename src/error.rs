//! Error handling module
//!
//! Defines the error taxonomy for the client session layer. Which layer an
//! error comes from decides what the session does with it:
//!
//! - `PacketError`: a single payload did not decode. Logged at the dispatch
//!   boundary, the connection continues.
//! - `CipherError`: the header stream is out of step with the server. Fatal
//!   to the connection, the caller must reconnect.
//! - `NetworkError`: the transport went away or refused a write.
//! - `ProtocolError`: handshake and framing limits.

use thiserror::Error;

/// Main error type for the session layer
#[derive(Error, Debug)]
pub enum MapleError {
    /// Transport-related errors
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// Handshake and framing errors
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Header/key stream errors (fatal for the connection)
    #[error("Cipher error: {0}")]
    Cipher(#[from] CipherError),

    /// Payload decode errors
    #[error("Packet error: {0}")]
    Packet(#[from] PacketError),
}

impl MapleError {
    /// Whether the session can keep going after this error
    pub fn is_fatal(&self) -> bool {
        !matches!(self, MapleError::Packet(_))
    }
}

/// Transport-specific errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Not connected")]
    NotConnected,

    #[error("Connection timeout")]
    Timeout,

    #[error("Connect failed: {0}")]
    ConnectFailed(String),

    #[error("Write failed while sending packet {stage}")]
    WriteFailed { stage: WriteStage },
}

/// Which half of an outbound message the transport refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStage {
    Header,
    Payload,
}

impl std::fmt::Display for WriteStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteStage::Header => write!(f, "header"),
            WriteStage::Payload => write!(f, "payload"),
        }
    }
}

/// Handshake and framing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Malformed handshake: {0}")]
    MalformedHandshake(String),

    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: u16, actual: u16 },

    #[error("Packet too large: {size} bytes (max: {max})")]
    PacketTooLarge { size: usize, max: usize },

    #[error("Packet too small: {size} bytes (min: {min})")]
    PacketTooSmall { size: usize, min: usize },

    #[error("Session has no cipher, handshake not completed")]
    NoCipher,
}

/// Cipher state errors. Any of these means the receive stream can no
/// longer be decoded.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherError {
    #[error("Header desync: expected key word {expected:#06x}, got {actual:#06x}")]
    Desync { expected: u16, actual: u16 },

    #[error("Header encodes invalid payload length {0}")]
    InvalidLength(u16),
}

/// Payload decode errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PacketError {
    #[error("Insufficient data: needed {needed} bytes, {remaining} remaining")]
    InsufficientData { needed: usize, remaining: usize },
}

/// Result type alias for session-layer operations
pub type Result<T> = std::result::Result<T, MapleError>;
