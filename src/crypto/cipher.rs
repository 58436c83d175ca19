//! Per-connection packet cipher
//!
//! Every packet on the wire is a 4-byte header followed by an encrypted
//! payload. The header hides the payload length behind a word derived from
//! the direction's header key; the payload is XORed with the direction's
//! ISAAC keystream.
//!
//! Header layout (little-endian):
//!
//! ```text
//! [ a: u16 ][ b: u16 ]    a = (header_key >> 16) ^ version
//!                         b = a ^ payload_length
//! ```
//!
//! Every header encode or decode advances the header key, so a header can
//! only be read with the key state of the packet it was written for. A
//! mismatch means the stream is out of step and cannot be recovered.

use std::fmt;

use tracing::trace;

use crate::crypto::isaac::Isaac;
use crate::error::CipherError;

/// Length of the obfuscated packet header
pub const HEADER_LENGTH: usize = 4;

/// Smallest payload a header may announce (the opcode)
pub const MIN_PAYLOAD_LENGTH: u16 = 2;

/// Salt folded into every keystream seed
const KEYSTREAM_SALT: u32 = 0x4D41_504C;

/// Key material exchanged in the handshake, from the client's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyMaterial {
    /// Protocol version announced by the server
    pub version: u16,
    /// IV for client -> server packets
    pub send_iv: [u8; 4],
    /// IV for server -> client packets
    pub recv_iv: [u8; 4],
}

/// Key state for one direction of a connection
#[derive(Clone)]
pub struct PacketKey {
    header_key: u32,
    version: u16,
    keystream: Isaac,
}

impl PacketKey {
    /// Create the key state for one direction
    pub fn new(iv: [u8; 4], version: u16) -> Self {
        let header_key = u32::from_le_bytes(iv);
        let keystream = Isaac::new(&[
            header_key,
            u32::from(version),
            header_key.rotate_left(16),
            KEYSTREAM_SALT,
        ]);

        Self {
            header_key,
            version,
            keystream,
        }
    }

    #[inline]
    fn header_word(&self) -> u16 {
        ((self.header_key >> 16) as u16) ^ self.version
    }

    /// Move to the next packet's key state
    #[inline]
    fn advance(&mut self) {
        self.header_key = self.header_key.rotate_left(9) ^ self.keystream.next_word();
    }

    /// Write the header for a payload of `length` bytes
    pub fn encode_header(&mut self, length: u16) -> [u8; HEADER_LENGTH] {
        let a = self.header_word();
        let b = a ^ length;
        self.advance();

        let mut header = [0u8; HEADER_LENGTH];
        header[..2].copy_from_slice(&a.to_le_bytes());
        header[2..].copy_from_slice(&b.to_le_bytes());
        header
    }

    /// Read the payload length from a header. The key only advances when
    /// the header checks out.
    pub fn decode_header(&mut self, header: [u8; HEADER_LENGTH]) -> Result<u16, CipherError> {
        let a = u16::from_le_bytes([header[0], header[1]]);
        let b = u16::from_le_bytes([header[2], header[3]]);

        let expected = self.header_word();
        if a != expected {
            return Err(CipherError::Desync {
                expected,
                actual: a,
            });
        }

        let length = a ^ b;
        if length < MIN_PAYLOAD_LENGTH {
            return Err(CipherError::InvalidLength(length));
        }

        self.advance();
        Ok(length)
    }

    /// Encrypt or decrypt `bytes` in place
    #[inline]
    pub fn transform(&mut self, bytes: &mut [u8]) {
        self.keystream.apply_keystream(bytes);
    }
}

impl fmt::Debug for PacketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PacketKey")
            .field("version", &self.version)
            .field("keystream", &self.keystream)
            .finish_non_exhaustive()
    }
}

/// Send and receive key state for one connection
///
/// Owned by exactly one session. Both halves are rebuilt from a fresh
/// handshake on reconnect; there is no other way to reset them.
#[derive(Clone)]
pub struct ConnectionCipher {
    send: PacketKey,
    recv: PacketKey,
}

impl ConnectionCipher {
    /// Cipher for the client end of a connection
    pub fn for_client(keys: &KeyMaterial) -> Self {
        Self {
            send: PacketKey::new(keys.send_iv, keys.version),
            recv: PacketKey::new(keys.recv_iv, 0xFFFF - keys.version),
        }
    }

    /// Cipher for the server end (mirror of [`ConnectionCipher::for_client`])
    pub fn for_server(keys: &KeyMaterial) -> Self {
        Self {
            send: PacketKey::new(keys.recv_iv, 0xFFFF - keys.version),
            recv: PacketKey::new(keys.send_iv, keys.version),
        }
    }

    /// Decode the payload length of the next incoming packet
    pub fn decode_header(&mut self, header: [u8; HEADER_LENGTH]) -> Result<u16, CipherError> {
        let length = self.recv.decode_header(header)?;
        trace!(length = length, "Decoded packet header");
        Ok(length)
    }

    /// Decrypt an incoming payload in place
    pub fn decrypt(&mut self, bytes: &mut [u8]) {
        self.recv.transform(bytes);
    }

    /// Produce the header for the next outgoing packet
    pub fn encode_header(&mut self, length: u16) -> [u8; HEADER_LENGTH] {
        self.send.encode_header(length)
    }

    /// Encrypt an outgoing payload in place
    pub fn encrypt(&mut self, bytes: &mut [u8]) {
        self.send.transform(bytes);
    }
}

impl fmt::Debug for ConnectionCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionCipher")
            .field("send", &self.send)
            .field("recv", &self.recv)
            .finish()
    }
}
