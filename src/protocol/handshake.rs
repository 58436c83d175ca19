//! Handshake protocol handler
//!
//! The first thing the server sends after connect is an unencrypted hello
//! carrying the protocol version and the IVs for both directions:
//!
//! ```text
//! u16    length of the rest
//! u16    version
//! string patch (u16 length prefix)
//! [u8;4] send IV (client -> server)
//! [u8;4] recv IV (server -> client)
//! u8     locale
//! ```

use tracing::debug;

use crate::crypto::cipher::KeyMaterial;
use crate::error::{PacketError, ProtocolError};
use crate::net::buffer::{InPacket, OutPacket};

/// Length of the prefix that announces the hello size
const LENGTH_PREFIX: usize = 2;

/// Decoded server hello
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub version: u16,
    pub patch: String,
    pub send_iv: [u8; 4],
    pub recv_iv: [u8; 4],
    pub locale: u8,
}

impl Handshake {
    /// Try to parse a hello from the start of `data`.
    ///
    /// Returns `Ok(None)` while the hello is still incomplete, or the
    /// hello and the number of bytes it occupied.
    pub fn parse(data: &[u8]) -> Result<Option<(Self, usize)>, ProtocolError> {
        if data.len() < LENGTH_PREFIX {
            return Ok(None);
        }

        let length = usize::from(u16::from_le_bytes([data[0], data[1]]));
        let total = LENGTH_PREFIX + length;
        if data.len() < total {
            return Ok(None);
        }

        let mut recv = InPacket::new(&data[LENGTH_PREFIX..total]);
        let handshake = Self::decode(&mut recv).map_err(|e| {
            ProtocolError::MalformedHandshake(e.to_string())
        })?;

        if recv.has_remaining() {
            debug!(
                trailing = recv.remaining(),
                "Ignoring trailing handshake bytes"
            );
        }

        Ok(Some((handshake, total)))
    }

    fn decode(recv: &mut InPacket<'_>) -> Result<Self, PacketError> {
        let version = recv.read_ushort()?;
        let patch = recv.read_string()?;

        let mut send_iv = [0u8; 4];
        send_iv.copy_from_slice(recv.read_bytes(4)?);
        let mut recv_iv = [0u8; 4];
        recv_iv.copy_from_slice(recv.read_bytes(4)?);

        let locale = recv.read_ubyte()?;

        Ok(Self {
            version,
            patch,
            send_iv,
            recv_iv,
            locale,
        })
    }

    /// Encode the hello as the server sends it.
    ///
    /// Fails if the body does not fit the `u16` length prefix.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        // OutPacket always starts with a u16; use it as the length slot.
        let mut out = OutPacket::new(0u16);
        out.write_ushort(self.version)
            .write_string(&self.patch)
            .write_bytes(&self.send_iv)
            .write_bytes(&self.recv_iv)
            .write_ubyte(self.locale);

        let mut bytes = out.into_bytes().to_vec();
        let size = bytes.len() - LENGTH_PREFIX;
        let length = u16::try_from(size).map_err(|_| ProtocolError::PacketTooLarge {
            size,
            max: u16::MAX as usize,
        })?;
        bytes[..LENGTH_PREFIX].copy_from_slice(&length.to_le_bytes());
        Ok(bytes)
    }

    /// Key material for the connection cipher
    pub fn key_material(&self) -> KeyMaterial {
        KeyMaterial {
            version: self.version,
            send_iv: self.send_iv,
            recv_iv: self.recv_iv,
        }
    }
}
