//! Outbound encoder
//!
//! Mirror image of the framer: produces the header for a payload and
//! encrypts the payload in place with the send half of the cipher.

use crate::crypto::cipher::{ConnectionCipher, HEADER_LENGTH, MIN_PAYLOAD_LENGTH};
use crate::error::ProtocolError;
use crate::net::framer::MAX_PACKET_LENGTH;

/// Seal an outgoing payload. Returns the header to send before it.
///
/// The send key advances only when the payload length is valid.
pub fn seal(
    cipher: &mut ConnectionCipher,
    payload: &mut [u8],
) -> Result<[u8; HEADER_LENGTH], ProtocolError> {
    let min = usize::from(MIN_PAYLOAD_LENGTH);
    if payload.len() < min {
        return Err(ProtocolError::PacketTooSmall {
            size: payload.len(),
            min,
        });
    }
    if payload.len() > MAX_PACKET_LENGTH {
        return Err(ProtocolError::PacketTooLarge {
            size: payload.len(),
            max: MAX_PACKET_LENGTH,
        });
    }

    let header = cipher.encode_header(payload.len() as u16);
    cipher.encrypt(payload);
    Ok(header)
}
