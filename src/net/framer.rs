//! Stream framer
//!
//! Reassembles the receive stream into whole payloads. The transport may
//! cut the stream anywhere: inside a header, inside a payload, or between
//! several packets coalesced into one delivery. The framer keeps just
//! enough state to carry on where the last delivery stopped.
//!
//! ```text
//! idle --(4 header bytes)--> assembling --(target_length bytes)--> idle
//!  ^  \__ fewer than 4: staged, still idle
//!  |                          \__ short payload: cursor advances, wait
//!  +---- decrypt, emit, continue with the rest of the delivery
//! ```

use tracing::trace;

use crate::crypto::cipher::{ConnectionCipher, HEADER_LENGTH};
use crate::error::CipherError;

/// Length of the opcode at the start of every payload
pub const OPCODE_LENGTH: usize = 2;

/// Smallest complete unit on the wire: header plus opcode
pub const MIN_PACKET_LENGTH: usize = HEADER_LENGTH + OPCODE_LENGTH;

/// Largest payload a header can announce
pub const MAX_PACKET_LENGTH: usize = u16::MAX as usize;

/// Reassembly state for one connection's receive stream
pub struct Framer {
    buffer: Box<[u8]>,
    /// Payload bytes filled so far
    cursor: usize,
    /// Length of the payload being assembled, 0 when idle
    target_length: usize,
    header: [u8; HEADER_LENGTH],
    header_fill: usize,
}

impl Framer {
    pub fn new() -> Self {
        Self {
            buffer: vec![0u8; MAX_PACKET_LENGTH].into_boxed_slice(),
            cursor: 0,
            target_length: 0,
            header: [0u8; HEADER_LENGTH],
            header_fill: 0,
        }
    }

    /// Whether the next bytes belong to a header
    #[inline]
    pub fn is_idle(&self) -> bool {
        self.target_length == 0
    }

    #[inline]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[inline]
    pub fn target_length(&self) -> usize {
        self.target_length
    }

    /// Header bytes staged while waiting for the rest of a header
    #[inline]
    pub fn pending_header_bytes(&self) -> usize {
        self.header_fill
    }

    /// Discard any partial packet
    pub fn reset(&mut self) {
        self.cursor = 0;
        self.target_length = 0;
        self.header_fill = 0;
    }

    /// Feed one delivery. `on_packet` is called once per completed payload,
    /// in order, with the decrypted bytes (opcode first). Returns the number
    /// of payloads completed.
    ///
    /// A cipher error leaves the stream undecodable; the caller must not
    /// feed this framer again without a fresh handshake and [`Framer::reset`].
    pub fn process<F>(
        &mut self,
        bytes: &[u8],
        cipher: &mut ConnectionCipher,
        mut on_packet: F,
    ) -> Result<usize, CipherError>
    where
        F: FnMut(&[u8]),
    {
        let mut input = bytes;
        let mut completed = 0;

        while !input.is_empty() {
            if self.target_length == 0 {
                let take = (HEADER_LENGTH - self.header_fill).min(input.len());
                self.header[self.header_fill..self.header_fill + take]
                    .copy_from_slice(&input[..take]);
                self.header_fill += take;
                input = &input[take..];

                if self.header_fill < HEADER_LENGTH {
                    break;
                }

                self.header_fill = 0;
                let length = cipher.decode_header(self.header)?;
                self.target_length = usize::from(length);
                self.cursor = 0;
                continue;
            }

            let to_write = (self.target_length - self.cursor).min(input.len());
            self.buffer[self.cursor..self.cursor + to_write].copy_from_slice(&input[..to_write]);
            self.cursor += to_write;
            input = &input[to_write..];

            if self.cursor >= self.target_length {
                let payload = &mut self.buffer[..self.target_length];
                cipher.decrypt(payload);
                trace!(length = payload.len(), "Packet reassembled");
                on_packet(payload);
                completed += 1;

                self.cursor = 0;
                self.target_length = 0;
            }
        }

        Ok(completed)
    }
}

impl Default for Framer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Framer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Framer")
            .field("cursor", &self.cursor)
            .field("target_length", &self.target_length)
            .field("header_fill", &self.header_fill)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::cipher::KeyMaterial;
    use crate::net::encoder::seal;

    fn keys() -> KeyMaterial {
        KeyMaterial {
            version: 83,
            send_iv: [1, 2, 3, 4],
            recv_iv: [9, 8, 7, 6],
        }
    }

    /// Encode payloads the way the server would
    fn wire(payloads: &[&[u8]]) -> Vec<u8> {
        let mut server = ConnectionCipher::for_server(&keys());
        let mut out = Vec::new();
        for payload in payloads {
            let mut body = payload.to_vec();
            let header = seal(&mut server, &mut body).unwrap();
            out.extend_from_slice(&header);
            out.extend_from_slice(&body);
        }
        out
    }

    fn feed(chunks: &[&[u8]]) -> Vec<Vec<u8>> {
        let mut framer = Framer::new();
        let mut cipher = ConnectionCipher::for_client(&keys());
        let mut packets = Vec::new();
        for chunk in chunks {
            framer
                .process(chunk, &mut cipher, |p| packets.push(p.to_vec()))
                .unwrap();
        }
        packets
    }

    #[test]
    fn test_single_packet() {
        let stream = wire(&[&[0xA1, 0x00, 7, 0, 0, 0]]);
        assert_eq!(feed(&[&stream]), vec![vec![0xA1, 0x00, 7, 0, 0, 0]]);
    }

    #[test]
    fn test_two_packets_in_one_delivery() {
        let stream = wire(&[&[0xA1, 0x00, 1, 0, 0, 0], &[0xED, 0x00, 2, 0, 0, 0, 5]]);
        let packets = feed(&[&stream]);

        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0], vec![0xA1, 0x00, 1, 0, 0, 0]);
        assert_eq!(packets[1], vec![0xED, 0x00, 2, 0, 0, 0, 5]);
    }

    #[test]
    fn test_byte_at_a_time() {
        let payloads: [&[u8]; 3] = [&[0xA0, 0x00, 1], &[0x01, 0x01, 2, 3, 4, 5], &[0x18, 0x01]];
        let stream = wire(&payloads);

        let whole = feed(&[&stream]);
        let chunks: Vec<&[u8]> = stream.chunks(1).collect();
        let split = feed(&chunks);

        assert_eq!(whole, split);
        assert_eq!(whole.len(), 3);
    }

    #[test]
    fn test_short_delivery_stays_idle() {
        let stream = wire(&[&[0xA1, 0x00, 1, 0, 0, 0]]);
        let mut framer = Framer::new();
        let mut cipher = ConnectionCipher::for_client(&keys());
        let mut count = 0;

        let done = framer
            .process(&stream[..3], &mut cipher, |_| count += 1)
            .unwrap();
        assert_eq!(done, 0);
        assert!(framer.is_idle());
        assert_eq!(framer.pending_header_bytes(), 3);

        framer
            .process(&stream[3..], &mut cipher, |_| count += 1)
            .unwrap();
        assert_eq!(count, 1);
        assert!(framer.is_idle());
        assert_eq!(framer.pending_header_bytes(), 0);
    }

    #[test]
    fn test_partial_payload() {
        let stream = wire(&[&[0xA1, 0x00, 1, 2, 3, 4, 5, 6]]);
        let mut framer = Framer::new();
        let mut cipher = ConnectionCipher::for_client(&keys());
        let mut count = 0;

        framer
            .process(&stream[..7], &mut cipher, |_| count += 1)
            .unwrap();
        assert_eq!(count, 0);
        assert_eq!(framer.target_length(), 8);
        assert_eq!(framer.cursor(), 3);

        framer
            .process(&stream[7..], &mut cipher, |_| count += 1)
            .unwrap();
        assert_eq!(count, 1);
        assert!(framer.is_idle());
    }

    #[test]
    fn test_corrupt_header_is_fatal() {
        let mut stream = wire(&[&[0xA1, 0x00, 1, 0, 0, 0]]);
        stream[0] ^= 0xFF;

        let mut framer = Framer::new();
        let mut cipher = ConnectionCipher::for_client(&keys());
        let result = framer.process(&stream, &mut cipher, |_| {});

        assert!(matches!(result, Err(CipherError::Desync { .. })));
    }

    #[test]
    fn test_reset_discards_partial_packet() {
        let stream = wire(&[&[0xA1, 0x00, 1, 0, 0, 0]]);
        let mut framer = Framer::new();
        let mut cipher = ConnectionCipher::for_client(&keys());

        framer.process(&stream[..6], &mut cipher, |_| {}).unwrap();
        assert!(!framer.is_idle());

        framer.reset();
        assert!(framer.is_idle());
        assert_eq!(framer.cursor(), 0);
    }
}
