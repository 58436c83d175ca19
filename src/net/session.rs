//! Session management module
//!
//! A [`Session`] is the client end of one game connection. It owns:
//! - The transport it polls and writes to
//! - The stream framer and the connection cipher
//! - The queue outbound messages wait in until the session writes them
//!
//! Lifecycle:
//!
//! ```text
//! Handshaking --(server hello)--> Connected --(transport gone / write failed)--> Disconnected
//!      \                              \
//!       +--(bad hello)-----------------+--(cipher desync)--> Failed
//! ```
//!
//! Everything happens synchronously on the caller's thread. Handlers run
//! inside [`Session::read`] and never re-enter the session.

use std::sync::Arc;

use bytes::BytesMut;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::crypto::cipher::ConnectionCipher;
use crate::error::{MapleError, NetworkError, ProtocolError, Result, WriteStage};
use crate::game::world::World;
use crate::net::buffer::OutPacket;
use crate::net::encoder::seal;
use crate::net::framer::Framer;
use crate::net::transport::Transport;
use crate::protocol::dispatcher::{DispatchOutcome, Dispatcher};
use crate::protocol::handshake::Handshake;

/// Session state in the connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Waiting for the server hello
    Handshaking,
    /// Cipher established, packets flowing
    Connected,
    /// The transport went away or refused a write
    Disconnected,
    /// The stream can no longer be decoded
    Failed,
}

impl SessionState {
    /// Check if the session is still usable (not disconnected or failed)
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Handshaking | SessionState::Connected)
    }

    /// Get a human-readable name for the state
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Handshaking => "Handshaking",
            SessionState::Connected => "Connected",
            SessionState::Disconnected => "Disconnected",
            SessionState::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Traffic counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub bytes_received: u64,
    pub bytes_sent: u64,
    pub packets_received: u64,
    pub packets_sent: u64,
    /// Packets whose opcode had no handler
    pub packets_unhandled: u64,
    /// Packets a handler rejected
    pub packets_malformed: u64,
}

/// Cloneable handle for queueing outbound messages
///
/// Messages are written by the session, in queue order, on the next
/// [`Session::flush_outbound`].
#[derive(Debug, Clone)]
pub struct OutboundQueue {
    tx: mpsc::UnboundedSender<OutPacket>,
}

impl OutboundQueue {
    /// Queue a message. Returns false if the session is gone.
    pub fn send(&self, packet: OutPacket) -> bool {
        self.tx.send(packet).is_ok()
    }
}

/// Receive-side state that belongs to one connection
#[derive(Debug)]
struct Connection {
    state: SessionState,
    framer: Framer,
    cipher: Option<ConnectionCipher>,
    handshake: Option<Handshake>,
    /// Hello bytes received so far
    hello: BytesMut,
}

impl Connection {
    fn new() -> Self {
        Self {
            state: SessionState::Handshaking,
            framer: Framer::new(),
            cipher: None,
            handshake: None,
            hello: BytesMut::new(),
        }
    }

    fn set_state(&mut self, new_state: SessionState) {
        let old_state = self.state;
        if old_state == new_state {
            return;
        }
        self.state = new_state;
        debug!(
            old_state = %old_state,
            new_state = %new_state,
            "Session state changed"
        );
    }

    /// Leave the connected states. Partial packets are discarded.
    fn shut(&mut self, new_state: SessionState) {
        self.framer.reset();
        self.hello.clear();
        self.cipher = None;
        self.set_state(new_state);
    }

    fn fail(&mut self, error: MapleError) -> MapleError {
        warn!(error = %error, "Session failed");
        self.shut(SessionState::Failed);
        error
    }

    /// Feed one delivery. Returns the number of packets completed.
    fn feed(
        &mut self,
        bytes: &[u8],
        expected_version: Option<u16>,
        dispatcher: &Dispatcher,
        stats: &mut SessionStats,
        world: &mut dyn World,
    ) -> Result<usize> {
        match self.state {
            SessionState::Handshaking => {
                self.hello.extend_from_slice(bytes);
                let (handshake, consumed) = match Handshake::parse(&self.hello) {
                    Ok(Some(parsed)) => parsed,
                    Ok(None) => return Ok(0),
                    Err(e) => return Err(self.fail(e.into())),
                };

                if let Some(expected) = expected_version {
                    if handshake.version != expected {
                        return Err(self.fail(
                            ProtocolError::VersionMismatch {
                                expected,
                                actual: handshake.version,
                            }
                            .into(),
                        ));
                    }
                }

                info!(
                    version = handshake.version,
                    patch = %handshake.patch,
                    locale = handshake.locale,
                    "Handshake complete"
                );

                let rest = self.hello.split_off(consumed);
                self.hello.clear();
                self.cipher = Some(ConnectionCipher::for_client(&handshake.key_material()));
                self.handshake = Some(handshake);
                self.set_state(SessionState::Connected);

                self.frame(&rest, dispatcher, stats, world)
            }
            SessionState::Connected => self.frame(bytes, dispatcher, stats, world),
            SessionState::Disconnected | SessionState::Failed => {
                Err(NetworkError::NotConnected.into())
            }
        }
    }

    fn frame(
        &mut self,
        bytes: &[u8],
        dispatcher: &Dispatcher,
        stats: &mut SessionStats,
        world: &mut dyn World,
    ) -> Result<usize> {
        if bytes.is_empty() {
            return Ok(0);
        }
        let Some(cipher) = self.cipher.as_mut() else {
            return Err(ProtocolError::NoCipher.into());
        };

        let result = self.framer.process(bytes, cipher, |payload| {
            stats.packets_received += 1;
            match dispatcher.dispatch(payload, &mut *world) {
                DispatchOutcome::Handled => {}
                DispatchOutcome::Unhandled(_) => stats.packets_unhandled += 1,
                DispatchOutcome::Malformed(..) => stats.packets_malformed += 1,
            }
        });

        result.map_err(|e| self.fail(e.into()))
    }
}

/// Client end of one game connection
pub struct Session<T: Transport> {
    transport: T,
    conn: Connection,
    dispatcher: Arc<Dispatcher>,
    expected_version: Option<u16>,
    outbound_tx: mpsc::UnboundedSender<OutPacket>,
    outbound_rx: mpsc::UnboundedReceiver<OutPacket>,
    stats: SessionStats,
}

impl<T: Transport> Session<T> {
    /// Create a session over a freshly connected transport
    pub fn new(transport: T, dispatcher: Arc<Dispatcher>) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        Self {
            transport,
            conn: Connection::new(),
            dispatcher,
            expected_version: None,
            outbound_tx,
            outbound_rx,
            stats: SessionStats::default(),
        }
    }

    /// Reject server hellos announcing any other version
    pub fn with_expected_version(mut self, version: u16) -> Self {
        self.expected_version = Some(version);
        self
    }

    // ============ Properties ============

    pub fn state(&self) -> SessionState {
        self.conn.state
    }

    /// Whether packets can be exchanged
    pub fn is_connected(&self) -> bool {
        self.conn.state == SessionState::Connected
    }

    /// The server hello of the current connection
    pub fn handshake(&self) -> Option<&Handshake> {
        self.conn.handshake.as_ref()
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Reassembly state of the receive stream
    pub fn framer(&self) -> &Framer {
        &self.conn.framer
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    // ============ Receiving ============

    /// Poll the transport once and process whatever it delivered.
    ///
    /// Returns the number of packets dispatched. A transport that reports
    /// it is gone moves the session to `Disconnected`; that is a state
    /// change for the caller to observe, not an error.
    pub fn read(&mut self, world: &mut dyn World) -> Result<usize> {
        if !self.conn.state.is_active() {
            return Err(NetworkError::NotConnected.into());
        }

        let bytes = self.transport.receive();
        self.stats.bytes_received += bytes.len() as u64;
        let completed = if bytes.is_empty() {
            0
        } else {
            trace!(len = bytes.len(), "Processing delivery");
            self.conn.feed(
                bytes,
                self.expected_version,
                &self.dispatcher,
                &mut self.stats,
                world,
            )?
        };

        if !self.transport.is_connected() {
            info!("Transport disconnected");
            self.conn.shut(SessionState::Disconnected);
        }

        Ok(completed)
    }

    /// Process bytes obtained outside [`Session::read`]
    pub fn process(&mut self, bytes: &[u8], world: &mut dyn World) -> Result<usize> {
        self.stats.bytes_received += bytes.len() as u64;
        self.conn.feed(
            bytes,
            self.expected_version,
            &self.dispatcher,
            &mut self.stats,
            world,
        )
    }

    // ============ Sending ============

    /// Seal and write one message: header, then payload.
    ///
    /// If either write fails the rest of the message is abandoned and the
    /// session is disconnected; the send key has already moved on.
    pub fn write(&mut self, packet: OutPacket) -> Result<()> {
        if self.conn.state != SessionState::Connected {
            return Err(NetworkError::NotConnected.into());
        }
        if !self.transport.is_connected() {
            self.conn.shut(SessionState::Disconnected);
            return Err(NetworkError::ConnectionClosed.into());
        }

        let opcode = packet.opcode();
        let cipher = self.conn.cipher.as_mut().ok_or(ProtocolError::NoCipher)?;
        let mut payload = packet.into_bytes();
        let header = seal(cipher, &mut payload)?;

        for (stage, bytes) in [
            (WriteStage::Header, &header[..]),
            (WriteStage::Payload, &payload[..]),
        ] {
            if !self.transport.send(bytes) {
                warn!(opcode = opcode, stage = %stage, "Write failed");
                self.conn.shut(SessionState::Disconnected);
                return Err(NetworkError::WriteFailed { stage }.into());
            }
        }

        self.stats.packets_sent += 1;
        self.stats.bytes_sent += (header.len() + payload.len()) as u64;
        trace!(opcode = opcode, length = payload.len(), "Packet sent");
        Ok(())
    }

    /// Handle for queueing messages from elsewhere
    pub fn outbound(&self) -> OutboundQueue {
        OutboundQueue {
            tx: self.outbound_tx.clone(),
        }
    }

    /// Write every queued message, in order. Stops at the first failure.
    pub fn flush_outbound(&mut self) -> Result<usize> {
        let mut written = 0;
        while let Ok(packet) = self.outbound_rx.try_recv() {
            self.write(packet)?;
            written += 1;
        }
        Ok(written)
    }

    // ============ Lifecycle ============

    /// Replace the transport and start over from the handshake.
    ///
    /// Partial packets, cipher state and queued messages of the old
    /// connection are discarded.
    pub fn reconnect(&mut self, transport: T) {
        self.transport.close();
        self.transport = transport;
        self.conn = Connection::new();

        let mut dropped = 0;
        while self.outbound_rx.try_recv().is_ok() {
            dropped += 1;
        }
        info!(dropped_messages = dropped, "Session reconnecting");
    }

    /// Close the transport
    pub fn close(&mut self) {
        self.transport.close();
        self.conn.shut(SessionState::Disconnected);
    }
}

impl<T: Transport> std::fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.conn.state)
            .field("framer", &self.conn.framer)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::world::{EventLog, WorldEvent};
    use crate::net::transport::MemoryTransport;
    use crate::protocol::opcodes::RecvOpcode;
    use crate::protocol::packets::{GeneralChatPacket, OutgoingPacket};

    fn hello() -> Handshake {
        Handshake {
            version: 83,
            patch: "1".to_string(),
            send_iv: [0x46, 0x72, 0x7a, 0xd2],
            recv_iv: [0x52, 0x30, 0x78, 0xe8],
            locale: 8,
        }
    }

    fn session() -> Session<MemoryTransport> {
        Session::new(
            MemoryTransport::new(),
            Arc::new(Dispatcher::with_map_object_handlers()),
        )
    }

    fn server_cipher() -> ConnectionCipher {
        ConnectionCipher::for_server(&hello().key_material())
    }

    fn sealed(cipher: &mut ConnectionCipher, packet: OutPacket) -> Vec<u8> {
        let mut payload = packet.into_bytes();
        let header = seal(cipher, &mut payload).unwrap();
        let mut wire = header.to_vec();
        wire.extend_from_slice(&payload);
        wire
    }

    fn remove_char(id: i32) -> OutPacket {
        let mut out = OutPacket::new(RecvOpcode::RemoveChar);
        out.write_int(id);
        out
    }

    #[test]
    fn test_handshake_then_packets_in_same_delivery() {
        let mut session = session();
        let mut server = server_cipher();
        let mut log = EventLog::new();

        let mut delivery = hello().encode().unwrap();
        delivery.extend(sealed(&mut server, remove_char(7)));
        session.transport_mut().push_inbound(delivery);

        assert_eq!(session.read(&mut log).unwrap(), 1);
        assert_eq!(session.state(), SessionState::Connected);
        assert_eq!(log.events(), &[WorldEvent::CharacterRemoved(7)]);
    }

    #[test]
    fn test_split_handshake() {
        let mut session = session();
        let mut log = EventLog::new();
        let bytes = hello().encode().unwrap();

        session.process(&bytes[..5], &mut log).unwrap();
        assert_eq!(session.state(), SessionState::Handshaking);

        session.process(&bytes[5..], &mut log).unwrap();
        assert_eq!(session.state(), SessionState::Connected);
        assert_eq!(session.handshake(), Some(&hello()));
    }

    #[test]
    fn test_version_mismatch_fails() {
        let mut session = session().with_expected_version(62);
        let mut log = EventLog::new();

        let result = session.process(&hello().encode().unwrap(), &mut log);
        assert!(matches!(
            result,
            Err(MapleError::Protocol(ProtocolError::VersionMismatch {
                expected: 62,
                actual: 83
            }))
        ));
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[test]
    fn test_cipher_desync_is_fatal() {
        let mut session = session();
        let mut log = EventLog::new();
        session.process(&hello().encode().unwrap(), &mut log).unwrap();

        let mut wire = sealed(&mut server_cipher(), remove_char(7));
        wire[1] ^= 0x40;

        let result = session.process(&wire, &mut log);
        assert!(matches!(result, Err(MapleError::Cipher(_))));
        assert_eq!(session.state(), SessionState::Failed);
        assert!(session.framer().is_idle());
        assert!(session.read(&mut log).is_err());
    }

    #[test]
    fn test_malformed_packet_does_not_end_session() {
        let mut session = session();
        let mut server = server_cipher();
        let mut log = EventLog::new();
        session.process(&hello().encode().unwrap(), &mut log).unwrap();

        let mut short = OutPacket::new(RecvOpcode::RemoveChar);
        short.write_short(1);
        let mut wire = sealed(&mut server, short);
        wire.extend(sealed(&mut server, OutPacket::new(999u16)));
        wire.extend(sealed(&mut server, remove_char(9)));

        assert_eq!(session.process(&wire, &mut log).unwrap(), 3);
        assert!(session.is_connected());
        assert_eq!(log.events(), &[WorldEvent::CharacterRemoved(9)]);

        let stats = session.stats();
        assert_eq!(stats.packets_received, 3);
        assert_eq!(stats.packets_malformed, 1);
        assert_eq!(stats.packets_unhandled, 1);
    }

    #[test]
    fn test_write_sends_header_then_payload() {
        let mut session = session();
        let mut log = EventLog::new();
        session.process(&hello().encode().unwrap(), &mut log).unwrap();

        session
            .write(GeneralChatPacket::new("hello", false).to_packet())
            .unwrap();

        let writes = session.transport_mut().take_writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].len(), 4);

        let mut server = server_cipher();
        let mut header = [0u8; 4];
        header.copy_from_slice(&writes[0]);
        let length = server.decode_header(header).unwrap();
        assert_eq!(usize::from(length), writes[1].len());

        let mut payload = writes[1].clone();
        server.decrypt(&mut payload);
        assert_eq!(
            payload,
            GeneralChatPacket::new("hello", false).to_packet().as_bytes()
        );
    }

    #[test]
    fn test_failed_header_write_skips_payload() {
        let mut session = session();
        let mut log = EventLog::new();
        session.process(&hello().encode().unwrap(), &mut log).unwrap();
        session.transport_mut().fail_writes_after(0);

        let result = session.write(GeneralChatPacket::new("hi", false).to_packet());
        assert!(matches!(
            result,
            Err(MapleError::Network(NetworkError::WriteFailed {
                stage: WriteStage::Header
            }))
        ));
        assert!(session.transport().writes().is_empty());
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[test]
    fn test_failed_payload_write_aborts_message() {
        let mut session = session();
        let mut log = EventLog::new();
        session.process(&hello().encode().unwrap(), &mut log).unwrap();
        session.transport_mut().fail_writes_after(1);

        let result = session.write(GeneralChatPacket::new("hi", false).to_packet());
        assert!(matches!(
            result,
            Err(MapleError::Network(NetworkError::WriteFailed {
                stage: WriteStage::Payload
            }))
        ));
        assert_eq!(session.transport().writes().len(), 1);
        assert_eq!(session.transport().writes()[0].len(), 4);
        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(session.stats().packets_sent, 0);
    }

    #[test]
    fn test_flush_stops_at_failed_message() {
        let mut session = session();
        let mut log = EventLog::new();
        session.process(&hello().encode().unwrap(), &mut log).unwrap();

        let queue = session.outbound();
        for message in ["first", "second", "third"] {
            assert!(queue.send(GeneralChatPacket::new(message, false).to_packet()));
        }
        // First message fits, second loses its payload.
        session.transport_mut().fail_writes_after(3);

        let result = session.flush_outbound();
        assert!(matches!(
            result,
            Err(MapleError::Network(NetworkError::WriteFailed {
                stage: WriteStage::Payload
            }))
        ));
        assert_eq!(session.transport().writes().len(), 3);
        assert_eq!(session.stats().packets_sent, 1);
        assert_eq!(session.state(), SessionState::Disconnected);

        // Nothing more goes out on a disconnected session.
        assert!(session.flush_outbound().is_err());
        assert_eq!(session.transport().writes().len(), 3);
    }

    #[test]
    fn test_write_before_handshake() {
        let mut session = session();
        assert!(matches!(
            session.write(GeneralChatPacket::new("hi", false).to_packet()),
            Err(MapleError::Network(NetworkError::NotConnected))
        ));
    }

    #[test]
    fn test_outbound_queue_flushes_in_order() {
        let mut session = session();
        let mut log = EventLog::new();
        session.process(&hello().encode().unwrap(), &mut log).unwrap();

        let queue = session.outbound();
        let other = queue.clone();
        assert!(queue.send(GeneralChatPacket::new("first", false).to_packet()));
        assert!(other.send(GeneralChatPacket::new("second", true).to_packet()));

        assert_eq!(session.flush_outbound().unwrap(), 2);

        let writes = session.transport_mut().take_writes();
        assert_eq!(writes.len(), 4);

        let mut server = server_cipher();
        for (i, expected) in ["first", "second"].iter().enumerate() {
            let mut header = [0u8; 4];
            header.copy_from_slice(&writes[i * 2]);
            server.decode_header(header).unwrap();
            let mut payload = writes[i * 2 + 1].clone();
            server.decrypt(&mut payload);
            assert_eq!(&payload[4..4 + expected.len()], expected.as_bytes());
        }
        assert_eq!(session.stats().packets_sent, 2);
    }

    #[test]
    fn test_disconnect_discards_partial_packet() {
        let mut session = session();
        let mut server = server_cipher();
        let mut log = EventLog::new();
        session.process(&hello().encode().unwrap(), &mut log).unwrap();

        let wire = sealed(&mut server, remove_char(7));
        session.transport_mut().push_inbound(wire[..6].to_vec());
        session.read(&mut log).unwrap();
        assert!(!session.framer().is_idle());

        session.transport_mut().disconnect();
        session.read(&mut log).unwrap();
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(session.framer().is_idle());
    }

    #[test]
    fn test_reconnect_starts_fresh() {
        let mut session = session();
        let mut log = EventLog::new();
        session.process(&hello().encode().unwrap(), &mut log).unwrap();
        session.outbound().send(GeneralChatPacket::new("stale", false).to_packet());
        session.close();
        assert_eq!(session.state(), SessionState::Disconnected);

        let mut transport = MemoryTransport::new();
        let mut delivery = hello().encode().unwrap();
        delivery.extend(sealed(&mut server_cipher(), remove_char(3)));
        transport.push_inbound(delivery);

        session.reconnect(transport);
        assert_eq!(session.state(), SessionState::Handshaking);
        assert_eq!(session.flush_outbound().unwrap(), 0);

        assert_eq!(session.read(&mut log).unwrap(), 1);
        assert_eq!(log.events(), &[WorldEvent::CharacterRemoved(3)]);
    }
}
