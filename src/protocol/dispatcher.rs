//! Packet dispatch table
//!
//! Maps a receive opcode to the handler that decodes its payload. The table
//! is filled once at startup and then only read, so it can be shared
//! between sessions behind an `Arc` without locking.

use std::collections::HashMap;

use tracing::{debug, trace, warn};

use crate::error::PacketError;
use crate::game::world::World;
use crate::net::buffer::InPacket;
use crate::protocol::map_objects;
use crate::protocol::opcodes::RecvOpcode;

/// Decoder for one opcode's payload shape
///
/// `handle` receives a cursor positioned just after the opcode and makes
/// at most one call into the world. Handlers keep no state between calls.
pub trait PacketHandler: Send + Sync {
    fn handle(&self, recv: &mut InPacket<'_>, world: &mut dyn World) -> Result<(), PacketError>;
}

/// What happened to one dispatched payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The handler ran to completion
    Handled,
    /// No handler is registered for this opcode
    Unhandled(u16),
    /// The handler rejected the payload
    Malformed(u16, PacketError),
}

/// Opcode -> handler table
#[derive(Default)]
pub struct Dispatcher {
    handlers: HashMap<u16, Box<dyn PacketHandler>>,
}

impl Dispatcher {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with every map-object handler registered
    pub fn with_map_object_handlers() -> Self {
        let mut dispatcher = Self::new();
        map_objects::register_all(&mut dispatcher);
        dispatcher
    }

    /// Register a handler. A later registration for the same opcode
    /// replaces the earlier one.
    pub fn register<H>(&mut self, opcode: impl Into<u16>, handler: H)
    where
        H: PacketHandler + 'static,
    {
        self.handlers.insert(opcode.into(), Box::new(handler));
    }

    pub fn is_registered(&self, opcode: u16) -> bool {
        self.handlers.contains_key(&opcode)
    }

    /// Number of registered opcodes
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Decode and forward one decrypted payload (opcode first).
    ///
    /// Never fails: unknown opcodes and malformed payloads are logged and
    /// reported through the outcome.
    pub fn dispatch(&self, payload: &[u8], world: &mut dyn World) -> DispatchOutcome {
        let mut recv = InPacket::new(payload);
        let opcode = match recv.read_ushort() {
            Ok(opcode) => opcode,
            Err(e) => {
                warn!(length = payload.len(), error = %e, "Payload too short for an opcode");
                return DispatchOutcome::Malformed(0, e);
            }
        };

        let Some(handler) = self.handlers.get(&opcode) else {
            debug!(opcode = opcode, length = payload.len(), "Unhandled opcode");
            return DispatchOutcome::Unhandled(opcode);
        };

        trace!(
            opcode = opcode,
            name = RecvOpcode::from_u16(opcode).map(|op| op.name()).unwrap_or("custom"),
            length = payload.len(),
            "Dispatching packet"
        );

        match handler.handle(&mut recv, world) {
            Ok(()) => DispatchOutcome::Handled,
            Err(e) => {
                warn!(
                    opcode = opcode,
                    read_position = recv.read_position(),
                    error = %e,
                    "Malformed packet"
                );
                DispatchOutcome::Malformed(opcode, e)
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut opcodes: Vec<_> = self.handlers.keys().copied().collect();
        opcodes.sort_unstable();
        f.debug_struct("Dispatcher")
            .field("opcodes", &opcodes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::world::{EventLog, WorldEvent};

    struct RemoveNpcWith(i32);

    impl PacketHandler for RemoveNpcWith {
        fn handle(
            &self,
            _recv: &mut InPacket<'_>,
            world: &mut dyn World,
        ) -> Result<(), PacketError> {
            world.remove_npc(self.0);
            Ok(())
        }
    }

    #[test]
    fn test_unknown_opcode_is_noop() {
        let dispatcher = Dispatcher::with_map_object_handlers();
        let mut log = EventLog::new();

        let outcome = dispatcher.dispatch(&[0x34, 0x12, 1, 2, 3], &mut log);

        assert_eq!(outcome, DispatchOutcome::Unhandled(0x1234));
        assert!(log.is_empty());
    }

    #[test]
    fn test_registration_overwrites() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(500u16, RemoveNpcWith(1));
        dispatcher.register(500u16, RemoveNpcWith(2));
        assert_eq!(dispatcher.len(), 1);

        let mut log = EventLog::new();
        dispatcher.dispatch(&[0xF4, 0x01], &mut log);
        assert_eq!(log.events(), &[WorldEvent::NpcRemoved(2)]);
    }

    #[test]
    fn test_malformed_payload_is_reported() {
        let dispatcher = Dispatcher::with_map_object_handlers();
        let mut log = EventLog::new();

        // REMOVE_CHAR needs a 4-byte id.
        let outcome = dispatcher.dispatch(&[0xA1, 0x00, 1, 2], &mut log);

        assert!(matches!(
            outcome,
            DispatchOutcome::Malformed(161, PacketError::InsufficientData { .. })
        ));
        assert!(log.is_empty());
    }

    #[test]
    fn test_all_map_object_opcodes_registered() {
        let dispatcher = Dispatcher::with_map_object_handlers();
        for op in RecvOpcode::ALL {
            assert!(dispatcher.is_registered(op.as_u16()), "{op} missing");
        }
    }
}
