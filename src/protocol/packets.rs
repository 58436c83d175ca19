//! Outgoing packet definitions
//!
//! Typed client -> server messages. Each knows its opcode and how to lay
//! out its fields after it.

use crate::net::buffer::OutPacket;
use crate::protocol::opcodes::SendOpcode;

/// Outgoing packet trait
pub trait OutgoingPacket {
    /// The packet opcode
    const OPCODE: SendOpcode;

    /// Write the fields that follow the opcode
    fn encode(&self, out: &mut OutPacket);

    /// Build the complete payload, opcode first
    fn to_packet(&self) -> OutPacket {
        let mut out = OutPacket::new(Self::OPCODE);
        self.encode(&mut out);
        out
    }
}

/// Chat message to everyone on the map
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneralChatPacket {
    pub message: String,
    /// Whether the message also shows in a speech bubble
    pub show: bool,
}

impl GeneralChatPacket {
    pub fn new(message: impl Into<String>, show: bool) -> Self {
        Self {
            message: message.into(),
            show,
        }
    }
}

impl OutgoingPacket for GeneralChatPacket {
    const OPCODE: SendOpcode = SendOpcode::GeneralChat;

    fn encode(&self, out: &mut OutPacket) {
        out.write_string(&self.message).write_bool(self.show);
    }
}
