//! Networking module
//!
//! Everything between the socket and the packet handlers:
//! - Transport abstraction (TCP and in-memory)
//! - Stream framing and outbound sealing
//! - Packet read/write buffers
//! - Session lifecycle and the outbound queue

pub mod buffer;
pub mod encoder;
pub mod framer;
pub mod session;
pub mod transport;

pub use buffer::{InPacket, OutPacket};
pub use session::{OutboundQueue, Session, SessionState, SessionStats};
pub use transport::{MemoryTransport, TcpTransport, Transport};
