//! Transport abstraction module
//!
//! The session never opens or closes sockets itself. It polls a
//! [`Transport`] for whatever bytes are ready and hands it complete writes.
//! Delivery boundaries are arbitrary; reassembly is the framer's job.
//!
//! Two implementations:
//! - [`TcpTransport`] over a connected `tokio::net::TcpStream`, polled
//!   without blocking
//! - [`MemoryTransport`], an in-memory double for tests and benchmarks

use std::collections::VecDeque;
use std::io::ErrorKind;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::error::NetworkError;

/// Maximum read buffer size (64KB)
const MAX_BUFFER_SIZE: usize = 65536;

/// Byte-level connection the session reads from and writes to
pub trait Transport: Send {
    /// Bytes delivered since the last call. An empty slice means nothing
    /// is ready yet; it does not mean the connection is gone.
    fn receive(&mut self) -> &[u8];

    /// Whether the connection is still live
    fn is_connected(&self) -> bool;

    /// Write all of `bytes`. Returns false if the write did not complete.
    fn send(&mut self, bytes: &[u8]) -> bool;

    /// Drop the connection
    fn close(&mut self) {}
}

/// TCP transport for a connected game server
pub struct TcpTransport {
    stream: Option<TcpStream>,
    read_buffer: Box<[u8]>,
}

impl TcpTransport {
    /// Create a new TCP transport
    pub fn new(stream: TcpStream) -> Self {
        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "Failed to set TCP_NODELAY");
        }

        Self {
            stream: Some(stream),
            read_buffer: vec![0u8; MAX_BUFFER_SIZE].into_boxed_slice(),
        }
    }

    /// Connect to `address`, giving up after `limit`
    pub async fn connect(address: &str, limit: Duration) -> Result<Self, NetworkError> {
        match timeout(limit, TcpStream::connect(address)).await {
            Ok(Ok(stream)) => Ok(Self::new(stream)),
            Ok(Err(e)) => Err(NetworkError::ConnectFailed(format!("{}: {}", address, e))),
            Err(_) => Err(NetworkError::Timeout),
        }
    }

    /// Get a reference to the underlying TCP stream, if still open
    pub fn get_ref(&self) -> Option<&TcpStream> {
        self.stream.as_ref()
    }

    /// Wait until the socket has bytes to read (or has closed)
    pub async fn readable(&self) -> std::io::Result<()> {
        match &self.stream {
            Some(stream) => stream.readable().await,
            None => Err(ErrorKind::NotConnected.into()),
        }
    }
}

impl Transport for TcpTransport {
    fn receive(&mut self) -> &[u8] {
        let Some(stream) = &self.stream else {
            return &[];
        };

        match stream.try_read(&mut self.read_buffer) {
            Ok(0) => {
                debug!("Server closed the connection");
                self.stream = None;
                &[]
            }
            Ok(n) => {
                trace!(len = n, "Received bytes");
                &self.read_buffer[..n]
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => &[],
            Err(e) => {
                warn!(error = %e, "Read failed");
                self.stream = None;
                &[]
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn send(&mut self, bytes: &[u8]) -> bool {
        let Some(stream) = &self.stream else {
            return false;
        };

        let mut written = 0;
        while written < bytes.len() {
            match stream.try_write(&bytes[written..]) {
                Ok(0) => {
                    self.stream = None;
                    return false;
                }
                Ok(n) => written += n,
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    warn!(
                        written = written,
                        total = bytes.len(),
                        "Socket not writable, aborting write"
                    );
                    // Part of the message is on the wire; the stream is corrupt.
                    if written > 0 {
                        self.stream = None;
                    }
                    return false;
                }
                Err(e) => {
                    warn!(error = %e, "Write failed");
                    self.stream = None;
                    return false;
                }
            }
        }
        true
    }

    fn close(&mut self) {
        if self.stream.take().is_some() {
            debug!("Closed TCP connection");
        }
    }
}

/// In-memory transport
///
/// Inbound deliveries are queued chunks returned one per `receive` call.
/// Every successful `send` is recorded as a separate write.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    inbound: VecDeque<Vec<u8>>,
    current: Vec<u8>,
    writes: Vec<Vec<u8>>,
    connected: bool,
    fail_after: Option<usize>,
}

impl MemoryTransport {
    /// Create a connected transport with nothing queued
    pub fn new() -> Self {
        Self {
            connected: true,
            ..Self::default()
        }
    }

    /// Queue one delivery
    pub fn push_inbound(&mut self, chunk: impl Into<Vec<u8>>) {
        self.inbound.push_back(chunk.into());
    }

    /// Number of deliveries not yet received
    pub fn pending_inbound(&self) -> usize {
        self.inbound.len()
    }

    /// Writes that went through, in order
    pub fn writes(&self) -> &[Vec<u8>] {
        &self.writes
    }

    /// Take the recorded writes
    pub fn take_writes(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.writes)
    }

    /// Refuse every write after `count` more have succeeded
    pub fn fail_writes_after(&mut self, count: usize) {
        self.fail_after = Some(self.writes.len() + count);
    }

    /// Simulate the remote end going away
    pub fn disconnect(&mut self) {
        self.connected = false;
    }
}

impl Transport for MemoryTransport {
    fn receive(&mut self) -> &[u8] {
        self.current = self.inbound.pop_front().unwrap_or_default();
        &self.current
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn send(&mut self, bytes: &[u8]) -> bool {
        if !self.connected {
            return false;
        }
        if let Some(limit) = self.fail_after {
            if self.writes.len() >= limit {
                return false;
            }
        }
        self.writes.push(bytes.to_vec());
        true
    }

    fn close(&mut self) {
        self.connected = false;
    }
}
