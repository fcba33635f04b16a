//! Transport seam between the hub and the sockets it writes to.

use std::fmt;
use std::net::IpAddr;

use uuid::Uuid;

use crate::error::Result;

/// Unique identifier of one accepted connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Generate a fresh random id
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A bidirectional message stream as seen by the hub.
///
/// `send` must never block: implementations queue the frame for a single
/// writer that owns the underlying stream, so every write to one connection
/// is serialized no matter who emits it. Any error from `send` is treated as
/// a dead peer.
pub trait Connection: Send + Sync + 'static {
    /// Stable id of this connection
    fn id(&self) -> ConnectionId;

    /// Resolved source address
    fn remote_addr(&self) -> IpAddr;

    /// Queue a text frame for delivery
    fn send(&self, text: &str) -> Result<()>;

    /// Close the outbound stream; later sends fail
    fn close(&self);
}
