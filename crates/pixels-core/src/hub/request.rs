//! Requests accepted by the hub inbox
//!
//! Calls carry a reply slot and are always answered; notifications are
//! fire-and-forget.

use std::sync::Arc;

use tokio::sync::oneshot;

use crate::connection::{Connection, ConnectionId};
use crate::error::Result;
use crate::protocol::PixelUpdate;

/// Any request to the hub
pub enum HubRequest {
    /// Request/response
    Call(Call),
    /// Fire-and-forget
    Notify(Notification),
}

/// Requests that expect a reply
pub enum Call {
    /// Admit a new connection
    Register {
        /// Connection to admit
        conn: Arc<dyn Connection>,
        /// Admission outcome
        reply: oneshot::Sender<Result<()>>,
    },
    /// Number of live connections
    Count {
        /// Current count
        reply: oneshot::Sender<usize>,
    },
    /// Snapshot of hub bookkeeping
    Stats {
        /// Current stats
        reply: oneshot::Sender<HubStats>,
    },
}

/// Requests without a reply
#[derive(Debug)]
pub enum Notification {
    /// Remove a connection (idempotent)
    Deregister {
        /// Connection to remove
        id: ConnectionId,
    },
    /// Apply and fan out an update
    Broadcast {
        /// Originating connection
        src: ConnectionId,
        /// Validated update
        update: PixelUpdate,
    },
}

/// Hub bookkeeping at one point in the request order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HubStats {
    /// Live connections
    pub connections: usize,
    /// Distinct addresses with live connections
    pub addresses: usize,
    /// Addresses with rate-limiter state
    pub tracked_addresses: usize,
}

impl HubRequest {
    /// Short label for logs
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Call(Call::Register { .. }) => "register",
            Self::Call(Call::Count { .. }) => "count",
            Self::Call(Call::Stats { .. }) => "stats",
            Self::Notify(Notification::Deregister { .. }) => "deregister",
            Self::Notify(Notification::Broadcast { .. }) => "broadcast",
        }
    }
}
