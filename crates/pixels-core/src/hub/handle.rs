//! Client-side API of the hub

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use super::request::{Call, HubRequest, HubStats, Notification};
use crate::connection::{Connection, ConnectionId};
use crate::error::{Error, Result};
use crate::protocol::PixelUpdate;

/// Cloneable handle for talking to a running hub.
///
/// Every method fails with [`Error::HubExited`] once the hub has stopped.
#[derive(Clone)]
pub struct HubHandle {
    tx: mpsc::UnboundedSender<HubRequest>,
}

impl HubHandle {
    pub(crate) fn new(tx: mpsc::UnboundedSender<HubRequest>) -> Self {
        Self { tx }
    }

    fn submit(&self, request: HubRequest) -> Result<()> {
        self.tx.send(request).map_err(|_| Error::HubExited)
    }

    /// Ask the hub to admit `conn`.
    ///
    /// # Errors
    ///
    /// `TooManyConnections` when the address is at its limit.
    pub async fn register(&self, conn: Arc<dyn Connection>) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.submit(HubRequest::Call(Call::Register { conn, reply }))?;
        rx.await.map_err(|_| Error::HubExited)?
    }

    /// Remove a connection. Safe to call more than once.
    pub fn deregister(&self, id: ConnectionId) -> Result<()> {
        self.submit(HubRequest::Notify(Notification::Deregister { id }))
    }

    /// Submit a validated update on behalf of `src`
    pub fn broadcast(&self, src: ConnectionId, update: PixelUpdate) -> Result<()> {
        self.submit(HubRequest::Notify(Notification::Broadcast { src, update }))
    }

    /// Number of live connections
    pub async fn count(&self) -> Result<usize> {
        let (reply, rx) = oneshot::channel();
        self.submit(HubRequest::Call(Call::Count { reply }))?;
        rx.await.map_err(|_| Error::HubExited)
    }

    /// Bookkeeping snapshot
    pub async fn stats(&self) -> Result<HubStats> {
        let (reply, rx) = oneshot::channel();
        self.submit(HubRequest::Call(Call::Stats { reply }))?;
        rx.await.map_err(|_| Error::HubExited)
    }

    /// Whether the hub has stopped accepting requests
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl std::fmt::Debug for HubHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubHandle")
            .field("closed", &self.is_closed())
            .finish()
    }
}
