//! WebSocket transport for the hub
//!
//! Every socket has exactly one writer task. The hub, the client session
//! and the ping timer all push frames into a bounded queue that the writer
//! drains, so writes to one socket are serialized and a slow peer only ever
//! fills its own queue.
//!
//! Closing does not go through the queue. A peer evicted because its queue
//! is full must still be closed, so `close` fires a token that both the
//! writer and the client session watch.

use std::fmt::Display;
use std::net::IpAddr;
use std::sync::Arc;

use axum::extract::ws::Message;
use futures_util::{Sink, SinkExt};
use pixels_core::{Connection, ConnectionId, Error, Result};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::debug;

/// Queue-backed WebSocket connection
pub struct WsConnection {
    id: ConnectionId,
    addr: IpAddr,
    tx: mpsc::Sender<Message>,
    closed: CancellationToken,
}

impl WsConnection {
    /// Create a connection and the receiving end of its outbound queue
    pub fn new(addr: IpAddr, queue: usize) -> (Arc<Self>, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel(queue.max(1));
        let conn = Arc::new(Self {
            id: ConnectionId::new(),
            addr,
            tx,
            closed: CancellationToken::new(),
        });
        (conn, rx)
    }

    /// Queue any frame
    pub fn push(&self, message: Message) -> Result<()> {
        if self.is_closed() {
            return Err(Error::send_failure("connection closed"));
        }
        self.tx.try_send(message).map_err(|e| match e {
            TrySendError::Full(_) => Error::send_failure("outbound queue full"),
            TrySendError::Closed(_) => Error::send_failure("writer stopped"),
        })
    }

    /// Queue a keep-alive ping
    pub fn ping(&self) -> Result<()> {
        self.push(Message::Ping(Vec::new()))
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Resolves once `close` has been called
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.closed.cancelled()
    }

    /// Token fired by `close`, for the writer task
    pub fn close_token(&self) -> CancellationToken {
        self.closed.clone()
    }
}

impl Connection for WsConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn remote_addr(&self) -> IpAddr {
        self.addr
    }

    fn send(&self, text: &str) -> Result<()> {
        self.push(Message::Text(text.to_string()))
    }

    fn close(&self) {
        self.closed.cancel();
    }
}

/// Drain the outbound queue into the socket.
///
/// `first` is written before anything queued, so the snapshot (or the
/// rejection notice) always reaches the client ahead of hub traffic queued
/// while it was being prepared. Dropping `first` skips it.
///
/// Once `closed` fires, frames still queued are discarded and a close frame
/// is written instead.
pub async fn write_loop<S>(
    mut sink: S,
    first: oneshot::Receiver<String>,
    mut rx: mpsc::Receiver<Message>,
    closed: CancellationToken,
    conn_id: ConnectionId,
) where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    if let Ok(text) = first.await {
        if let Err(e) = sink.send(Message::Text(text)).await {
            debug!(conn_id = %conn_id, error = %e, "Failed to write first frame");
            return;
        }
    }

    loop {
        let message = tokio::select! {
            biased;
            _ = closed.cancelled() => break,
            message = rx.recv() => match message {
                Some(message) => message,
                None => break,
            },
        };
        if let Err(e) = sink.send(message).await {
            debug!(conn_id = %conn_id, error = %e, "WebSocket write failed");
            return;
        }
    }

    rx.close();
    if let Err(e) = sink.send(Message::Close(None)).await {
        debug!(conn_id = %conn_id, error = %e, "Failed to write close frame");
    }
    let _ = sink.close().await;
    debug!(conn_id = %conn_id, "Writer stopped");
}
