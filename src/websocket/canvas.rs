//! Canvas WebSocket handler
//!
//! Checks the origin and the captcha token before upgrading, then runs one
//! client session per socket: register with the hub, send the snapshot,
//! forward validated updates until the peer leaves or a timer fires.

use std::net::IpAddr;
use std::sync::Arc;

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Extension,
};
use futures_util::StreamExt;
use pixels_core::{decode_update, notice, Connection, ConnectionId, ServerMessage};
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::connection::{write_loop, WsConnection};
use crate::middleware::client_ip::ClientIp;
use crate::middleware::cors::origin_allowed;
use crate::server::state::AppState;

/// Largest inbound frame accepted
pub const MAX_FRAME_BYTES: usize = 1024;

/// How long the writer gets to flush after the session ends
const WRITER_DRAIN_SECS: u64 = 5;

/// Why an upgrade was refused
#[derive(Debug, PartialEq, Eq)]
pub enum UpgradeRejection {
    /// Origin header missing or not allowed
    Origin,
    /// Captcha token rejected or unverifiable
    Captcha,
    /// Server is shutting down
    ShuttingDown,
}

impl IntoResponse for UpgradeRejection {
    fn into_response(self) -> Response {
        match self {
            Self::Origin => (StatusCode::FORBIDDEN, "origin not allowed").into_response(),
            Self::Captcha => (StatusCode::UNAUTHORIZED, "could not verify hCaptcha").into_response(),
            Self::ShuttingDown => {
                (StatusCode::SERVICE_UNAVAILABLE, "server is shutting down").into_response()
            }
        }
    }
}

/// WebSocket upgrade handler for `/ws`
pub async fn canvas_ws_handler(
    Extension(state): Extension<Arc<AppState>>,
    ClientIp(addr): ClientIp,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let protocol = match authorize_upgrade(&state, &headers, addr).await {
        Ok(protocol) => protocol,
        Err(rejection) => {
            debug!(addr = %addr, reason = ?rejection, "WebSocket upgrade refused");
            return rejection.into_response();
        }
    };

    let ws = match protocol {
        Some(token) => ws.protocols([token]),
        None => ws,
    };

    ws.max_message_size(MAX_FRAME_BYTES)
        .on_upgrade(move |socket| run_client(socket, addr, state))
}

/// Check origin and captcha. Returns the subprotocol to echo back.
pub async fn authorize_upgrade(
    state: &AppState,
    headers: &HeaderMap,
    addr: IpAddr,
) -> std::result::Result<Option<String>, UpgradeRejection> {
    if state.shutdown.is_shutting_down() {
        return Err(UpgradeRejection::ShuttingDown);
    }

    if state.enforce_origin && !origin_allowed(headers, &state.allowed_origins) {
        return Err(UpgradeRejection::Origin);
    }

    let token = headers
        .get("sec-websocket-protocol")
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());

    match state
        .verifier
        .verify(token.as_deref().unwrap_or_default(), Some(addr))
        .await
    {
        Ok(true) => Ok(token),
        Ok(false) => Err(UpgradeRejection::Captcha),
        Err(e) => {
            warn!(addr = %addr, error = %e, "error verifying hCaptcha");
            Err(UpgradeRejection::Captcha)
        }
    }
}

/// One client session
pub async fn run_client(socket: WebSocket, addr: IpAddr, state: Arc<AppState>) {
    let session = state.shutdown.session_guard();
    let cancel = session.token();

    let (sink, mut stream) = socket.split();
    let (conn, outbound) = WsConnection::new(addr, state.connection.outbound_queue);
    let conn_id = conn.id();
    let (first_tx, first_rx) = oneshot::channel();
    let mut writer = tokio::spawn(write_loop(
        sink,
        first_rx,
        outbound,
        conn.close_token(),
        conn_id,
    ));

    debug!(conn_id = %conn_id, addr = %addr, "WebSocket connection opened");

    if let Err(e) = state.hub.register(conn.clone()).await {
        info!(conn_id = %conn_id, addr = %addr, error = %e, "Registration refused");
        if let Some(text) = e.notice() {
            let _ = first_tx.send(text);
        }
        conn.close();
        drop(conn);
        finish_writer(&mut writer, conn_id).await;
        return;
    }

    match initial_message(&state).await {
        Ok(text) => {
            let _ = first_tx.send(text);
        }
        Err(e) => {
            warn!(conn_id = %conn_id, error = %e, "Failed to load initial canvas");
            drop(first_tx);
            let _ = state.hub.deregister(conn_id);
            conn.close();
            drop(conn);
            finish_writer(&mut writer, conn_id).await;
            return;
        }
    }

    let idle_timeout = state.connection.idle_timeout();
    let idle = tokio::time::sleep(idle_timeout);
    tokio::pin!(idle);
    let session_end = tokio::time::sleep(state.connection.max_session());
    tokio::pin!(session_end);
    let ping_period = state.connection.ping_interval();
    let mut ping = tokio::time::interval_at(Instant::now() + ping_period, ping_period);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(conn_id = %conn_id, "Session cancelled by shutdown");
                break;
            }
            _ = conn.closed() => {
                info!(conn_id = %conn_id, addr = %addr, "Connection closed by hub");
                break;
            }
            _ = &mut session_end => {
                info!(conn_id = %conn_id, addr = %addr, "Maximum session length reached");
                break;
            }
            _ = &mut idle => {
                info!(conn_id = %conn_id, addr = %addr, "Idle timeout");
                break;
            }
            _ = ping.tick() => {
                if conn.ping().is_err() {
                    break;
                }
            }
            frame = stream.next() => {
                idle.as_mut().reset(Instant::now() + idle_timeout);
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        if let Err(e) = handle_text(&state, &conn, &text) {
                            debug!(conn_id = %conn_id, error = %e, "Ending session");
                            break;
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        if conn.send(notice::INVALID_INPUT_TYPE).is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = conn.push(Message::Pong(data));
                    }
                    Some(Ok(Message::Pong(_))) => {}
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        debug!(conn_id = %conn_id, error = %e, "WebSocket read error");
                        break;
                    }
                }
            }
        }
    }

    let _ = state.hub.deregister(conn_id);
    conn.close();
    drop(conn);
    finish_writer(&mut writer, conn_id).await;
    debug!(conn_id = %conn_id, "WebSocket connection closed");
}

/// Decode one text frame and hand it to the hub or answer with a notice.
///
/// Errors end the session.
fn handle_text(state: &AppState, conn: &WsConnection, text: &str) -> pixels_core::Result<()> {
    match decode_update(text, &state.layout) {
        Ok(update) => state.hub.broadcast(conn.id(), update),
        Err(e) => {
            debug!(conn_id = %conn.id(), error = %e, "Rejected client message");
            match e.notice() {
                Some(text) => conn.send(&text),
                None => Err(e),
            }
        }
    }
}

async fn initial_message(state: &AppState) -> pixels_core::Result<String> {
    let canvas = state.store.get().await?;
    let clients = state.hub.count().await?;
    ServerMessage::initial(&canvas, clients).to_json()
}

async fn finish_writer(writer: &mut tokio::task::JoinHandle<()>, conn_id: ConnectionId) {
    let drain = std::time::Duration::from_secs(WRITER_DRAIN_SECS);
    if tokio::time::timeout(drain, &mut *writer).await.is_err() {
        warn!(conn_id = %conn_id, "Writer did not finish, aborting");
        writer.abort();
    }
}
