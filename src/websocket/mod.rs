//! WebSocket module for Pixels
//!
//! - /ws - Shared canvas socket

pub mod canvas;
pub mod connection;

pub use canvas::canvas_ws_handler;

use axum::{routing::get, Router};

/// Create the WebSocket router
pub fn websocket_router() -> Router {
    Router::new().route("/ws", get(canvas_ws_handler))
}

#[cfg(test)]
mod tests;
