//! Pixels Core - shared canvas engine
//!
//! This crate provides the connection hub behind the shared pixel canvas:
//! - Connection hub actor that serializes registrations and updates
//! - Per-address connection limits and token-bucket rate limiting
//! - Canvas storage (Redis and in-memory)
//! - Wire message types and inbound validation
//! - Graceful shutdown coordination

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod connection;
pub mod error;
pub mod hub;
pub mod protocol;
pub mod shutdown;
pub mod store;
pub mod utils;

pub use connection::{Connection, ConnectionId};
pub use error::{Error, Result};
pub use hub::{spawn_hub, ConnectionHub, HubConfig, HubHandle, HubStats};
pub use protocol::{decode_update, notice, CanvasLayout, ClientMessage, PixelUpdate, ServerMessage};
pub use shutdown::{
    shutdown_signal_with_controller, wait_for_shutdown_signal, SessionGuard, ShutdownController,
    ShutdownPhase,
};
pub use store::{CanvasStore, MemoryCanvasStore, RedisCanvasStore};
pub use utils::{AddressRateLimiter, RateLimitConfig, RateLimitResult};
