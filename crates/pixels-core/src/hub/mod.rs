//! Connection hub
//!
//! The hub is the single serialization point for the canvas: it admits and
//! removes connections, charges the per-address rate limiter, writes accepted
//! updates to the store and fans them out.
//!
//! ```text
//! client task ──register/deregister/broadcast/count──▶ inbox ──▶ ConnectionHub
//!                                                                  │  Registry
//!                                                                  │  AddressRateLimiter
//!                                                                  ├─▶ CanvasStore::set_range
//!                                                                  └─▶ Connection::send (every live peer)
//! ```

mod actor;
mod handle;
mod registry;
mod request;

pub use actor::{spawn_hub, ConnectionHub, HubConfig};
pub use handle::HubHandle;
pub use registry::Registry;
pub use request::{Call, HubRequest, HubStats, Notification};
