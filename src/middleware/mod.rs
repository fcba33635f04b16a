//! Middleware module for the Pixels HTTP server
//!
//! Provides:
//! - Client address resolution behind a reverse proxy
//! - Origin check and CORS layer

pub mod client_ip;
pub mod cors;
