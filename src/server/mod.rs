//! Server module for Pixels
//!
//! Contains the main server initialization and runtime logic.
//!
//! # Module Structure
//!
//! - `config`: Configuration structures for all server components
//! - `loader`: Configuration loading from files and environment
//! - `validation`: Configuration validation and production warnings
//! - `state`: Shared handler state
//! - `init`: Main server initialization and run loop

pub mod config;
pub mod init;
mod loader;
pub mod state;
#[cfg(test)]
pub(crate) mod test_support;
mod validation;

// Re-export public API
pub use init::run;
