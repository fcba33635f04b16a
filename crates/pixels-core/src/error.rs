//! Error types for pixels-core
//!
//! This module provides the error taxonomy shared by the hub, the store
//! implementations and the client tasks that talk to them.

use std::net::IpAddr;

use thiserror::Error;

use crate::protocol::notice;

/// Hub error type
#[derive(Debug, Error)]
pub enum Error {
    /// The source address already holds the maximum number of live connections
    #[error("too many connections from {address} (limit {limit})")]
    TooManyConnections {
        /// Offending source address
        address: IpAddr,
        /// Configured per-address limit
        limit: usize,
    },

    /// The source address has no token left for another update
    #[error("rate limit exceeded")]
    RateLimited,

    /// The canvas store rejected or failed a read or write
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Inbound frame could not be decoded at all
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// Inbound frame decoded but failed validation
    #[error("{0}")]
    InvalidUpdate(String),

    /// Writing to a single connection failed
    #[error("send failure: {0}")]
    SendFailure(String),

    /// The hub task has terminated and no longer accepts requests
    #[error("hub has exited")]
    HubExited,

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a store error
    #[must_use]
    pub fn store(msg: impl Into<String>) -> Self {
        Self::StoreUnavailable(msg.into())
    }

    /// Create a validation error
    #[must_use]
    pub fn invalid_update(msg: impl Into<String>) -> Self {
        Self::InvalidUpdate(msg.into())
    }

    /// Create a send error
    #[must_use]
    pub fn send_failure(msg: impl Into<String>) -> Self {
        Self::SendFailure(msg.into())
    }

    /// Get error code for logs and health output
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::TooManyConnections { .. } => "too_many_connections",
            Self::RateLimited => "rate_limited",
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::MalformedInput(_) => "malformed_input",
            Self::InvalidUpdate(_) => "invalid_update",
            Self::SendFailure(_) => "send_failure",
            Self::HubExited => "hub_exited",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Plain-text notice to send to the offending connection, if any
    #[must_use]
    pub fn notice(&self) -> Option<String> {
        match self {
            Self::TooManyConnections { .. } => Some(notice::CLIENT_LIMIT_EXCEEDED.to_string()),
            Self::RateLimited => Some(notice::RATE_LIMIT_EXCEEDED.to_string()),
            Self::MalformedInput(_) => Some(notice::INVALID_INPUT_TYPE.to_string()),
            Self::InvalidUpdate(reason) => Some(notice::error(reason)),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedInput(err.to_string())
    }
}

impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        Self::StoreUnavailable(err.to_string())
    }
}

/// Result type alias for hub operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_error_codes() {
        let err = Error::TooManyConnections {
            address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            limit: 5,
        };
        assert_eq!(err.code(), "too_many_connections");
        assert_eq!(Error::HubExited.code(), "hub_exited");
    }

    #[test]
    fn test_error_notices() {
        assert_eq!(
            Error::RateLimited.notice().as_deref(),
            Some("rate limit exceeded")
        );
        assert_eq!(
            Error::MalformedInput("eof".into()).notice().as_deref(),
            Some("Invalid input type")
        );
        assert_eq!(
            Error::invalid_update("invalid index: -1").notice().as_deref(),
            Some("Error: invalid index: -1")
        );
        assert!(Error::store("down").notice().is_none());
    }

    #[test]
    fn test_from_serde_error() {
        let result: std::result::Result<i32, serde_json::Error> =
            serde_json::from_str("not valid json");
        let err: Error = result.unwrap_err().into();
        assert_eq!(err.code(), "malformed_input");
    }
}
