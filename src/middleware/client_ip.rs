//! Client address resolution
//!
//! Behind a reverse proxy the socket peer is the proxy itself, so the
//! address counted against connection and rate limits comes from the
//! forwarding headers when they are trusted.

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use std::net::{IpAddr, SocketAddr};
use tracing::warn;

use crate::server::config::ProxyConfig;

/// Resolved client address.
///
/// Reads [`ProxyConfig`] from the request extensions; forwarding headers are
/// ignored when it is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub IpAddr);

/// Rejection when no address can be determined
#[derive(Debug)]
pub struct ClientIpRejection;

impl IntoResponse for ClientIpRejection {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "could not determine necessary information",
        )
            .into_response()
    }
}

#[async_trait::async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = ClientIpRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let trust_forwarded = parts
            .extensions
            .get::<ProxyConfig>()
            .map(|proxy| proxy.trust_forwarded_headers)
            .unwrap_or(false);
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        match resolve_client_ip(&parts.headers, peer, trust_forwarded) {
            Some(ip) => Ok(ClientIp(ip)),
            None => {
                warn!("Could not determine client address");
                Err(ClientIpRejection)
            }
        }
    }
}

/// Pick the client address: `X-Real-Ip`, then the first `X-Forwarded-For`
/// entry, then the socket peer.
pub fn resolve_client_ip(
    headers: &HeaderMap,
    peer: Option<IpAddr>,
    trust_forwarded: bool,
) -> Option<IpAddr> {
    if trust_forwarded {
        let real_ip = headers
            .get("x-real-ip")
            .and_then(|value| value.to_str().ok())
            .and_then(parse_addr);
        if real_ip.is_some() {
            return real_ip;
        }

        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .and_then(parse_addr);
        if forwarded.is_some() {
            return forwarded;
        }
    }

    peer
}

/// Parse `ip`, `ip:port` or `[v6]:port`
fn parse_addr(value: &str) -> Option<IpAddr> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    value
        .parse::<IpAddr>()
        .ok()
        .or_else(|| value.parse::<SocketAddr>().ok().map(|addr| addr.ip()))
}
