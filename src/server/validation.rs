//! Configuration validation
//!
//! Rejects settings the server cannot run with and warns about risky
//! production deployments.

use super::config::AppConfig;
use anyhow::{bail, Result};
use tracing::warn;

/// Validate configuration before anything is started
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.canvas.size == 0 {
        bail!("canvas.size must be greater than 0");
    }
    if config.canvas.colors == 0 || config.canvas.colors > 10 {
        bail!("canvas.colors must be between 1 and 10");
    }
    if config.hub.max_connections_per_address == 0 {
        bail!("hub.max_connections_per_address must be greater than 0");
    }
    if config.hub.rate_limit_capacity == 0 {
        bail!("hub.rate_limit_capacity must be greater than 0");
    }
    if config.hub.rate_limit_refill_ms == 0 {
        bail!("hub.rate_limit_refill_ms must be greater than 0");
    }
    if config.connection.outbound_queue == 0 {
        bail!("connection.outbound_queue must be greater than 0");
    }
    if config.connection.ping_interval_secs == 0 {
        bail!("connection.ping_interval_secs must be greater than 0");
    }
    if config.captcha.enabled && config.captcha.secret.is_none() {
        bail!("captcha is enabled but no secret is set (HCAPTCHA_SECRET or PIXELS_CAPTCHA__SECRET)");
    }

    validate_production_config(config);
    Ok(())
}

/// Log warnings for production deployments
fn validate_production_config(config: &AppConfig) {
    if !config.environment.is_production() {
        return;
    }

    if !config.captcha.enabled {
        warn!(
            "SECURITY WARNING: Captcha verification is DISABLED in production. \
             Anyone can open WebSocket connections."
        );
    }

    if config.redis.password.is_none() {
        warn!(
            "SECURITY WARNING: Redis connection has no password in production. \
             Consider enabling Redis AUTH."
        );
    }

    if config.proxy.trust_forwarded_headers {
        warn!(
            "Forwarded headers are trusted. Make sure the server is only reachable \
             through a proxy that overwrites X-Real-Ip and X-Forwarded-For."
        );
    }

    if !config.cors.enforce_origin {
        warn!("SECURITY WARNING: WebSocket origin check is disabled in production.");
    }
}
