//! Shared fixtures for handler tests

use std::net::IpAddr;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use pixels_core::{spawn_hub, HubConfig, MemoryCanvasStore, ShutdownController};
use tokio_util::sync::CancellationToken;

use super::config::{AppConfig, Environment};
use super::state::AppState;
use crate::captcha::CaptchaVerifier;

/// Token accepted by [`StaticVerifier`]
pub const GOOD_TOKEN: &str = "good-token";

/// Accepts only [`GOOD_TOKEN`]
pub struct StaticVerifier;

#[async_trait]
impl CaptchaVerifier for StaticVerifier {
    async fn verify(&self, token: &str, _remote_ip: Option<IpAddr>) -> Result<bool> {
        Ok(token == GOOD_TOKEN)
    }
}

/// Development config with a 16-cell canvas
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.environment = Environment::Development;
    config.canvas.size = 16;
    config.captcha.secret = Some("test".to_string());
    config
}

/// State over an in-memory 16-cell canvas and a running hub
pub fn test_state() -> (Arc<AppState>, CancellationToken) {
    test_state_with(&test_config(), HubConfig::default())
}

/// State for `config` with explicit hub limits
pub fn test_state_with(config: &AppConfig, hub_config: HubConfig) -> (Arc<AppState>, CancellationToken) {
    let shutdown = ShutdownController::new();
    let cancel = shutdown.token();
    let store = Arc::new(MemoryCanvasStore::with_bytes(vec![b'0'; config.canvas.size]));
    let (hub, _task) = spawn_hub(store.clone(), hub_config, cancel.clone());
    let state = AppState::new(config, hub, store, Arc::new(StaticVerifier), shutdown);
    (Arc::new(state), cancel)
}
