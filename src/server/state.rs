//! Shared state handed to every handler

use std::sync::Arc;

use pixels_core::{CanvasLayout, CanvasStore, HubHandle, ShutdownController};

use super::config::{AppConfig, ConnectionSettings};
use crate::captcha::CaptchaVerifier;

/// Everything a request handler or client session needs
pub struct AppState {
    pub hub: HubHandle,
    pub store: Arc<dyn CanvasStore>,
    pub layout: CanvasLayout,
    pub verifier: Arc<dyn CaptchaVerifier>,
    pub allowed_origins: Vec<String>,
    pub enforce_origin: bool,
    pub connection: ConnectionSettings,
    pub shutdown: Arc<ShutdownController>,
}

impl AppState {
    /// Assemble state from configuration and started components
    pub fn new(
        config: &AppConfig,
        hub: HubHandle,
        store: Arc<dyn CanvasStore>,
        verifier: Arc<dyn CaptchaVerifier>,
        shutdown: Arc<ShutdownController>,
    ) -> Self {
        Self {
            hub,
            store,
            layout: config.layout(),
            verifier,
            allowed_origins: config.allowed_origins(),
            enforce_origin: config.cors.enforce_origin,
            connection: config.connection.clone(),
            shutdown,
        }
    }
}
