//! Server configuration types
//!
//! Contains all configuration structures for the Pixels server.

use std::time::Duration;

use pixels_core::{CanvasLayout, HubConfig, RateLimitConfig};
use serde::{Deserialize, Serialize};

/// Origin allowed in development
pub const DEVELOPMENT_ORIGIN: &str = "http://127.0.0.1:5500";
/// Origin allowed in production
pub const PRODUCTION_ORIGIN: &str = "https://tenthousandpixels.com";

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development
    Development,
    /// Public deployment
    #[default]
    Production,
}

impl Environment {
    /// Origin browsers must present when none is configured
    #[must_use]
    pub fn default_origin(&self) -> &'static str {
        match self {
            Self::Development => DEVELOPMENT_ORIGIN,
            Self::Production => PRODUCTION_ORIGIN,
        }
    }

    /// Whether this is a production deployment
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub environment: Environment,
    pub server: ServerConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    pub redis: RedisConfig,
    #[serde(default)]
    pub canvas: CanvasSettings,
    #[serde(default)]
    pub hub: HubSettings,
    #[serde(default)]
    pub connection: ConnectionSettings,
    #[serde(default)]
    pub captcha: CaptchaConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            server: ServerConfig::default(),
            cors: CorsConfig::default(),
            redis: RedisConfig::default(),
            canvas: CanvasSettings::default(),
            hub: HubSettings::default(),
            connection: ConnectionSettings::default(),
            captcha: CaptchaConfig::default(),
            proxy: ProxyConfig::default(),
        }
    }
}

impl AppConfig {
    /// Origins accepted for the WebSocket upgrade and CORS
    #[must_use]
    pub fn allowed_origins(&self) -> Vec<String> {
        if self.cors.allowed_origins.is_empty() {
            vec![self.environment.default_origin().to_string()]
        } else {
            self.cors.allowed_origins.clone()
        }
    }

    /// Canvas shape
    #[must_use]
    pub fn layout(&self) -> CanvasLayout {
        CanvasLayout::new(self.canvas.size, self.canvas.colors)
    }

    /// Hub limits
    #[must_use]
    pub fn hub_config(&self) -> HubConfig {
        HubConfig {
            max_connections_per_address: self.hub.max_connections_per_address,
            rate_limit: RateLimitConfig::new(
                self.hub.rate_limit_capacity,
                Duration::from_millis(self.hub.rate_limit_refill_ms),
            ),
            sweep_interval: Duration::from_secs(self.hub.sweep_interval_secs),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Time allowed for sessions to drain on shutdown
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

fn default_shutdown_timeout() -> u64 {
    10
}

/// Cross-origin configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Explicit origins; empty means the environment default
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    /// Reject WebSocket upgrades from other origins
    #[serde(default = "default_true")]
    pub enforce_origin: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            enforce_origin: true,
        }
    }
}

/// Redis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// `host:port`
    pub address: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub db: i64,
    /// Key holding the canvas
    #[serde(default = "default_canvas_key")]
    pub key: String,
    /// Fail startup instead of falling back to memory
    #[serde(default)]
    pub required: bool,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            address: "localhost:6379".to_string(),
            password: None,
            db: 0,
            key: default_canvas_key(),
            required: false,
        }
    }
}

impl RedisConfig {
    /// Connection URL
    #[must_use]
    pub fn url(&self) -> String {
        match self.password.as_deref().filter(|p| !p.is_empty()) {
            Some(password) => format!("redis://:{}@{}/{}", password, self.address, self.db),
            None => format!("redis://{}/{}", self.address, self.db),
        }
    }

    /// URL with the password masked, for logs
    #[must_use]
    pub fn redacted_url(&self) -> String {
        match self.password.as_deref().filter(|p| !p.is_empty()) {
            Some(_) => format!("redis://:***@{}/{}", self.address, self.db),
            None => self.url(),
        }
    }
}

fn default_canvas_key() -> String {
    pixels_core::store::DEFAULT_CANVAS_KEY.to_string()
}

/// Canvas configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanvasSettings {
    /// Number of cells
    pub size: usize,
    /// Palette size (1..=10)
    pub colors: u8,
}

impl Default for CanvasSettings {
    fn default() -> Self {
        Self {
            size: 10_000,
            colors: 10,
        }
    }
}

/// Hub limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubSettings {
    pub max_connections_per_address: usize,
    pub rate_limit_capacity: u32,
    pub rate_limit_refill_ms: u64,
    pub sweep_interval_secs: u64,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            max_connections_per_address: 5,
            rate_limit_capacity: 5,
            rate_limit_refill_ms: 1000,
            sweep_interval_secs: 60,
        }
    }
}

/// Per-connection timers and buffers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// Close after this long without an inbound frame
    pub idle_timeout_secs: u64,
    /// Close after this long regardless of activity
    pub max_session_secs: u64,
    /// Outbound frames buffered per connection before it counts as dead
    pub outbound_queue: usize,
    pub ping_interval_secs: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 300,
            max_session_secs: 3600,
            outbound_queue: 64,
            ping_interval_secs: 30,
        }
    }
}

impl ConnectionSettings {
    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    #[must_use]
    pub fn max_session(&self) -> Duration {
        Duration::from_secs(self.max_session_secs)
    }

    #[must_use]
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }
}

/// hCaptcha configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptchaConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default = "default_verify_url")]
    pub verify_url: String,
    #[serde(default = "default_captcha_timeout")]
    pub timeout_secs: u64,
}

impl Default for CaptchaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            secret: None,
            verify_url: default_verify_url(),
            timeout_secs: default_captcha_timeout(),
        }
    }
}

fn default_verify_url() -> String {
    "https://hcaptcha.com/siteverify".to_string()
}

fn default_captcha_timeout() -> u64 {
    10
}

/// Reverse proxy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Resolve the client address from X-Real-Ip / X-Forwarded-For
    #[serde(default = "default_true")]
    pub trust_forwarded_headers: bool,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            trust_forwarded_headers: true,
        }
    }
}

fn default_true() -> bool {
    true
}
