//! Configuration loading
//!
//! Handles loading configuration from embedded defaults, files, and environment.

use super::config::AppConfig;
use anyhow::{Context, Result};
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use std::collections::HashMap;

/// Embedded default configuration (compiled into binary)
pub const DEFAULT_CONFIG: &str = include_str!("../../config/default.toml");

/// Unprefixed variables understood for compatibility with existing deployments
const LEGACY_VARIABLES: [(&str, &str); 4] = [
    ("ENVIRONMENT", "environment"),
    ("REDIS_ADDRESS", "redis.address"),
    ("REDIS_PASSWORD", "redis.password"),
    ("HCAPTCHA_SECRET", "captcha.secret"),
];

/// Load configuration from files and environment
pub fn load_config() -> Result<AppConfig> {
    build_config(None, true)
}

/// Load configuration from the embedded defaults and an explicit variable
/// map instead of the process environment
#[cfg(test)]
pub fn load_config_from_vars(vars: HashMap<String, String>) -> Result<AppConfig> {
    build_config(Some(vars), false)
}

fn build_config(vars: Option<HashMap<String, String>>, read_files: bool) -> Result<AppConfig> {
    let lookup = |name: &str| -> Option<String> {
        match &vars {
            Some(vars) => vars.get(name).cloned(),
            None => std::env::var(name).ok(),
        }
        .filter(|value| !value.is_empty())
    };

    // 1. Embedded defaults (always available)
    let mut builder = Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

    // 2. External overrides (optional)
    if read_files {
        let env_name = lookup("PIXELS_ENV")
            .or_else(|| lookup("ENVIRONMENT"))
            .unwrap_or_else(|| "production".to_string())
            .to_lowercase();
        builder = builder
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env_name)).required(false))
            .add_source(File::with_name("config/local").required(false));
    }

    // 3. Environment variables
    // prefix_separator("_") makes PIXELS_SERVER__PORT work (single _ after prefix).
    builder = builder.add_source(
        Environment::with_prefix("PIXELS")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .source(vars.clone()),
    );

    // 4. Legacy variables (highest priority)
    builder = apply_legacy_overrides(builder, &lookup)?;

    builder
        .build()
        .context("Failed to build configuration")?
        .try_deserialize()
        .context("Failed to deserialize configuration")
}

fn apply_legacy_overrides<F>(
    mut builder: ConfigBuilder<config::builder::DefaultState>,
    lookup: &F,
) -> Result<ConfigBuilder<config::builder::DefaultState>>
where
    F: Fn(&str) -> Option<String>,
{
    for (variable, key) in LEGACY_VARIABLES {
        let value = lookup(variable).map(|v| {
            // Anything but "development" means the public deployment
            if key != "environment" {
                v
            } else if v.eq_ignore_ascii_case("development") {
                "development".to_string()
            } else {
                "production".to_string()
            }
        });
        builder = builder
            .set_override_option(key, value)
            .with_context(|| format!("Invalid value for {}", variable))?;
    }
    Ok(builder)
}
