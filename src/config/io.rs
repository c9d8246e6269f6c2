//! Configuration I/O - Loading and saving configuration
//!
//! Handles reading configuration from files and environment variables.

use secrecy::SecretString;
use std::path::Path;
use std::time::Duration;

use super::types::Config;
use crate::error::{Error, Result};

/// Load configuration with layered precedence:
/// 1. Config file (config.json / config.toml) if it exists, otherwise defaults
/// 2. Environment variable overrides (includes .env)
pub fn load_config() -> Result<Config> {
    let config_path = super::paths::config_path();

    let mut config = if config_path.exists() {
        load_config_from_path(&config_path)?
    } else {
        Config::default()
    };

    apply_env_overrides(&mut config);

    Ok(config)
}

/// Load configuration from a specific path
pub fn load_config_from_path(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;

    // Detect format by extension
    let config: Config = if path.extension().is_some_and(|ext| ext == "json") {
        // JSON5 is a superset of JSON and tolerates comments
        json5::from_str(&content).map_err(|e| Error::Config(format!("Invalid JSON config: {}", e)))?
    } else if path.extension().is_some_and(|ext| ext == "toml") {
        toml::from_str(&content).map_err(|e| Error::Config(format!("Invalid TOML config: {}", e)))?
    } else {
        json5::from_str(&content)
            .or_else(|_| toml::from_str(&content).map_err(|e| Error::Config(e.to_string())))
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?
    };

    Ok(config)
}

/// Apply environment variable overrides to an existing config.
///
/// Loads `.env` first, then overlays any set variables. Env vars have the
/// highest precedence: defaults < file < env.
pub fn apply_env_overrides(config: &mut Config) {
    dotenvy::dotenv().ok();
    apply_overrides_from(config, |key| std::env::var(key).ok());
}

fn apply_overrides_from(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(backend) = var("WABRIDGE_BACKEND").and_then(|v| v.parse().ok()) {
        config.backend = backend;
    }

    // Engine overrides
    if let Some(host) = var("WABRIDGE_ENGINE_HOST") {
        config.engine.host = host;
    }
    if let Some(port) = var("WABRIDGE_ENGINE_PORT").and_then(|v| v.parse().ok()) {
        config.engine.port = port;
    }
    if let Some(key) = var("WABRIDGE_API_KEY") {
        config.engine.api_key = SecretString::from(key);
    }

    // Coordinator overrides
    if let Some(interval) = var("WABRIDGE_POLL_INTERVAL") {
        match humantime_parse(&interval) {
            Some(d) => config.coordinator.interval = d,
            None => tracing::warn!(value = %interval, "Ignoring invalid WABRIDGE_POLL_INTERVAL"),
        }
    }

    // Session overrides
    if let Some(account) = var("WABRIDGE_SESSION_ACCOUNT") {
        config.session.account = account;
    }
    if let Some(root) = var("WABRIDGE_PROFILE_ROOT") {
        config.session.profile_root = root.into();
    }
    if let Some(path) = var("WABRIDGE_CHROME_PATH") {
        config.session.chrome_path = Some(path.into());
    }

    // Server overrides
    if let Some(port) = var("WABRIDGE_SERVER_PORT").and_then(|v| v.parse().ok()) {
        config.server.port = port;
    }
    if let Some(bind) = var("WABRIDGE_SERVER_BIND") {
        config.server.bind = bind;
    }
    if let Some(mode) = var("WABRIDGE_AUTH_MODE").and_then(|v| v.parse().ok()) {
        config.server.auth.mode = mode;
    }
    if let Some(tokens) = var("WABRIDGE_PROXY_TOKENS") {
        config.server.auth.tokens = tokens
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| SecretString::from(t.to_string()))
            .collect();
    }
    if let Some(password) = var("WABRIDGE_PROXY_PASSWORD") {
        config.server.auth.password = Some(SecretString::from(password));
    }

    // Logging overrides
    if let Some(level) = var("RUST_LOG") {
        config.log.level = level;
    }
    if let Some(format) = var("LOG_FORMAT").and_then(|v| v.parse().ok()) {
        config.log.format = format;
    }
}

fn humantime_parse(value: &str) -> Option<Duration> {
    // Bare numbers are seconds
    if let Ok(secs) = value.trim().parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    humantime_serde::re::humantime::parse_duration(value.trim()).ok()
}
