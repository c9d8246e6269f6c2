//! Configuration validation
//!
//! Validates configuration and reports issues.

use secrecy::ExposeSecret;
use std::time::Duration;

use super::types::server::AuthMode;
use super::types::{BackendKind, Config};

/// Result of configuration validation
#[derive(Debug, Clone)]
pub struct ConfigValidationResult {
    /// Whether the config is valid
    pub valid: bool,
    /// Validation errors (critical)
    pub errors: Vec<ValidationIssue>,
    /// Validation warnings (non-critical)
    pub warnings: Vec<ValidationIssue>,
}

impl ConfigValidationResult {
    /// Create a valid result
    pub fn valid() -> Self {
        ConfigValidationResult {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Add an error
    pub fn with_error(mut self, issue: ValidationIssue) -> Self {
        self.valid = false;
        self.errors.push(issue);
        self
    }

    /// Add a warning
    pub fn with_warning(mut self, issue: ValidationIssue) -> Self {
        self.warnings.push(issue);
        self
    }
}

/// A validation issue
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Path to the config field
    pub path: String,
    /// Issue message
    pub message: String,
    /// Suggested fix
    pub suggestion: Option<String>,
}

impl ValidationIssue {
    /// Create a new issue
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationIssue {
            path: path.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    /// Add a suggestion
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, " ({})", suggestion)?;
        }
        Ok(())
    }
}

/// Validate the configuration
pub fn validate_config(config: &Config) -> ConfigValidationResult {
    let mut result = ConfigValidationResult::valid();

    result = validate_engine_config(config, result);
    result = validate_session_config(config, result);
    result = validate_server_config(config, result);

    if config.coordinator.interval < Duration::from_secs(1) {
        result = result.with_error(
            ValidationIssue::new("coordinator.interval", "Polling interval must be at least 1s")
                .with_suggestion("Use the default of 10s"),
        );
    }

    result
}

fn validate_engine_config(config: &Config, mut result: ConfigValidationResult) -> ConfigValidationResult {
    // The proxy always talks to the engine, so the key matters for both backends
    if config.engine.api_key.expose_secret().is_empty() {
        let issue = ValidationIssue::new("engine.api_key", "API key is empty")
            .with_suggestion("Set WABRIDGE_API_KEY or engine.api_key");
        result = if config.backend == BackendKind::Engine {
            result.with_error(issue)
        } else {
            result.with_warning(issue)
        };
    }

    if config.engine.host.trim().is_empty() {
        result = result.with_error(ValidationIssue::new("engine.host", "Engine host is empty"));
    }

    if config.engine.snapshot_timeout >= config.coordinator.interval {
        result = result.with_warning(
            ValidationIssue::new(
                "engine.snapshot_timeout",
                "Snapshot timeout is not shorter than the polling interval; ticks will be skipped",
            )
            .with_suggestion("Keep snapshot_timeout below coordinator.interval"),
        );
    }

    result
}

fn validate_session_config(config: &Config, mut result: ConfigValidationResult) -> ConfigValidationResult {
    if config.backend != BackendKind::Browser {
        return result;
    }

    if config.session.account.trim().is_empty() {
        result = result.with_error(ValidationIssue::new("session.account", "Account name is empty"));
    }

    if config.session.qr_timeout < config.session.auth_timeout {
        result = result.with_warning(ValidationIssue::new(
            "session.qr_timeout",
            "QR timeout is shorter than the authenticated-marker timeout",
        ));
    }

    if !config.session.sandbox {
        result = result.with_warning(
            ValidationIssue::new("session.sandbox", "Chrome sandbox is disabled")
                .with_suggestion("Only disable the sandbox inside an isolated container"),
        );
    }

    result
}

fn validate_server_config(config: &Config, mut result: ConfigValidationResult) -> ConfigValidationResult {
    let auth = &config.server.auth;

    match auth.mode {
        AuthMode::Token if auth.tokens.iter().all(|t| t.expose_secret().is_empty()) => {
            result = result.with_error(
                ValidationIssue::new("server.auth.tokens", "Token auth is enabled but no tokens are configured")
                    .with_suggestion("Set WABRIDGE_PROXY_TOKENS"),
            );
        }
        AuthMode::Password
            if auth.password.as_ref().map_or(true, |p| p.expose_secret().is_empty()) =>
        {
            result = result.with_error(
                ValidationIssue::new("server.auth.password", "Password auth is enabled but no password is set")
                    .with_suggestion("Set WABRIDGE_PROXY_PASSWORD"),
            );
        }
        AuthMode::None if config.server.bind != "127.0.0.1" && config.server.bind != "localhost" => {
            result = result.with_warning(ValidationIssue::new(
                "server.auth.mode",
                "Proxy is unauthenticated and bound to a non-loopback address",
            ));
        }
        _ => {}
    }

    if !config.server.proxy_prefix.starts_with('/') {
        result = result.with_error(ValidationIssue::new(
            "server.proxy_prefix",
            "Proxy prefix must start with '/'",
        ));
    }

    result
}
