//! Local server configuration (reverse proxy + session gateway)

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Port to bind to
    #[serde(default = "default_port")]
    pub port: u16,
    /// Bind address
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Mount prefix for the reverse proxy
    #[serde(default = "default_proxy_prefix")]
    pub proxy_prefix: String,
    /// Caller authentication
    #[serde(default)]
    pub auth: AuthConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            port: default_port(),
            bind: default_bind(),
            proxy_prefix: default_proxy_prefix(),
            auth: AuthConfig::default(),
        }
    }
}

fn default_port() -> u16 {
    5001
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_proxy_prefix() -> String {
    "/api/whatsapp_proxy".to_string()
}

/// Authentication configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Authentication mode
    #[serde(default)]
    pub mode: AuthMode,
    /// Shared password (for password mode)
    #[serde(default, skip_serializing)]
    pub password: Option<SecretString>,
    /// Allowed bearer tokens (for token mode)
    #[serde(default, skip_serializing)]
    pub tokens: Vec<SecretString>,
}

/// Authentication mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// No authentication (local only)
    None,
    /// Password authentication
    Password,
    /// Token-based authentication
    #[default]
    Token,
}

impl std::str::FromStr for AuthMode {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(AuthMode::None),
            "password" => Ok(AuthMode::Password),
            "token" => Ok(AuthMode::Token),
            other => Err(crate::error::Error::Config(format!(
                "Unknown auth mode '{}' (expected none, password or token)",
                other
            ))),
        }
    }
}
