//! Remote engine configuration

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection settings for the remote engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Engine host name
    #[serde(default = "default_host")]
    pub host: String,
    /// Engine port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Use https instead of http
    #[serde(default)]
    pub tls: bool,
    /// API key sent as `x-api-key`
    #[serde(default = "empty_secret", skip_serializing)]
    pub api_key: SecretString,
    /// Timeout for command calls
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Timeout for the snapshot fetch
    #[serde(default = "default_snapshot_timeout", with = "humantime_serde")]
    pub snapshot_timeout: Duration,
}

impl EngineConfig {
    /// Root URL of the engine, without a trailing slash
    pub fn base_url(&self) -> String {
        let scheme = if self.tls { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            host: default_host(),
            port: default_port(),
            tls: false,
            api_key: empty_secret(),
            request_timeout: default_request_timeout(),
            snapshot_timeout: default_snapshot_timeout(),
        }
    }
}

fn default_host() -> String {
    "whatsapp-node".to_string()
}

fn default_port() -> u16 {
    5002
}

fn empty_secret() -> SecretString {
    SecretString::from(String::new())
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_snapshot_timeout() -> Duration {
    Duration::from_secs(5)
}
