//! Browser session configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Settings for the local browser-driven session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Account name; one browser profile per account
    #[serde(default = "default_account")]
    pub account: String,
    /// Directory holding per-account browser profiles
    #[serde(default = "default_profile_root")]
    pub profile_root: PathBuf,
    /// Explicit Chrome/Chromium binary (searched on PATH otherwise)
    pub chrome_path: Option<PathBuf>,
    /// Run without a visible window
    #[serde(default = "default_true")]
    pub headless: bool,
    /// Require the Chrome sandbox
    #[serde(default = "default_true")]
    pub sandbox: bool,
    /// Web client URL
    #[serde(default = "default_web_url")]
    pub web_url: String,
    /// Bound for the authenticated marker
    #[serde(default = "default_auth_timeout", with = "humantime_serde")]
    pub auth_timeout: Duration,
    /// Bound for the login QR canvas
    #[serde(default = "default_qr_timeout", with = "humantime_serde")]
    pub qr_timeout: Duration,
    /// How long to wait for the user to scan a QR code
    #[serde(default = "default_scan_timeout", with = "humantime_serde")]
    pub scan_timeout: Duration,
    /// Pause between compose steps while the UI catches up
    #[serde(default = "default_settle_interval", with = "humantime_serde")]
    pub settle_interval: Duration,
}

impl SessionConfig {
    /// Profile directory for the configured account
    pub fn profile_dir(&self) -> PathBuf {
        let sanitized: String = self
            .account
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.profile_root.join(sanitized)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            account: default_account(),
            profile_root: default_profile_root(),
            chrome_path: None,
            headless: true,
            sandbox: true,
            web_url: default_web_url(),
            auth_timeout: default_auth_timeout(),
            qr_timeout: default_qr_timeout(),
            scan_timeout: default_scan_timeout(),
            settle_interval: default_settle_interval(),
        }
    }
}

fn default_account() -> String {
    "default".to_string()
}

fn default_profile_root() -> PathBuf {
    crate::config::state_dir().join("profiles")
}

fn default_true() -> bool {
    true
}

fn default_web_url() -> String {
    crate::session::selectors::WEB_CLIENT_URL.to_string()
}

fn default_auth_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_qr_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_scan_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_settle_interval() -> Duration {
    Duration::from_secs(2)
}
