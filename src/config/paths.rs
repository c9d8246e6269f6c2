//! Configuration paths
//!
//! Every location can be pinned with an environment variable; otherwise the
//! platform directories from `dirs` are used, then a home-relative fallback.

use std::path::{Path, PathBuf};

const APP_DIR: &str = "wabridge";

fn resolve(var: &str, platform: Option<PathBuf>, home_relative: &[&str]) -> PathBuf {
    if let Some(dir) = std::env::var_os(var).filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    platform
        .map(|d| d.join(APP_DIR))
        .or_else(|| {
            dirs::home_dir().map(|home| {
                home_relative
                    .iter()
                    .fold(home, |path, part| path.join(part))
                    .join(APP_DIR)
            })
        })
        .unwrap_or_else(|| Path::new(".").join(format!(".{}", APP_DIR)))
}

/// Directory holding `config.json` / `config.toml` (`WABRIDGE_CONFIG_DIR`)
pub fn config_dir() -> PathBuf {
    resolve("WABRIDGE_CONFIG_DIR", dirs::config_dir(), &[".config"])
}

/// Main configuration file (`WABRIDGE_CONFIG`)
pub fn config_path() -> PathBuf {
    match std::env::var_os("WABRIDGE_CONFIG").filter(|v| !v.is_empty()) {
        Some(path) => PathBuf::from(path),
        None => config_dir().join("config.json"),
    }
}

/// Persistent state such as browser profiles (`WABRIDGE_STATE_DIR`)
pub fn state_dir() -> PathBuf {
    resolve("WABRIDGE_STATE_DIR", dirs::data_dir(), &[".local", "share"])
}
