//! Configuration module - Modular configuration management
//!
//! - types/mod.rs: Core configuration types (Config, CoordinatorConfig, LogConfig)
//! - types/engine.rs: Remote engine connection
//! - types/session.rs: Browser session settings
//! - types/server.rs: Proxy / session gateway server and caller auth
//! - io.rs: Configuration loading and env overrides
//! - validation.rs: Configuration validation
//! - paths.rs: Configuration file paths

mod io;
mod paths;
mod types;
mod validation;

// Re-export core config types
pub use types::{BackendKind, Config, CoordinatorConfig, LogConfig, LogFormat};

pub use types::engine::EngineConfig;
pub use types::server::{AuthConfig, AuthMode, ServerConfig};
pub use types::session::SessionConfig;

// Re-export IO and utilities
pub use io::{apply_env_overrides, load_config, load_config_from_path};
pub use paths::{config_dir, config_path, state_dir};
pub use validation::{validate_config, ConfigValidationResult, ValidationIssue};
