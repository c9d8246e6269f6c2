//! # wabridge
//!
//! Bridges a WhatsApp account into a home-automation host.
//!
//! ## Components
//!
//! - **Engine gateway:** HTTP client for a remote WhatsApp engine (`x-api-key` auth)
//! - **Session client:** drives WhatsApp Web in a headless browser when no engine is available
//! - **Polling coordinator:** one shared snapshot, refreshed on an interval, with listeners
//! - **Entity discovery:** surfaces every instance and tracked contact exactly once
//! - **Reverse proxy:** forwards host calls to the engine, status and body untouched

pub mod app;
pub mod backend;
pub mod config;
pub mod coordinator;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod logging;
pub mod server;
pub mod session;

pub use app::AppContext;
pub use config::Config;
pub use error::{Error, Result};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const NAME: &str = env!("CARGO_PKG_NAME");
