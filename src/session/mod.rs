//! Browser session - drives WhatsApp Web through a real browser
//!
//! Used when no engine is available: the session logs in with a QR code,
//! keeps a persistent profile per account and sends messages by typing
//! them into the web client.

pub mod chrome;
pub mod client;
pub mod driver;
pub mod qr;
pub mod selectors;
pub mod state;
pub mod supervisor;

pub use chrome::ChromeLauncher;
pub use client::SessionClient;
pub use driver::{BrowserLauncher, BrowserPage};
pub use state::{
    BrowserAvailability, ContactTarget, LoginFailure, LoginState, SessionPhase, SessionState,
};
pub use supervisor::SessionSupervisor;
