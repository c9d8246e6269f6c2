//! Engine gateway - HTTP client for the remote WhatsApp engine
//!
//! The engine owns the real messaging connections. This module fetches
//! snapshots of its state and forwards commands to it; it never caches
//! anything itself.

pub mod client;
pub mod commands;
pub mod types;

pub use client::{EngineClient, API_KEY_HEADER};
pub use commands::{ChatAction, Command, CommandRequest, Presence};
pub use types::{Instance, InstanceId, Jid, Snapshot, TrackedContact};
