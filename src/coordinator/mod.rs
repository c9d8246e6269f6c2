//! Polling coordinator - periodic snapshot refresh with subscribers

pub mod poller;
pub mod source;

pub use poller::{CoordinatorEvent, Listener, ListenerId, PollingCoordinator, RefreshOutcome};
pub use source::{session_status, SessionSnapshotSource, SnapshotSource};
