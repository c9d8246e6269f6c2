//! Entity discovery - surfaces instances and tracked contacts as observables

pub mod observable;
pub mod registry;

pub use observable::{DiscoveryKey, Observable, ObservableKind, ObservedValue};
pub use registry::{DiscoveryRegistry, DiscoverySink, EntityDiscovery};
