//! Discovery registry and the snapshot-driven discovery pass

use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

use super::observable::{DiscoveryKey, Observable, ObservableKind, ObservedValue};
use crate::coordinator::{CoordinatorEvent, ListenerId, PollingCoordinator};
use crate::engine::Snapshot;

/// Keys already surfaced. Keys are never removed.
#[derive(Default)]
pub struct DiscoveryRegistry {
    keys: Mutex<HashSet<DiscoveryKey>>,
}

impl DiscoveryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &DiscoveryKey) -> bool {
        self.keys.lock().contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.lock().is_empty()
    }

    /// Insert keys under one lock and return only those that were new
    pub fn claim<I>(&self, keys: I) -> Vec<DiscoveryKey>
    where
        I: IntoIterator<Item = DiscoveryKey>,
    {
        let mut known = self.keys.lock();
        keys.into_iter()
            .filter(|key| known.insert(key.clone()))
            .collect()
    }
}

/// Receives each batch of newly discovered observables
pub trait DiscoverySink: Send + Sync {
    fn on_discovered(&self, batch: &[Observable]);
}

impl<F> DiscoverySink for F
where
    F: Fn(&[Observable]) + Send + Sync,
{
    fn on_discovered(&self, batch: &[Observable]) {
        self(batch)
    }
}

/// Turns snapshots into observables, each surfaced exactly once
#[derive(Default)]
pub struct EntityDiscovery {
    registry: DiscoveryRegistry,
    sinks: RwLock<Vec<Arc<dyn DiscoverySink>>>,
    discovered: RwLock<Vec<Observable>>,
}

impl EntityDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sink(&self, sink: Arc<dyn DiscoverySink>) {
        self.sinks.write().push(sink);
    }

    pub fn registry(&self) -> &DiscoveryRegistry {
        &self.registry
    }

    /// Every observable discovered so far, in discovery order
    pub fn observables(&self) -> Vec<Observable> {
        self.discovered.read().clone()
    }

    /// Read every discovered observable against `snapshot`
    pub fn read_all(&self, snapshot: &Snapshot) -> Vec<(Observable, ObservedValue)> {
        self.discovered
            .read()
            .iter()
            .map(|o| (o.clone(), o.read(snapshot)))
            .collect()
    }

    /// Find observables for all instances and tracked contacts in `snapshot`,
    /// register the new ones and hand them to the sinks as one batch.
    pub fn discover(&self, snapshot: &Snapshot) -> Vec<Observable> {
        let mut candidates = Vec::new();
        for instance in snapshot.instances() {
            for kind in ObservableKind::INSTANCE {
                candidates.push(Observable::for_instance(instance, kind));
            }
            for contact in &instance.tracked {
                for kind in ObservableKind::CONTACT {
                    candidates.push(Observable::for_contact(instance, contact, kind));
                }
            }
        }

        // Registered before anything is yielded, so a re-entrant pass
        // cannot surface the same key twice
        let new_keys: HashSet<DiscoveryKey> = self
            .registry
            .claim(candidates.iter().map(|o| o.key.clone()))
            .into_iter()
            .collect();
        if new_keys.is_empty() {
            return Vec::new();
        }

        let batch: Vec<Observable> = candidates
            .into_iter()
            .filter(|o| new_keys.contains(&o.key))
            .collect();

        self.discovered.write().extend(batch.iter().cloned());
        info!(count = batch.len(), "Discovered new observables");

        let sinks: Vec<Arc<dyn DiscoverySink>> = self.sinks.read().clone();
        for sink in sinks {
            sink.on_discovered(&batch);
        }
        batch
    }

    pub fn handle_event(&self, event: &CoordinatorEvent) {
        if let CoordinatorEvent::Updated(snapshot) = event {
            self.discover(snapshot);
        }
    }

    /// Run discovery after every successful coordinator refresh
    pub fn attach(self: &Arc<Self>, coordinator: &PollingCoordinator) -> ListenerId {
        let discovery = Arc::clone(self);
        coordinator.subscribe(move |event| discovery.handle_event(event))
    }
}
