//! Polling coordinator
//!
//! Holds the one authoritative snapshot. A refresh either swaps in a new
//! `Arc<Snapshot>` or leaves the old one in place; nothing mutates a
//! snapshot after it has been published.

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::source::SnapshotSource;
use crate::engine::Snapshot;
use crate::error::Result;

/// Handle returned by `subscribe`
pub type ListenerId = u64;

/// Callback invoked synchronously after every refresh attempt
pub type Listener = Arc<dyn Fn(&CoordinatorEvent) + Send + Sync>;

#[derive(Debug, Clone)]
pub enum CoordinatorEvent {
    /// A new snapshot replaced the previous one
    Updated(Arc<Snapshot>),
    /// The refresh failed; the previous snapshot is still current
    Fault(String),
}

#[derive(Debug)]
pub enum RefreshOutcome {
    Updated(Arc<Snapshot>),
    /// Refresh failed and the cached snapshot was kept
    Retained(crate::error::Error),
    /// Another refresh was already in flight
    Skipped,
}

impl RefreshOutcome {
    pub fn is_updated(&self) -> bool {
        matches!(self, RefreshOutcome::Updated(_))
    }
}

pub struct PollingCoordinator {
    source: Arc<dyn SnapshotSource>,
    interval: Duration,
    current: RwLock<Arc<Snapshot>>,
    listeners: Mutex<BTreeMap<ListenerId, Listener>>,
    next_listener: AtomicU64,
    refreshing: tokio::sync::Mutex<()>,
    last_success: RwLock<Option<DateTime<Utc>>>,
    consecutive_failures: AtomicU32,
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PollingCoordinator {
    pub fn new(source: Arc<dyn SnapshotSource>, interval: Duration) -> Self {
        let (shutdown, _) = watch::channel(false);
        PollingCoordinator {
            source,
            interval,
            current: RwLock::new(Arc::new(Snapshot::empty())),
            listeners: Mutex::new(BTreeMap::new()),
            next_listener: AtomicU64::new(1),
            refreshing: tokio::sync::Mutex::new(()),
            last_success: RwLock::new(None),
            consecutive_failures: AtomicU32::new(0),
            shutdown,
            task: Mutex::new(None),
        }
    }

    /// The cached snapshot
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.read().clone()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn last_success(&self) -> Option<DateTime<Utc>> {
        *self.last_success.read()
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::SeqCst)
    }

    /// Register a listener; listeners run in registration order
    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&CoordinatorEvent) + Send + Sync + 'static,
    {
        let id = self.next_listener.fetch_add(1, Ordering::SeqCst);
        self.listeners.lock().insert(id, Arc::new(listener));
        id
    }

    /// Remove a listener. Returns false if the handle was unknown.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.listeners.lock().remove(&id).is_some()
    }

    fn notify(&self, event: &CoordinatorEvent) {
        // Snapshot the list so listeners may (un)subscribe re-entrantly
        let listeners: Vec<Listener> = self.listeners.lock().values().cloned().collect();
        for listener in listeners {
            listener(event);
        }
    }

    /// Fetch once. Failures keep the cached snapshot and notify a fault.
    pub async fn refresh(&self) -> RefreshOutcome {
        let Ok(_guard) = self.refreshing.try_lock() else {
            debug!(source = self.source.name(), "Refresh already in flight; skipping");
            return RefreshOutcome::Skipped;
        };

        match self.source.fetch().await {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                *self.current.write() = snapshot.clone();
                *self.last_success.write() = Some(snapshot.fetched_at());
                let failures = self.consecutive_failures.swap(0, Ordering::SeqCst);
                if failures > 0 {
                    info!(source = self.source.name(), failures, "Snapshot refresh recovered");
                }
                debug!(
                    source = self.source.name(),
                    instances = snapshot.instances().len(),
                    "Snapshot refreshed"
                );
                self.notify(&CoordinatorEvent::Updated(snapshot.clone()));
                RefreshOutcome::Updated(snapshot)
            }
            Err(e) => {
                let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
                warn!(
                    source = self.source.name(),
                    failures,
                    error = %e,
                    "Snapshot refresh failed; keeping previous snapshot"
                );
                self.notify(&CoordinatorEvent::Fault(e.to_string()));
                RefreshOutcome::Retained(e)
            }
        }
    }

    /// Eager startup refresh; a failure here is fatal to the caller
    pub async fn first_refresh(&self) -> Result<Arc<Snapshot>> {
        loop {
            match self.refresh().await {
                RefreshOutcome::Updated(snapshot) => return Ok(snapshot),
                RefreshOutcome::Retained(e) => return Err(e),
                RefreshOutcome::Skipped => {
                    // Someone else is refreshing; wait for them and retry
                    let _ = self.refreshing.lock().await;
                }
            }
        }
    }

    /// Start the periodic refresh loop. Calling it again is a no-op.
    pub fn spawn(self: &Arc<Self>) {
        let mut task = self.task.lock();
        if task.is_some() {
            return;
        }

        let weak: Weak<Self> = Arc::downgrade(self);
        let mut shutdown = self.shutdown.subscribe();
        let period = self.interval;

        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick fires immediately; startup already refreshed
            ticker.tick().await;

            info!(interval = ?period, "Polling coordinator started");

            loop {
                if *shutdown.borrow() {
                    break;
                }
                tokio::select! {
                    _ = ticker.tick() => {
                        let Some(coordinator) = weak.upgrade() else { break };
                        coordinator.refresh().await;
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }

            info!("Polling coordinator stopped");
        }));
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the refresh loop and wait for it to exit
    pub async fn stop(&self) {
        self.shutdown.send_replace(true);
        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    warn!(error = %e, "Polling task ended abnormally");
                }
            }
        }
    }
}
