//! Lifecycle owner for the long-lived browser session
//!
//! Created once at startup and torn down once. Holds the session client
//! and the task of the local server that exposes it.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

use super::client::SessionClient;
use super::state::BrowserAvailability;
use crate::error::Result;
use crate::server::DRAIN_TIMEOUT;

pub struct SessionSupervisor {
    client: Arc<SessionClient>,
    server: Mutex<Option<JoinHandle<()>>>,
    started: AtomicBool,
    stopped: AtomicBool,
}

impl SessionSupervisor {
    pub fn new(client: Arc<SessionClient>) -> Self {
        SessionSupervisor {
            client,
            server: Mutex::new(None),
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn client(&self) -> &Arc<SessionClient> {
        &self.client
    }

    /// Start the browser once; later calls report the existing session
    pub async fn start(&self) -> Result<BrowserAvailability> {
        if self.started.swap(true, Ordering::SeqCst) {
            tracing::debug!(account = %self.client.account(), "Session supervisor already started");
        }
        self.client.initialize().await
    }

    /// Hand over the local server task so shutdown can stop it
    pub fn attach_server(&self, handle: JoinHandle<()>) {
        if let Some(previous) = self.server.lock().replace(handle) {
            tracing::warn!("Replacing an already attached session server task");
            previous.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        if !self.started.load(Ordering::SeqCst) || self.stopped.load(Ordering::SeqCst) {
            return false;
        }
        match self.server.lock().as_ref() {
            Some(handle) => !handle.is_finished(),
            None => true,
        }
    }

    /// Wait for the server task to drain, then close the browser. Runs at most once.
    ///
    /// The server must already have been told to stop; it is aborted if it
    /// does not finish within the drain timeout.
    pub async fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        let server = self.server.lock().take();
        if let Some(mut handle) = server {
            if tokio::time::timeout(DRAIN_TIMEOUT, &mut handle).await.is_err() {
                tracing::warn!("Session server did not drain in time; aborting");
                handle.abort();
            }
        }
        self.client.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::session::driver::fake::{FakeLauncher, FakePage};
    use crate::session::SessionPhase;

    fn supervisor(page: &Arc<FakePage>) -> (SessionSupervisor, Arc<FakeLauncher>) {
        let launcher = FakeLauncher::new(page.clone());
        let client = SessionClient::new(&SessionConfig::default(), launcher.clone());
        (SessionSupervisor::new(Arc::new(client)), launcher)
    }

    #[tokio::test]
    async fn test_single_browser_per_supervisor() {
        let page = FakePage::new();
        let (supervisor, launcher) = supervisor(&page);

        assert!(!supervisor.is_running());
        supervisor.start().await.unwrap();
        supervisor.start().await.unwrap();
        assert!(supervisor.is_running());
        assert_eq!(launcher.launches(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_server_and_closes_session() {
        let page = FakePage::new();
        let (supervisor, _) = supervisor(&page);
        supervisor.start().await.unwrap();
        supervisor.attach_server(tokio::spawn(std::future::pending::<()>()));
        assert!(supervisor.is_running());

        supervisor.shutdown().await;
        supervisor.shutdown().await;

        assert!(!supervisor.is_running());
        assert!(page.is_closed());
        assert_eq!(supervisor.client().phase(), SessionPhase::Closed);
    }
}
