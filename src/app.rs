//! Application context
//!
//! Owns every long-lived component and their start/stop order:
//!
//! - start: session (browser backend), blocking first refresh, poll loop, server
//! - shutdown: poll loop, server and session, network clients
//!
//! Shutdown steps never abort each other; failures are logged.

use axum::Router;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::backend::Backend;
use crate::config::{BackendKind, Config};
use crate::coordinator::{PollingCoordinator, SnapshotSource};
use crate::discovery::{DiscoverySink, EntityDiscovery};
use crate::engine::{EngineClient, Snapshot};
use crate::error::Result;
use crate::server::{self, ReverseProxy, ServerState};
use crate::session::{
    BrowserAvailability, ChromeLauncher, LoginState, SessionClient, SessionSupervisor,
};

pub struct AppContext {
    config: Config,
    engine: EngineClient,
    backend: Backend,
    coordinator: Arc<PollingCoordinator>,
    discovery: Arc<EntityDiscovery>,
    supervisor: Option<SessionSupervisor>,
    server: Mutex<Option<JoinHandle<()>>>,
    server_shutdown: watch::Sender<bool>,
    stopped: AtomicBool,
}

impl AppContext {
    /// Wire all components from configuration. Performs no I/O.
    pub fn build(config: Config) -> Result<Self> {
        let engine = EngineClient::new(&config.engine)?;
        let backend = match config.backend {
            BackendKind::Engine => Backend::Engine(engine.clone()),
            BackendKind::Browser => {
                let launcher = Arc::new(ChromeLauncher::from_config(&config.session));
                Backend::Browser(Arc::new(SessionClient::new(&config.session, launcher)))
            }
        };
        let source = backend.snapshot_source();
        Ok(Self::from_parts(config, engine, backend, source))
    }

    /// Wire components around an explicit backend and snapshot source
    pub fn from_parts(
        config: Config,
        engine: EngineClient,
        backend: Backend,
        source: Arc<dyn SnapshotSource>,
    ) -> Self {
        let coordinator = Arc::new(PollingCoordinator::new(source, config.coordinator.interval));
        let discovery = Arc::new(EntityDiscovery::new());
        discovery.attach(&coordinator);

        let supervisor = backend
            .session()
            .map(|session| SessionSupervisor::new(session.clone()));
        let (server_shutdown, _) = watch::channel(false);

        AppContext {
            config,
            engine,
            backend,
            coordinator,
            discovery,
            supervisor,
            server: Mutex::new(None),
            server_shutdown,
            stopped: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn engine(&self) -> &EngineClient {
        &self.engine
    }

    pub fn coordinator(&self) -> &Arc<PollingCoordinator> {
        &self.coordinator
    }

    pub fn discovery(&self) -> &Arc<EntityDiscovery> {
        &self.discovery
    }

    pub fn add_discovery_sink(&self, sink: Arc<dyn DiscoverySink>) {
        self.discovery.add_sink(sink);
    }

    /// Start the session (if any), refresh once, then poll periodically.
    ///
    /// Fails only if the first refresh fails.
    pub async fn start(&self) -> Result<Arc<Snapshot>> {
        if let Some(ref supervisor) = self.supervisor {
            match supervisor.start().await? {
                BrowserAvailability::Ready => {
                    match supervisor.client().resolve_login_state().await {
                        LoginState::LoggedIn => info!("Browser session is logged in"),
                        LoginState::AwaitingQr(_) => {
                            info!("Browser session is waiting for a QR scan (GET /api/session/qr)")
                        }
                        LoginState::Error(failure) => {
                            warn!(error = %failure, "Browser session could not resolve its login state")
                        }
                    }
                }
                BrowserAvailability::Unavailable(reason) => {
                    warn!(%reason, "Running without browser automation");
                }
            }
        }

        let snapshot = self.coordinator.first_refresh().await?;
        info!(
            backend = %self.backend.kind(),
            instances = snapshot.instances().len(),
            "Initial snapshot loaded"
        );
        self.coordinator.spawn();
        Ok(snapshot)
    }

    pub fn server_state(&self) -> ServerState {
        ServerState {
            proxy: Arc::new(ReverseProxy::new(self.engine.clone())),
            backend: self.backend.clone(),
            coordinator: self.coordinator.clone(),
            discovery: self.discovery.clone(),
            proxy_prefix: Arc::from(self.config.server.proxy_prefix.trim_end_matches('/')),
        }
    }

    pub fn router(&self) -> Router {
        server::router(self.server_state(), self.config.server.auth.clone())
    }

    /// Bind the configured address and serve in the background
    pub async fn spawn_server(&self) -> Result<SocketAddr> {
        let listener = tokio::net::TcpListener::bind(server::bind_addr(&self.config.server)?).await?;
        let addr = listener.local_addr()?;
        let app = self.router();

        let mut shutdown = self.server_shutdown.subscribe();
        let handle = tokio::spawn(async move {
            let signal = async move {
                let _ = shutdown.wait_for(|stop| *stop).await;
            };
            if let Err(e) = server::serve(listener, app, signal).await {
                warn!(error = %e, "Server stopped with an error");
            }
        });

        match self.supervisor {
            Some(ref supervisor) => supervisor.attach_server(handle),
            None => {
                if let Some(previous) = self.server.lock().replace(handle) {
                    previous.abort();
                }
            }
        }
        Ok(addr)
    }

    pub fn is_running(&self) -> bool {
        !self.stopped.load(Ordering::SeqCst) && self.coordinator.is_running()
    }

    /// Stop everything. Idempotent; every step runs even if another fails.
    pub async fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Shutting down");

        self.coordinator.stop().await;

        // Let in-flight requests drain before the session goes away
        self.server_shutdown.send_replace(true);
        let server = self.server.lock().take();
        if let Some(mut handle) = server {
            if tokio::time::timeout(server::DRAIN_TIMEOUT, &mut handle).await.is_err() {
                warn!("Server did not drain in time; aborting");
                handle.abort();
            }
        }

        // Also drains the session server, if one is attached
        if let Some(ref supervisor) = self.supervisor {
            supervisor.shutdown().await;
        }

        // The engine client pool closes when the last handle drops
        info!("Shutdown complete");
    }
}
