//! Where snapshots come from

use async_trait::async_trait;
use std::sync::Arc;

use crate::engine::{EngineClient, Instance, InstanceId, Snapshot};
use crate::error::Result;
use crate::session::{SessionClient, SessionPhase};

/// Something the coordinator can poll for a fresh snapshot
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Short label used in logs
    fn name(&self) -> &str;

    async fn fetch(&self) -> Result<Snapshot>;
}

#[async_trait]
impl SnapshotSource for EngineClient {
    fn name(&self) -> &str {
        "engine"
    }

    async fn fetch(&self) -> Result<Snapshot> {
        self.fetch_snapshot().await
    }
}

/// Presents the local browser session as a single instance
pub struct SessionSnapshotSource {
    client: Arc<SessionClient>,
    instance_id: InstanceId,
}

impl SessionSnapshotSource {
    pub const DEFAULT_INSTANCE_ID: InstanceId = 1;

    pub fn new(client: Arc<SessionClient>) -> Self {
        SessionSnapshotSource {
            client,
            instance_id: Self::DEFAULT_INSTANCE_ID,
        }
    }
}

/// Instance status reported for a session phase
pub fn session_status(phase: SessionPhase) -> &'static str {
    match phase {
        SessionPhase::LoggedIn => "connected",
        SessionPhase::AwaitingQr => "awaiting_qr",
        _ => "disconnected",
    }
}

#[async_trait]
impl SnapshotSource for SessionSnapshotSource {
    fn name(&self) -> &str {
        "session"
    }

    async fn fetch(&self) -> Result<Snapshot> {
        let phase = self.client.refresh_status().await;
        let instance = Instance {
            id: self.instance_id,
            name: self.client.account().to_string(),
            status: session_status(phase).to_string(),
            presence: None,
            last_seen: None,
            tracked: Vec::new(),
        };
        Ok(Snapshot::new(vec![instance]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::session::driver::fake::{FakeLauncher, FakePage};
    use crate::session::selectors::AUTHENTICATED_MARKER;

    #[tokio::test]
    async fn test_session_source_reports_single_instance() {
        let page = FakePage::new();
        let client = Arc::new(SessionClient::new(
            &SessionConfig::default(),
            FakeLauncher::new(page.clone()),
        ));
        let source = SessionSnapshotSource::new(client.clone());

        let snapshot = source.fetch().await.unwrap();
        assert_eq!(snapshot.instances().len(), 1);
        assert_eq!(snapshot.instances()[0].status, "disconnected");
        assert_eq!(snapshot.instances()[0].name, "default");

        page.show(AUTHENTICATED_MARKER);
        client.start().await.unwrap();
        let snapshot = source.fetch().await.unwrap();
        assert!(snapshot.instances()[0].is_connected());
    }

    #[test]
    fn test_session_status_mapping() {
        assert_eq!(session_status(SessionPhase::AwaitingQr), "awaiting_qr");
        assert_eq!(session_status(SessionPhase::Error), "disconnected");
    }
}
