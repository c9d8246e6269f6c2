//! Messaging backend selection
//!
//! Either the remote engine does the work, or the local browser session
//! does. The browser can only send text messages.

use serde_json::Value;
use std::sync::Arc;

use crate::config::BackendKind;
use crate::coordinator::{SessionSnapshotSource, SnapshotSource};
use crate::engine::{Command, EngineClient, Jid};
use crate::error::{Error, Result};
use crate::session::{ContactTarget, SessionClient};

#[derive(Clone)]
pub enum Backend {
    Engine(EngineClient),
    Browser(Arc<SessionClient>),
}

impl Backend {
    pub fn kind(&self) -> BackendKind {
        match self {
            Backend::Engine(_) => BackendKind::Engine,
            Backend::Browser(_) => BackendKind::Browser,
        }
    }

    pub fn session(&self) -> Option<&Arc<SessionClient>> {
        match self {
            Backend::Browser(session) => Some(session),
            Backend::Engine(_) => None,
        }
    }

    /// Where the coordinator polls snapshots from
    pub fn snapshot_source(&self) -> Arc<dyn SnapshotSource> {
        match self {
            Backend::Engine(client) => Arc::new(client.clone()),
            Backend::Browser(session) => Arc::new(SessionSnapshotSource::new(session.clone())),
        }
    }

    /// Run a host service call.
    ///
    /// Engine commands are fire-and-forget: a failure is logged and the call
    /// completes with no reply. Browser failures are typed and returned.
    pub async fn call_service(&self, command: Command) -> Result<Option<Value>> {
        match self {
            Backend::Engine(client) => Ok(client.dispatch(command).await),
            Backend::Browser(_) => self.execute(&command).await,
        }
    }

    /// Run a command once. Sends are never retried.
    pub async fn execute(&self, command: &Command) -> Result<Option<Value>> {
        match self {
            Backend::Engine(client) => client.execute(command).await,
            Backend::Browser(session) => match command {
                Command::SendMessage {
                    contact, message, ..
                } => {
                    session
                        .send_message(&contact_target(contact), message)
                        .await?;
                    Ok(None)
                }
                other => Err(Error::InvalidInput(format!(
                    "service '{}' requires the engine backend",
                    other.service_name()
                ))),
            },
        }
    }
}

/// Interpret a free-form contact: a jid, a phone number, or a display name
pub fn contact_target(contact: &str) -> ContactTarget {
    let contact = contact.trim();
    if contact.contains('@') {
        if let Ok(jid) = Jid::parse(contact) {
            return ContactTarget::Jid(jid);
        }
    }

    let looks_like_phone = contact.chars().any(|c| c.is_ascii_digit())
        && contact
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | ' ' | '-' | '(' | ')'));
    if looks_like_phone {
        if let Ok(jid) = Jid::from_phone(contact) {
            return ContactTarget::Jid(jid);
        }
    }

    ContactTarget::DisplayName(contact.to_string())
}
