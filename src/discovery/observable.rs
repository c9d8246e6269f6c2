//! Observable values derived from a snapshot
//!
//! An observable is identified by its [`DiscoveryKey`] and always reads
//! from the *current* snapshot. When the backing instance or contact is
//! gone it reads a default instead of disappearing.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::engine::types::USER_DOMAIN;
use crate::engine::{Instance, InstanceId, Jid, Snapshot, TrackedContact};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservableKind {
    Connectivity,
    Status,
    LastSent,
    LastReceived,
}

impl ObservableKind {
    /// Kinds surfaced for every instance
    pub const INSTANCE: [ObservableKind; 2] = [ObservableKind::Connectivity, ObservableKind::Status];

    /// Kinds surfaced for every tracked contact
    pub const CONTACT: [ObservableKind; 4] = [
        ObservableKind::Connectivity,
        ObservableKind::Status,
        ObservableKind::LastSent,
        ObservableKind::LastReceived,
    ];
}

/// `(instance, kind)` or `(instance, contact, kind)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DiscoveryKey {
    pub instance_id: InstanceId,
    pub jid: Option<Jid>,
    pub kind: ObservableKind,
}

impl DiscoveryKey {
    pub fn instance(instance_id: InstanceId, kind: ObservableKind) -> Self {
        DiscoveryKey {
            instance_id,
            jid: None,
            kind,
        }
    }

    pub fn contact(instance_id: InstanceId, jid: Jid, kind: ObservableKind) -> Self {
        DiscoveryKey {
            instance_id,
            jid: Some(jid),
            kind,
        }
    }

    /// Stable identifier that survives restarts
    pub fn unique_id(&self) -> String {
        match &self.jid {
            None => {
                let suffix = match self.kind {
                    ObservableKind::Connectivity => "connectivity",
                    ObservableKind::Status => "status",
                    ObservableKind::LastSent => "last_message_sent",
                    ObservableKind::LastReceived => "last_message_received",
                };
                format!("whatsapp_{}_{}", self.instance_id, suffix)
            }
            Some(jid) => {
                let suffix = match self.kind {
                    ObservableKind::Connectivity => "online",
                    ObservableKind::Status => "social",
                    ObservableKind::LastSent => "last_message_sent",
                    ObservableKind::LastReceived => "last_message_received",
                };
                format!("whatsapp_{}_{}_{}", self.instance_id, contact_segment(jid), suffix)
            }
        }
    }
}

/// Local part alone for user jids, qualified by the domain otherwise
/// (`123@lid` becomes `123_lid`) so contacts on different domains never share an id
fn contact_segment(jid: &Jid) -> String {
    if jid.domain() == USER_DOMAIN {
        return jid.local_part().to_string();
    }
    let domain: String = jid
        .domain()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("{}_{}", jid.local_part(), domain)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ObservedValue {
    Flag(bool),
    Text(String),
    Timestamp(Option<DateTime<Utc>>),
}

const UNKNOWN: &str = "unknown";

/// A discovered value source
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observable {
    pub key: DiscoveryKey,
    pub unique_id: String,
    pub name: String,
}

impl Observable {
    pub fn for_instance(instance: &Instance, kind: ObservableKind) -> Self {
        let label = match kind {
            ObservableKind::Connectivity => "Connectivity",
            ObservableKind::Status => "Status",
            ObservableKind::LastSent => "Last Message Sent",
            ObservableKind::LastReceived => "Last Message Received",
        };
        let key = DiscoveryKey::instance(instance.id, kind);
        Observable {
            unique_id: key.unique_id(),
            name: format!("WhatsApp {} {}", instance.name, label),
            key,
        }
    }

    pub fn for_contact(instance: &Instance, contact: &TrackedContact, kind: ObservableKind) -> Self {
        let label = match kind {
            ObservableKind::Connectivity => "Online",
            ObservableKind::Status => "Presence",
            ObservableKind::LastSent => "Last Message Sent",
            ObservableKind::LastReceived => "Last Message Received",
        };
        let key = DiscoveryKey::contact(instance.id, contact.jid.clone(), kind);
        Observable {
            unique_id: key.unique_id(),
            name: format!("WhatsApp {} {}", contact.display_name(), label),
            key,
        }
    }

    /// Current value, or the kind's default if the backing object is gone
    pub fn read(&self, snapshot: &Snapshot) -> ObservedValue {
        let kind = self.key.kind;
        match &self.key.jid {
            None => {
                let instance = snapshot.instance(self.key.instance_id);
                match kind {
                    ObservableKind::Connectivity => {
                        ObservedValue::Flag(instance.is_some_and(Instance::is_connected))
                    }
                    ObservableKind::Status => ObservedValue::Text(
                        instance.map_or_else(|| UNKNOWN.to_string(), |i| i.status.clone()),
                    ),
                    ObservableKind::LastSent | ObservableKind::LastReceived => {
                        ObservedValue::Timestamp(None)
                    }
                }
            }
            Some(jid) => {
                let contact = snapshot.contact(self.key.instance_id, jid);
                match kind {
                    ObservableKind::Connectivity => {
                        ObservedValue::Flag(contact.is_some_and(TrackedContact::is_online))
                    }
                    ObservableKind::Status => ObservedValue::Text(
                        contact
                            .and_then(|c| c.presence.clone())
                            .unwrap_or_else(|| UNKNOWN.to_string()),
                    ),
                    ObservableKind::LastSent => {
                        ObservedValue::Timestamp(contact.and_then(|c| c.last_outbound_timestamp))
                    }
                    ObservableKind::LastReceived => {
                        ObservedValue::Timestamp(contact.and_then(|c| c.last_inbound_timestamp))
                    }
                }
            }
        }
    }

    /// Extra attributes reported alongside status values
    pub fn attributes(&self, snapshot: &Snapshot) -> Map<String, Value> {
        let mut attrs = Map::new();
        if self.key.kind != ObservableKind::Status {
            return attrs;
        }
        attrs.insert("instance_id".into(), json!(self.key.instance_id));

        match &self.key.jid {
            None => {
                let presence = snapshot
                    .instance(self.key.instance_id)
                    .and_then(|i| i.presence.clone())
                    .unwrap_or_else(|| UNKNOWN.to_string());
                attrs.insert("presence".into(), json!(presence));
            }
            Some(jid) => {
                attrs.insert("jid".into(), json!(jid));
                if let Some(contact) = snapshot.contact(self.key.instance_id, jid) {
                    attrs.insert("status_since".into(), json!(contact.status_since));
                    attrs.insert("last_online".into(), json!(contact.last_online));
                    attrs.insert("today_duration".into(), json!(contact.today_duration));
                }
            }
        }
        attrs
    }
}
