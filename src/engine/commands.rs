//! Engine commands
//!
//! Each variant maps to one engine endpoint. Commands deserialize from the
//! service-call payloads the host sends (`{"service": "send_message", ...}`),
//! with `instance_id` defaulting to 1 like the host integration does.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::types::{InstanceId, Jid};

/// Chat modifications supported by `/api/chats/{id}/{jid}/modify`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatAction {
    Pin,
    Unpin,
    Archive,
    Unarchive,
    Delete,
    MarkRead,
    Mute,
    Unmute,
}

/// Account presence values accepted by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    Available,
    Unavailable,
    Composing,
    Recording,
    Paused,
}

fn default_instance() -> InstanceId {
    1
}

/// A command for the remote engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "service", rename_all = "snake_case")]
pub enum Command {
    SendMessage {
        #[serde(default = "default_instance")]
        instance_id: InstanceId,
        /// Jid, phone number or display name; resolved by the engine
        contact: String,
        message: String,
    },
    ModifyChat {
        #[serde(default = "default_instance")]
        instance_id: InstanceId,
        jid: Jid,
        action: ChatAction,
    },
    SetPresence {
        #[serde(default = "default_instance")]
        instance_id: InstanceId,
        presence: Presence,
    },
    CreateGroup {
        #[serde(default = "default_instance")]
        instance_id: InstanceId,
        title: String,
        #[serde(default)]
        participants: Vec<Jid>,
    },
    TrackContact {
        #[serde(default = "default_instance")]
        instance_id: InstanceId,
        jid: Jid,
    },
    UntrackContact {
        #[serde(default = "default_instance")]
        instance_id: InstanceId,
        jid: Jid,
    },
}

/// HTTP shape of a command: method, path segments and optional JSON body
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRequest {
    pub method: Method,
    pub segments: Vec<String>,
    pub body: Option<Value>,
}

impl Command {
    /// Service name as registered with the host
    pub fn service_name(&self) -> &'static str {
        match self {
            Command::SendMessage { .. } => "send_message",
            Command::ModifyChat { .. } => "modify_chat",
            Command::SetPresence { .. } => "set_presence",
            Command::CreateGroup { .. } => "create_group",
            Command::TrackContact { .. } => "track_contact",
            Command::UntrackContact { .. } => "untrack_contact",
        }
    }

    pub fn to_request(&self) -> CommandRequest {
        let seg = |parts: &[&str]| parts.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        match self {
            Command::SendMessage {
                instance_id,
                contact,
                message,
            } => CommandRequest {
                method: Method::POST,
                segments: seg(&["api", "send_message"]),
                body: Some(json!({
                    "instanceId": instance_id,
                    "contact": contact,
                    "message": message,
                })),
            },
            Command::ModifyChat {
                instance_id,
                jid,
                action,
            } => CommandRequest {
                method: Method::POST,
                segments: seg(&["api", "chats", &instance_id.to_string(), jid.as_str(), "modify"]),
                body: Some(json!({ "action": action })),
            },
            Command::SetPresence {
                instance_id,
                presence,
            } => CommandRequest {
                method: Method::POST,
                segments: seg(&["api", "instances", &instance_id.to_string(), "presence"]),
                body: Some(json!({ "presence": presence })),
            },
            Command::CreateGroup {
                instance_id,
                title,
                participants,
            } => CommandRequest {
                method: Method::POST,
                segments: seg(&["api", "groups", &instance_id.to_string()]),
                body: Some(json!({ "title": title, "participants": participants })),
            },
            Command::TrackContact { instance_id, jid } => CommandRequest {
                method: Method::POST,
                segments: seg(&["api", "social", "tracked"]),
                body: Some(json!({ "instanceId": instance_id, "jid": jid })),
            },
            Command::UntrackContact { instance_id, jid } => CommandRequest {
                method: Method::DELETE,
                segments: seg(&["api", "social", "tracked", &instance_id.to_string(), jid.as_str()]),
                body: None,
            },
        }
    }
}
