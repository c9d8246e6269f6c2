//! Snapshot schema returned by `GET /api/instances`
//!
//! The engine answers with loosely-shaped JSON. Everything is validated here,
//! at the gateway boundary: malformed instances or contacts are logged and
//! dropped, duplicate `(instance, jid)` pairs keep their first occurrence.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use tracing::warn;

use crate::error::{Error, Result, TransportError};

/// Domain used by individual (non-group) WhatsApp addresses
pub const USER_DOMAIN: &str = "s.whatsapp.net";

/// Stable engine-side instance identifier
pub type InstanceId = i64;

/// A contact address in `localpart@domain` form, normalized
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Jid(String);

impl Jid {
    /// Parse and normalize a jid.
    ///
    /// Device suffixes are dropped (`user:3@s.whatsapp.net` becomes
    /// `user@s.whatsapp.net`); broadcast addresses are rejected.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let (local, domain) = raw
            .split_once('@')
            .ok_or_else(|| Error::InvalidInput(format!("jid '{}' has no domain", raw)))?;

        let local = match local.split_once(':') {
            Some((user, device)) if device.chars().all(|c| c.is_ascii_digit()) => user,
            _ => local,
        };

        if local.is_empty() || domain.is_empty() || domain.contains('@') {
            return Err(Error::InvalidInput(format!("jid '{}' is malformed", raw)));
        }
        if domain == "broadcast" {
            return Err(Error::InvalidInput(format!("jid '{}' is a broadcast address", raw)));
        }

        Ok(Jid(format!("{}@{}", local, domain)))
    }

    /// Build a user jid from a phone number, ignoring formatting characters
    pub fn from_phone(phone: &str) -> Result<Self> {
        let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            return Err(Error::InvalidInput(format!("'{}' is not a phone number", phone)));
        }
        Ok(Jid(format!("{}@{}", digits, USER_DOMAIN)))
    }

    /// Part before the `@`
    pub fn local_part(&self) -> &str {
        self.0.split('@').next().unwrap_or_default()
    }

    /// Part after the `@`
    pub fn domain(&self) -> &str {
        self.0.split_once('@').map(|(_, d)| d).unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Jid {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Jid::parse(&value)
    }
}

impl From<Jid> for String {
    fn from(jid: Jid) -> Self {
        jid.0
    }
}

impl std::str::FromStr for Jid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Jid::parse(s)
    }
}

impl std::fmt::Display for Jid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A contact under presence/activity tracking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedContact {
    pub jid: Jid,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub presence: Option<String>,
    #[serde(default, alias = "statusSince", deserialize_with = "lenient_timestamp")]
    pub status_since: Option<DateTime<Utc>>,
    #[serde(default, alias = "lastOnline", deserialize_with = "lenient_timestamp")]
    pub last_online: Option<DateTime<Utc>>,
    /// Seconds online today
    #[serde(default, alias = "todayDuration", deserialize_with = "lenient_seconds")]
    pub today_duration: u64,
    #[serde(default, alias = "lastInboundTimestamp", deserialize_with = "lenient_timestamp")]
    pub last_inbound_timestamp: Option<DateTime<Utc>>,
    #[serde(default, alias = "lastOutboundTimestamp", deserialize_with = "lenient_timestamp")]
    pub last_outbound_timestamp: Option<DateTime<Utc>>,
}

impl TrackedContact {
    /// Presence states that count as "online"
    pub const ONLINE_PRESENCES: [&'static str; 3] = ["available", "composing", "recording"];

    pub fn is_online(&self) -> bool {
        self.presence
            .as_deref()
            .is_some_and(|p| Self::ONLINE_PRESENCES.contains(&p))
    }

    /// Display name, falling back to the jid's local part
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| self.jid.local_part())
    }
}

/// A remote messaging account known to the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub id: InstanceId,
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub presence: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub last_seen: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tracked: Vec<TrackedContact>,
}

impl Instance {
    pub fn is_connected(&self) -> bool {
        self.status == "connected"
    }

    pub fn contact(&self, jid: &Jid) -> Option<&TrackedContact> {
        self.tracked.iter().find(|c| &c.jid == jid)
    }
}

/// Wire shape used before validation; `tracked` entries are checked one by one
#[derive(Deserialize)]
struct RawInstance {
    id: InstanceId,
    name: String,
    status: String,
    #[serde(default)]
    presence: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    last_seen: Option<DateTime<Utc>>,
    #[serde(default)]
    tracked: Option<Vec<Value>>,
}

/// One atomic capture of all instances and their tracked contacts
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    instances: Vec<Instance>,
    fetched_at: DateTime<Utc>,
}

impl Snapshot {
    /// Build a snapshot from already-validated instances
    pub fn new(instances: Vec<Instance>) -> Self {
        Snapshot {
            instances,
            fetched_at: Utc::now(),
        }
    }

    pub fn empty() -> Self {
        Snapshot::new(Vec::new())
    }

    /// Validate an engine response body.
    ///
    /// The body must be a JSON array. Entries that fail validation are
    /// quarantined (logged and skipped) rather than failing the whole poll.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Array(entries) = value else {
            return Err(TransportError::Decode("instances payload is not an array".to_string()).into());
        };

        let mut seen_instances = HashSet::new();
        let mut instances = Vec::with_capacity(entries.len());

        for (index, entry) in entries.into_iter().enumerate() {
            let raw: RawInstance = match serde_json::from_value(entry) {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(index, error = %e, "Quarantining malformed instance entry");
                    continue;
                }
            };

            if !seen_instances.insert(raw.id) {
                warn!(instance_id = raw.id, "Dropping duplicate instance entry");
                continue;
            }

            let mut seen_jids = HashSet::new();
            let mut tracked = Vec::new();
            for contact in raw.tracked.unwrap_or_default() {
                match serde_json::from_value::<TrackedContact>(contact) {
                    Ok(contact) if seen_jids.insert(contact.jid.clone()) => tracked.push(contact),
                    Ok(contact) => {
                        warn!(instance_id = raw.id, jid = %contact.jid, "Dropping duplicate tracked contact");
                    }
                    Err(e) => {
                        warn!(instance_id = raw.id, error = %e, "Quarantining malformed tracked contact");
                    }
                }
            }

            instances.push(Instance {
                id: raw.id,
                name: raw.name,
                status: raw.status,
                presence: raw.presence,
                last_seen: raw.last_seen,
                tracked,
            });
        }

        Ok(Snapshot::new(instances))
    }

    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    pub fn instance(&self, id: InstanceId) -> Option<&Instance> {
        self.instances.iter().find(|i| i.id == id)
    }

    pub fn contact(&self, instance_id: InstanceId, jid: &Jid) -> Option<&TrackedContact> {
        self.instance(instance_id).and_then(|i| i.contact(jid))
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

/// Accepts RFC 3339, SQLite `YYYY-MM-DD HH:MM:SS`, epoch seconds or millis.
/// Anything else becomes `None`.
fn lenient_timestamp<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| parse_timestamp(&v)))
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                    .ok()
                    .map(|naive| Utc.from_utc_datetime(&naive))
            }),
        Value::Number(n) => {
            let n = n.as_i64()?;
            // Anything past year ~2286 in seconds is really milliseconds
            if n > 9_999_999_999 {
                Utc.timestamp_millis_opt(n).single()
            } else {
                Utc.timestamp_opt(n, 0).single()
            }
        }
        _ => None,
    }
}

fn lenient_seconds<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_jid_normalization() {
        let jid = Jid::parse("123:7@s.whatsapp.net").unwrap();
        assert_eq!(jid.as_str(), "123@s.whatsapp.net");
        assert_eq!(jid.local_part(), "123");
        assert_eq!(jid.domain(), "s.whatsapp.net");

        assert!(Jid::parse("no-domain").is_err());
        assert!(Jid::parse("@s.whatsapp.net").is_err());
        assert!(Jid::parse("status@broadcast").is_err());
    }

    #[test]
    fn test_jid_from_phone() {
        let jid = Jid::from_phone("+49 (170) 123-4567").unwrap();
        assert_eq!(jid.as_str(), "491701234567@s.whatsapp.net");
        assert!(Jid::from_phone("abc").is_err());
    }

    #[test]
    fn test_snapshot_parsing() {
        let snapshot = Snapshot::from_value(json!([
            {
                "id": 1,
                "name": "Main",
                "status": "connected",
                "presence": "available",
                "ha_user_id": null,
                "qr": null,
                "tracked": [
                    {
                        "jid": "123@s.whatsapp.net",
                        "name": "Alice",
                        "presence": "available",
                        "status_since": "2024-05-01T10:00:00.000Z",
                        "last_online": "2024-05-01 09:00:00",
                        "today_duration": 360,
                        "lastInboundTimestamp": 1714557600
                    }
                ]
            }
        ]))
        .unwrap();

        let instance = snapshot.instance(1).unwrap();
        assert!(instance.is_connected());
        let jid = Jid::parse("123@s.whatsapp.net").unwrap();
        let contact = snapshot.contact(1, &jid).unwrap();
        assert!(contact.is_online());
        assert_eq!(contact.display_name(), "Alice");
        assert_eq!(contact.today_duration, 360);
        assert!(contact.status_since.is_some());
        assert!(contact.last_online.is_some());
        assert_eq!(
            contact.last_inbound_timestamp.unwrap().timestamp(),
            1_714_557_600
        );
        assert!(contact.last_outbound_timestamp.is_none());
    }

    #[test]
    fn test_malformed_entries_are_quarantined() {
        let snapshot = Snapshot::from_value(json!([
            {"id": 1, "name": "Main", "status": "connected", "tracked": [
                {"jid": "1@s.whatsapp.net"},
                {"jid": "1:2@s.whatsapp.net"},
                {"jid": "garbage"},
                {"name": "no jid"}
            ]},
            {"id": "two", "name": "Broken"},
            {"id": 1, "name": "Duplicate", "status": "connected"},
            {"id": 3, "name": "Side", "status": "disconnected", "tracked": null}
        ]))
        .unwrap();

        assert_eq!(snapshot.instances().len(), 2);
        assert_eq!(snapshot.instance(1).unwrap().name, "Main");
        assert_eq!(snapshot.instance(1).unwrap().tracked.len(), 1);
        assert!(snapshot.instance(3).unwrap().tracked.is_empty());
    }

    #[test]
    fn test_non_array_payload_is_transport_error() {
        let err = Snapshot::from_value(json!({"error": "nope"})).unwrap_err();
        assert!(err.is_transport());
    }

    #[test]
    fn test_missing_contact_is_none() {
        let snapshot = Snapshot::empty();
        let jid = Jid::parse("1@s.whatsapp.net").unwrap();
        assert!(snapshot.contact(1, &jid).is_none());
        assert!(snapshot.is_empty());
    }
}
