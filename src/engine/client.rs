//! Engine gateway HTTP client

use reqwest::{header, Client, Method, RequestBuilder, Response};
use secrecy::ExposeSecret;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

use super::commands::Command;
use super::types::{InstanceId, Jid, Snapshot};
use crate::config::EngineConfig;
use crate::error::{Error, Result, TransportError};

/// Header carrying the engine API key
pub const API_KEY_HEADER: &str = "x-api-key";

/// Thin client for the remote engine's HTTP API
#[derive(Clone)]
pub struct EngineClient {
    /// HTTP client with the API key installed as a default header
    client: Client,
    /// Engine root
    base_url: Url,
    request_timeout: Duration,
    snapshot_timeout: Duration,
}

impl EngineClient {
    /// Create a new engine client
    pub fn new(config: &EngineConfig) -> Result<Self> {
        Self::with_base_url(config, &config.base_url())
    }

    /// Create a client against an explicit root URL
    pub fn with_base_url(config: &EngineConfig, base_url: &str) -> Result<Self> {
        let mut headers = header::HeaderMap::new();

        let key = config.api_key.expose_secret();
        if !key.is_empty() {
            let mut value = header::HeaderValue::from_str(key)
                .map_err(|e| Error::Config(format!("Invalid API key format: {}", e)))?;
            value.set_sensitive(true);
            headers.insert(API_KEY_HEADER, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        let mut base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Config(format!("Engine URL '{}' cannot be a base", base_url)));
        }
        // Normalize so joined paths never double up slashes
        let trimmed = base_url.path().trim_end_matches('/').to_string();
        base_url.set_path(&trimmed);

        Ok(EngineClient {
            client,
            base_url,
            request_timeout: config.request_timeout,
            snapshot_timeout: config.snapshot_timeout,
        })
    }

    /// Engine root URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build a URL from raw path segments, percent-encoding each one
    pub fn endpoint<S: AsRef<str>>(&self, segments: &[S]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Config("Engine URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments.iter().map(|s| s.as_ref()));
        Ok(url)
    }

    /// Resolve a caller-supplied sub-path (already URL-encoded) against the root.
    ///
    /// A malformed path, or one whose dot segments climb out of the root, is
    /// the caller's mistake and fails with `InvalidInput`.
    pub fn resolve(&self, path_and_query: &str) -> Result<Url> {
        let root = self.base_url.as_str().trim_end_matches('/');
        let path = path_and_query.trim_start_matches('/');
        let url = Url::parse(&format!("{}/{}", root, path)).map_err(|e| {
            Error::InvalidInput(format!("invalid engine path '{}': {}", path_and_query, e))
        })?;

        let base_path = self.base_url.path().trim_end_matches('/');
        let under_root = url.path() == base_path || url.path().starts_with(&format!("{}/", base_path));
        if url.origin() != self.base_url.origin() || !under_root {
            return Err(Error::InvalidInput(format!(
                "engine path '{}' leaves the engine root",
                path_and_query
            )));
        }
        Ok(url)
    }

    /// Start a request carrying the API key header.
    ///
    /// This is the transport primitive the reverse proxy builds on.
    pub fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client.request(method, url)
    }

    /// Fetch the full instance snapshot
    pub async fn fetch_snapshot(&self) -> Result<Snapshot> {
        let url = self.endpoint(&["api", "instances"])?;
        debug!(%url, "Fetching engine snapshot");

        let response = self
            .request(Method::GET, url)
            .timeout(self.snapshot_timeout)
            .send()
            .await?;
        let response = check_status(&Method::GET, response).await?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))?;
        let snapshot = Snapshot::from_value(body)?;

        debug!(instances = snapshot.instances().len(), "Engine snapshot received");
        Ok(snapshot)
    }

    /// Execute a command and return the engine's JSON reply, if any
    pub async fn execute(&self, command: &Command) -> Result<Option<Value>> {
        let req = command.to_request();
        let url = self.endpoint(&req.segments)?;
        debug!(service = command.service_name(), %url, "Calling engine");

        let mut builder = self
            .request(req.method.clone(), url)
            .timeout(self.request_timeout);
        if let Some(ref body) = req.body {
            builder = builder.json(body);
        }

        let response = check_status(&req.method, builder.send().await?).await?;
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(None);
        }
        Ok(serde_json::from_slice(&bytes).ok())
    }

    /// Fire-and-forget execution.
    ///
    /// Failures are logged and swallowed so a remote outage never blocks or
    /// crashes the caller. `None` means either "failed" or "no reply body";
    /// there is no stronger confirmation than "no error was observed".
    /// Commands are sent exactly once.
    pub async fn dispatch(&self, command: Command) -> Option<Value> {
        match self.execute(&command).await {
            Ok(reply) => {
                info!(service = command.service_name(), "Engine command completed");
                reply
            }
            Err(e) => {
                error!(service = command.service_name(), error = %e, "Engine command failed");
                None
            }
        }
    }

    /// Send a text message
    pub async fn send_message(
        &self,
        instance_id: InstanceId,
        contact: &str,
        message: &str,
    ) -> Result<Option<Value>> {
        self.execute(&Command::SendMessage {
            instance_id,
            contact: contact.to_string(),
            message: message.to_string(),
        })
        .await
    }

    /// Start tracking a contact's presence
    pub async fn track_contact(&self, instance_id: InstanceId, jid: &Jid) -> Result<Option<Value>> {
        self.execute(&Command::TrackContact {
            instance_id,
            jid: jid.clone(),
        })
        .await
    }

    /// Stop tracking a contact
    pub async fn untrack_contact(&self, instance_id: InstanceId, jid: &Jid) -> Result<Option<Value>> {
        self.execute(&Command::UntrackContact {
            instance_id,
            jid: jid.clone(),
        })
        .await
    }
}

/// Map non-2xx responses to `TransportError::Status`
async fn check_status(method: &Method, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let path = response.url().path().to_string();
    let body = response.text().await.unwrap_or_default();
    warn!(%method, %path, status = status.as_u16(), body = %body, "Engine returned an error");

    Err(TransportError::Status {
        method: method.to_string(),
        path,
        status: status.as_u16(),
    }
    .into())
}
