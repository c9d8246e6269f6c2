//! Reverse proxy to the engine
//!
//! `{prefix}/{path}` is forwarded to `{engine root}/{path}` with the query
//! string, the JSON body of state-changing methods and the engine API key.
//! Status, content type and body come back unchanged.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use serde_json::Value;
use tracing::debug;

use super::error::ApiError;
use super::ServerState;
use crate::engine::EngineClient;
use crate::error::{Error, Result};

/// Upstream answer, passed back verbatim
#[derive(Debug, Clone)]
pub struct ProxiedResponse {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub body: Bytes,
}

impl IntoResponse for ProxiedResponse {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.body).into_response();
        match self.content_type {
            Some(content_type) => {
                response.headers_mut().insert(header::CONTENT_TYPE, content_type);
            }
            None => {
                response.headers_mut().remove(header::CONTENT_TYPE);
            }
        }
        response
    }
}

/// Methods whose body is forwarded
fn carries_body(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

pub struct ReverseProxy {
    engine: EngineClient,
}

impl ReverseProxy {
    pub fn new(engine: EngineClient) -> Self {
        ReverseProxy { engine }
    }

    /// Forward one request. Upstream non-2xx statuses are returned, not raised.
    pub async fn forward(
        &self,
        method: Method,
        sub_path: &str,
        query: Option<&str>,
        body: &[u8],
    ) -> Result<ProxiedResponse> {
        let target = match query {
            Some(q) if !q.is_empty() => format!("{}?{}", sub_path, q),
            _ => sub_path.to_string(),
        };
        let url = self.engine.resolve(&target)?;

        let mut request = self.engine.request(method.clone(), url.clone());
        if carries_body(&method) && !body.iter().all(u8::is_ascii_whitespace) {
            let json: Value = serde_json::from_slice(body)
                .map_err(|e| Error::InvalidInput(format!("request body is not valid JSON: {}", e)))?;
            request = request.json(&json);
        }

        let upstream = request.send().await?;
        let status = upstream.status();
        let content_type = upstream.headers().get(header::CONTENT_TYPE).cloned();
        let body = upstream.bytes().await?;

        debug!(%method, %url, %status, bytes = body.len(), "Proxied request");

        Ok(ProxiedResponse {
            status,
            content_type,
            body,
        })
    }
}

/// Axum handler mounted at `{prefix}/{*path}`
pub async fn forward(
    State(state): State<ServerState>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> std::result::Result<ProxiedResponse, ApiError> {
    // Use the raw (still percent-encoded) path so it reaches the engine untouched
    let sub_path = uri
        .path()
        .strip_prefix(state.proxy_prefix.as_ref())
        .unwrap_or_else(|| uri.path());
    Ok(state
        .proxy
        .forward(method, sub_path, uri.query(), &body)
        .await?)
}
