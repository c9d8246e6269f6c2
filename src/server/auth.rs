//! Caller authentication for the local server
//!
//! Callers present `Authorization: Bearer <secret>`, where the secret is one
//! of the configured tokens (token mode) or the shared password (password mode).

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use secrecy::ExposeSecret;
use std::sync::Arc;

use super::error::ApiError;
use crate::config::{AuthConfig, AuthMode};
use crate::error::Error;

/// Extract a bearer credential from the request headers
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|raw| raw.strip_prefix("Bearer ").or_else(|| raw.strip_prefix("bearer ")))
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Whether `presented` satisfies the configured auth mode
pub fn is_authorized(auth: &AuthConfig, presented: Option<&str>) -> bool {
    match auth.mode {
        AuthMode::None => true,
        AuthMode::Token => presented.is_some_and(|p| {
            auth.tokens
                .iter()
                .map(|t| t.expose_secret())
                .filter(|t| !t.is_empty())
                .any(|t| constant_time_eq(t.as_bytes(), p.as_bytes()))
        }),
        AuthMode::Password => match (&auth.password, presented) {
            (Some(password), Some(p)) => {
                let password = password.expose_secret();
                !password.is_empty() && constant_time_eq(password.as_bytes(), p.as_bytes())
            }
            _ => false,
        },
    }
}

/// Middleware rejecting unauthenticated callers with 401
pub async fn require_auth(
    State(auth): State<Arc<AuthConfig>>,
    request: Request,
    next: Next,
) -> Response {
    if is_authorized(&auth, bearer_token(request.headers())) {
        return next.run(request).await;
    }
    tracing::debug!(path = %request.uri().path(), "Rejected unauthenticated request");
    ApiError(Error::Unauthorized("missing or invalid credentials".to_string())).into_response()
}
