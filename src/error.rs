//! Error types for wabridge

use std::time::Duration;
use thiserror::Error;

/// Result type alias using wabridge's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Failures talking to the remote engine (or anything reached over HTTP)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The remote answered with a non-2xx status
    #[error("{method} {path} returned status {status}")]
    Status {
        method: String,
        path: String,
        status: u16,
    },

    /// The request did not complete in time
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Could not connect, or the connection broke mid-request
    #[error("connection failed: {0}")]
    Connection(String),

    /// The body could not be decoded
    #[error("invalid response body: {0}")]
    Decode(String),
}

/// Main error type for wabridge
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Engine or proxy transport failure
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The browser session is not logged in
    #[error("Not authenticated: {0}")]
    NotAuthenticated(String),

    /// The browser automation runtime could not be started
    #[error("Browser launch failed: {0}")]
    BrowserLaunch(String),

    /// An expected page element never appeared
    #[error("Selector '{selector}' did not appear within {waited:?}")]
    SelectorTimeout { selector: String, waited: Duration },

    /// More than one contact matched a display name
    #[error("Ambiguous target '{name}': {matches} contacts share this name")]
    AmbiguousTarget { name: String, matches: usize },

    /// Any other browser/page interaction failure
    #[error("Page error: {0}")]
    Page(String),

    /// The session was closed and cannot be reused
    #[error("Session closed")]
    SessionClosed,

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unauthorized access
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Check if error is a client error (user's fault)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidInput(_)
                | Error::NotFound(_)
                | Error::Unauthorized(_)
                | Error::AmbiguousTarget { .. }
        )
    }

    /// Check if error came from the network layer
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let transport = if err.is_timeout() {
            TransportError::Timeout(err.to_string())
        } else if err.is_decode() {
            TransportError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            TransportError::Status {
                method: String::new(),
                path: err.url().map(|u| u.path().to_string()).unwrap_or_default(),
                status: status.as_u16(),
            }
        } else {
            TransportError::Connection(err.to_string())
        };
        Error::Transport(transport)
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::Config(format!("Invalid URL: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_classification() {
        let err = Error::from(TransportError::Status {
            method: "GET".into(),
            path: "/api/instances".into(),
            status: 503,
        });
        assert!(err.is_transport());
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_client_errors() {
        let err = Error::AmbiguousTarget {
            name: "Mom".into(),
            matches: 2,
        };
        assert!(err.is_client_error());
        assert!(!err.is_transport());
        assert!(err.to_string().contains("2 contacts"));
    }
}
