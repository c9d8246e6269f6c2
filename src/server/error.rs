//! HTTP mapping for crate errors

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::error::{Error, TransportError};

/// Error wrapper returned by handlers
pub struct ApiError(pub Error);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            Error::InvalidInput(_) | Error::Json(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::NotAuthenticated(_) | Error::AmbiguousTarget { .. } => StatusCode::CONFLICT,
            Error::Transport(TransportError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            Error::Transport(_) => StatusCode::BAD_GATEWAY,
            Error::SessionClosed | Error::BrowserLaunch(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(%status, error = %self.0, "Request failed");
        }
        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let unreachable = ApiError(Error::Transport(TransportError::Connection("refused".into())));
        assert_eq!(unreachable.status(), StatusCode::BAD_GATEWAY);

        let slow = ApiError(Error::Transport(TransportError::Timeout("5s".into())));
        assert_eq!(slow.status(), StatusCode::GATEWAY_TIMEOUT);

        let ambiguous = ApiError(Error::AmbiguousTarget {
            name: "Alex".into(),
            matches: 2,
        });
        assert_eq!(ambiguous.status(), StatusCode::CONFLICT);
    }
}
