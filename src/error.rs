use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::models::ErrorBody;

/// Failures of the durable quota backend. These never reach an HTTP caller.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("quota store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("quota store payload is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("quota store request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("quota store returned status {0}")]
    Status(u16),
    #[error("quota store timed out after {0:?}")]
    Timeout(std::time::Duration),
}

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("{0}")]
    Http(#[from] reqwest::Error),
    #[error("upstream returned {status}: {message}")]
    Status { status: u16, message: String },
}

// Startup misconfiguration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("--blob-url is required when --store blob is selected")]
    MissingBlobUrl,
    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Errors surfaced to the caller of the completion endpoint.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("{0}")]
    MalformedRequest(String),
    #[error("API key not configured")]
    CredentialMissing,
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ProxyError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            ProxyError::CredentialMissing | ProxyError::Upstream(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn body(&self) -> ErrorBody {
        match self {
            ProxyError::Upstream(e) => ErrorBody {
                error: "Internal server error".to_string(),
                message: Some(e.to_string()),
            },
            other => ErrorBody {
                error: other.to_string(),
                message: None,
            },
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_error_kind() {
        assert_eq!(ProxyError::MethodNotAllowed.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(
            ProxyError::MalformedRequest("bad".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ProxyError::CredentialMissing.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn upstream_failure_body_carries_message() {
        let err = ProxyError::Upstream(UpstreamError::Status {
            status: 502,
            message: "bad gateway".into(),
        });
        let body = err.body();
        assert_eq!(body.error, "Internal server error");
        assert_eq!(body.message.as_deref(), Some("upstream returned 502: bad gateway"));
    }
}
