//! Client error type.
//!
//! Every failure surfaced by the API client falls into one of the
//! [`ClientError`] variants. Upstream HTTP errors keep the status code and,
//! when the body could be parsed, the backend's structured payload:
//!
//! ```json
//! { "detail": "Invalid username or password", "error_code": "auth_failed" }
//! ```

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Structured error body returned by the backend on non-2xx responses.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ErrorPayload {
    /// Human-readable message, shown verbatim to the user.
    pub detail: String,
    /// Optional machine-readable code.
    #[serde(default)]
    pub error_code: Option<String>,
}

#[derive(Debug, Error)]
pub enum ClientError {
    /// The backend answered with a non-2xx status.
    #[error("{status}: {}", .payload.as_ref().map(|p| p.detail.as_str()).unwrap_or(.status_text.as_str()))]
    Http {
        status: StatusCode,
        status_text: String,
        payload: Option<ErrorPayload>,
    },

    /// The backend could not be reached at all.
    #[error("Failed to connect to backend server: {0}")]
    Network(#[source] reqwest::Error),

    /// A successful response carried a body we could not decode.
    #[error("Invalid response body: {0}")]
    Decode(String),

    /// A polled job reached the `failed` state.
    #[error("Job failed: {0}")]
    JobFailed(String),

    /// A request was rejected locally before any I/O happened.
    #[error("Invalid request: {0}")]
    Invalid(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Writing a downloaded body to local storage failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// HTTP status of an upstream error, if this is one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Http { status, .. } => Some(*status),
            ClientError::Network(e) => e.status(),
            _ => None,
        }
    }

    /// The message to show the user: upstream `detail` when present,
    /// otherwise the status text or the error's own display.
    pub fn detail(&self) -> String {
        match self {
            ClientError::Http {
                payload: Some(p), ..
            } => p.detail.clone(),
            ClientError::Http { status_text, .. } => status_text.clone(),
            ClientError::JobFailed(msg) => msg.clone(),
            other => other.to_string(),
        }
    }

    /// The backend's `error_code`, if any.
    pub fn error_code(&self) -> Option<&str> {
        match self {
            ClientError::Http {
                payload: Some(p), ..
            } => p.error_code.as_deref(),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }

    /// Whether a manual retry from the user is likely to help.
    ///
    /// Nothing in this crate retries automatically; this only drives messaging.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Network(_) => true,
            ClientError::Http { status, .. } => status.is_server_error(),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else {
            ClientError::Network(err)
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Decode(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn http(status: u16, payload: Option<ErrorPayload>) -> ClientError {
        let status = StatusCode::from_u16(status).unwrap();
        ClientError::Http {
            status,
            status_text: status.canonical_reason().unwrap_or("").to_string(),
            payload,
        }
    }

    #[test]
    fn detail_prefers_payload() {
        let err = http(
            400,
            Some(ErrorPayload {
                detail: "Maximum 10 files per upload".into(),
                error_code: None,
            }),
        );
        assert_eq!(err.detail(), "Maximum 10 files per upload");
        assert!(err.to_string().contains("Maximum 10 files"));
    }

    #[test]
    fn detail_falls_back_to_status_text() {
        let err = http(502, None);
        assert_eq!(err.detail(), "Bad Gateway");
        assert!(err.is_retryable());
        assert!(!err.is_unauthorized());
    }

    #[test]
    fn unauthorized_and_error_code() {
        let err = http(
            401,
            Some(ErrorPayload {
                detail: "Invalid or expired token".into(),
                error_code: Some("token_expired".into()),
            }),
        );
        assert!(err.is_unauthorized());
        assert!(!err.is_retryable());
        assert_eq!(err.error_code(), Some("token_expired"));
    }

    #[test]
    fn payload_error_code_is_optional() {
        let p: ErrorPayload = serde_json::from_str(r#"{"detail":"Job not found"}"#).unwrap();
        assert_eq!(p.detail, "Job not found");
        assert!(p.error_code.is_none());
    }
}
