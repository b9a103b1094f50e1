//! Error types for the school API client.
//!
//! # Design
//! Every non-2xx response lands in `ApiError::Http` carrying the status code
//! and the server's JSON error payload. The display text is the payload's
//! `detail` (or `message`) so callers can show it directly. The remaining
//! variants cover failures that happen before or after the server answers.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The server returned a non-2xx status.
    #[error("{message}")]
    Http {
        status: u16,
        message: String,
        body: Value,
    },

    /// The transport could not complete the round-trip.
    #[error("transport failed: {0}")]
    Transport(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// Persisted session storage could not be read or written.
    #[error("session storage error: {0}")]
    Storage(String),
}

impl ApiError {
    /// HTTP status code, when the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The server error payload's `detail` field, if it is a string.
    pub fn detail(&self) -> Option<&str> {
        match self {
            ApiError::Http { body, .. } => body.get("detail").and_then(Value::as_str),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn http_error_displays_message() {
        let err = ApiError::Http {
            status: 400,
            message: "Email already registered".to_string(),
            body: json!({"detail": "Email already registered"}),
        };
        assert_eq!(err.to_string(), "Email already registered");
        assert_eq!(err.status(), Some(400));
        assert_eq!(err.detail(), Some("Email already registered"));
    }

    #[test]
    fn non_string_detail_is_not_exposed() {
        let err = ApiError::Http {
            status: 422,
            message: "Request failed".to_string(),
            body: json!({"detail": [{"loc": ["body", "name"], "msg": "field required"}]}),
        };
        assert_eq!(err.detail(), None);
        assert!(!err.is_not_found());
    }

    #[test]
    fn transport_errors_have_no_status() {
        let err = ApiError::Transport("connection refused".to_string());
        assert_eq!(err.status(), None);
        assert!(!err.is_unauthorized());
    }
}
