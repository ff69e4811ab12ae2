//! Shared response helpers and the relay API error type.

use super::*;

/// Caller-facing error: HTTP status, single-line message, optional detail.
/// Stack traces never leave the process.
#[derive(Debug)]
pub(super) struct RelayApiError {
    pub(super) status: StatusCode,
    pub(super) message: String,
    pub(super) details: Option<String>,
}

impl RelayApiError {
    pub(super) fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: None,
        }
    }

    pub(super) fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub(super) fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "missing or invalid relay key")
    }

    pub(super) fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub(super) fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new(StatusCode::PAYLOAD_TOO_LARGE, message)
    }

    pub(super) fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub(super) fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub(super) fn forge(error: &ForgeError) -> Self {
        Self::internal("forge call failed").with_details(error.to_string())
    }

    pub(super) fn store(error: &RelayStoreError) -> Self {
        Self::internal("storage failure").with_details(error.to_string())
    }
}

impl IntoResponse for RelayApiError {
    fn into_response(self) -> Response {
        let mut payload = json!({ "error": self.message });
        if let Some(details) = self.details {
            payload["details"] = json!(details);
        }
        pretty_json_response(self.status, &payload)
    }
}

/// All relay responses are pretty-printed JSON.
pub(super) fn pretty_json_response(status: StatusCode, payload: &Value) -> Response {
    let mut body = serde_json::to_string_pretty(payload).unwrap_or_else(|_| "{}".to_string());
    body.push('\n');
    (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response()
}
