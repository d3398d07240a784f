//! Error types for API requests

use std::time::Duration;

use serde_json::Value;

use crate::transport::TransportError;

/// Errors surfaced to API callers.
///
/// Recoverable conditions (storage outages, a wrong auth scheme, an expired
/// access token) are handled inside the client and never show up here.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("transport failure: {0}")]
    Transport(String),

    /// Final response was not 2xx. `data` is the parsed JSON body, if any.
    #[error("{message}")]
    Http {
        status: u16,
        data: Option<Value>,
        message: String,
    },

    #[error("response decode failed: {0}")]
    Decode(String),
}

impl Error {
    /// Build an `Http` error, deriving the message from the body.
    pub fn http(status: u16, data: Option<Value>) -> Self {
        let message = error_message(status, data.as_ref());
        Error::Http {
            status,
            data,
            message,
        }
    }

    /// HTTP status for `Http` errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    /// Timeouts and network failures: the request never produced a response.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Timeout(_) | Error::Transport(_))
    }
}

impl From<TransportError> for Error {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout(after) => Error::Timeout(after),
            TransportError::Network(msg) => Error::Transport(msg),
            TransportError::Body(msg) => Error::InvalidRequest(msg),
        }
    }
}

/// Result alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Best-effort human readable message for a failed response.
///
/// Order: non-empty `message` string, first element of a non-empty `message`
/// array, then the first non-empty of `message`/`error`/`detail` (strings
/// as-is, other values JSON-encoded), then `HTTP <status>`.
pub fn error_message(status: u16, data: Option<&Value>) -> String {
    let Some(data) = data else {
        return format!("HTTP {status}");
    };

    match data.get("message") {
        Some(Value::String(message)) if !message.is_empty() => return message.clone(),
        Some(Value::Array(items)) if !items.is_empty() => return value_text(&items[0]),
        _ => {}
    }

    ["message", "error", "detail"]
        .iter()
        .filter_map(|key| data.get(key))
        .find(|value| is_present(value))
        .map(value_text)
        .unwrap_or_else(|| format!("HTTP {status}"))
}

/// Null, `false`, zero and the empty string count as absent.
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => false,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64() != Some(0.0),
        _ => true,
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_string_wins() {
        let data = json!({ "message": "Team name taken", "error": "Conflict" });
        assert_eq!(error_message(409, Some(&data)), "Team name taken");
    }

    #[test]
    fn first_element_of_message_array() {
        let data = json!({ "message": ["email must be an email", "password too short"] });
        assert_eq!(error_message(400, Some(&data)), "email must be an email");
    }

    #[test]
    fn blank_message_falls_through_to_error() {
        let data = json!({ "message": "", "error": "Bad Request" });
        assert_eq!(error_message(400, Some(&data)), "Bad Request");

        let data = json!({ "message": null, "detail": "Not Acceptable" });
        assert_eq!(error_message(406, Some(&data)), "Not Acceptable");
    }

    #[test]
    fn empty_message_array_is_encoded() {
        let data = json!({ "message": [], "error": "Bad Request" });
        assert_eq!(error_message(400, Some(&data)), "[]");
    }

    #[test]
    fn object_values_are_json_encoded() {
        let data = json!({ "error": { "code": "E42" } });
        assert_eq!(error_message(500, Some(&data)), r#"{"code":"E42"}"#);

        let data = json!({ "detail": { "field": "email" } });
        assert_eq!(error_message(422, Some(&data)), r#"{"field":"email"}"#);
    }

    #[test]
    fn falls_back_to_status() {
        assert_eq!(error_message(502, None), "HTTP 502");
        assert_eq!(error_message(404, Some(&json!({ "ok": false }))), "HTTP 404");
        assert_eq!(error_message(404, Some(&json!("plain"))), "HTTP 404");
    }

    #[test]
    fn http_error_displays_extracted_message() {
        let err = Error::http(403, Some(json!({ "message": "Not a team admin" })));
        assert_eq!(err.to_string(), "Not a team admin");
        assert_eq!(err.status(), Some(403));
        assert!(!err.is_unauthorized());
        assert!(!err.is_transport());
    }

    #[test]
    fn transport_errors_map_to_variants() {
        let err: Error = TransportError::Timeout(Duration::from_millis(20_000)).into();
        assert!(matches!(err, Error::Timeout(_)));
        assert!(err.is_transport());
        assert_eq!(err.to_string(), "request timed out after 20000ms");

        let err: Error = TransportError::Network("connection refused".into()).into();
        assert!(matches!(err, Error::Transport(_)));
    }
}
