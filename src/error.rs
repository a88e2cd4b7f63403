//! Error types for the Yandex Disk client.

use serde_json::Value;
use thiserror::Error;

/// Every fallible call in the crate reports one of these.
///
/// The payload is a human readable description; only the variant is meant
/// for control flow.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiskError {
    /// The request never produced a usable response (DNS, TLS, connection,
    /// unexpected HTTP status on a transfer URL).
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered with a JSON document describing a rejection.
    #[error("api error: {0}")]
    Api(String),

    /// The response was not JSON, or lacked a field the call depends on.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Local file access failed during a transfer.
    #[error("io error: {0}")]
    Io(String),

    /// The config file could not be read or written.
    #[error("config error: {0}")]
    Config(String),
}

impl DiskError {
    /// Builds the error for a document that lacks `expected`.
    ///
    /// A `message` field means the server rejected the call; otherwise the
    /// shape is simply not what we asked for.
    pub(crate) fn from_document(json: &Value, expected: &str) -> Self {
        match message_of(json, "message") {
            Some(message) => DiskError::Api(message),
            None => DiskError::Protocol(format!("response has no \"{expected}\" field")),
        }
    }

    /// Same as [`DiskError::from_document`] but looks at a custom error key first.
    pub(crate) fn from_document_keyed(json: &Value, key: &str, expected: &str) -> Self {
        match message_of(json, key) {
            Some(message) => DiskError::Api(message),
            None => Self::from_document(json, expected),
        }
    }
}

fn message_of(json: &Value, key: &str) -> Option<String> {
    json.get(key).and_then(Value::as_str).map(str::to_string)
}

impl From<reqwest::Error> for DiskError {
    fn from(value: reqwest::Error) -> Self {
        DiskError::Transport(value.to_string())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, DiskError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_becomes_api_error() {
        let doc = json!({"message": "Resource not found.", "error": "DiskNotFoundError"});
        assert_eq!(
            DiskError::from_document(&doc, "href"),
            DiskError::Api("Resource not found.".to_string())
        );
    }

    #[test]
    fn missing_message_is_protocol_error() {
        let doc = json!({"unexpected": true});
        assert!(matches!(
            DiskError::from_document(&doc, "href"),
            DiskError::Protocol(_)
        ));
    }

    #[test]
    fn keyed_lookup_prefers_custom_key() {
        let doc = json!({"error": "DiskNotFoundError", "message": "not found"});
        assert_eq!(
            DiskError::from_document_keyed(&doc, "error", "path"),
            DiskError::Api("DiskNotFoundError".to_string())
        );
    }

    #[test]
    fn display_includes_category() {
        let err = DiskError::Transport("connection refused".to_string());
        assert_eq!(err.to_string(), "transport error: connection refused");
    }
}
