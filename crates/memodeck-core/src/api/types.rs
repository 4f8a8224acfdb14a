use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Uniform result envelope for every API call.
///
/// The backend wraps all responses in this shape, and the client
/// fabricates the same shape for transport-level failures, so callers
/// branch on one structure and never catch exceptions. `success` and
/// `message` come from the backend verbatim on parsed responses; the
/// transport status does not override them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Successful envelope with a payload.
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            error: None,
        }
    }

    /// Failure envelope fabricated by the client.
    pub fn failure(message: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            error: Some(error.into()),
        }
    }
}

/// Per-call overrides for a single request.
///
/// Unset fields fall back to the global [`ClientConfig`](crate::config::ClientConfig).
#[derive(Debug, Clone)]
pub struct RequestConfig {
    /// Extra headers, applied after the standard set (may override it).
    pub headers: Option<HashMap<String, String>>,
    /// Per-attempt timeout for this call.
    pub timeout: Option<Duration>,
    /// Attempt budget for this call.
    pub retries: Option<u32>,
    /// Whether a terminal failure surfaces a user-facing notification.
    /// Defaults to true; background polling turns it off.
    pub show_error: bool,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            headers: None,
            timeout: None,
            retries: None,
            show_error: true,
        }
    }
}

impl RequestConfig {
    /// Config for background work: failures are not surfaced to the user.
    pub fn silent() -> Self {
        Self {
            show_error: false,
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(HashMap::new)
            .insert(name.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_parses_backend_shapes() {
        // Full envelope.
        let parsed: ApiResponse<Vec<i64>> = serde_json::from_value(json!({
            "success": true,
            "message": "ok",
            "data": [1, 2, 3]
        }))
        .unwrap();
        assert!(parsed.success);
        assert_eq!(parsed.data, Some(vec![1, 2, 3]));

        // Failure without data, message defaulted.
        let parsed: ApiResponse<Vec<i64>> = serde_json::from_value(json!({
            "success": false,
            "error": "deck not found"
        }))
        .unwrap();
        assert!(!parsed.success);
        assert_eq!(parsed.message, "");
        assert_eq!(parsed.error.as_deref(), Some("deck not found"));
    }

    #[test]
    fn test_envelope_rejects_shapeless_bodies() {
        // No `success` field: not an envelope.
        let result: Result<ApiResponse<()>, _> =
            serde_json::from_value(json!({"message": "hello"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_request_config_defaults() {
        let config = RequestConfig::default();
        assert!(config.show_error);
        assert!(config.timeout.is_none());
        assert!(config.retries.is_none());

        assert!(!RequestConfig::silent().show_error);
    }

    #[test]
    fn test_with_header_accumulates() {
        let config = RequestConfig::default()
            .with_header("x-debug", "1")
            .with_header("x-trace", "abc");
        let headers = config.headers.unwrap();
        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get("x-trace").map(String::as_str), Some("abc"));
    }
}
