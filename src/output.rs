//! Output formatting - deterministic JSON envelope

use crate::error::GatewayError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Standard CLI output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputEnvelope {
    /// Indicates success or failure
    pub ok: bool,

    /// API path that was requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Payload data (present on success)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// Error information (present on failure)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,

    pub meta: Metadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Machine-readable error kind (API_ERROR, TRANSPORT_ERROR, ...)
    pub code: String,

    /// Server error code, for API errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_code: Option<i64>,

    /// Human-readable error message
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    /// Server's current time (Unix seconds)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_time: Option<i64>,

    /// Server's cached-until time (Unix seconds)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached_until: Option<i64>,
}

impl OutputEnvelope {
    /// Create a success response
    pub fn success(
        path: Option<&str>,
        data: Value,
        current_time: Option<i64>,
        cached_until: Option<i64>,
    ) -> Self {
        Self {
            ok: true,
            path: path.map(ToString::to_string),
            data: Some(data),
            error: None,
            meta: Metadata {
                current_time,
                cached_until,
            },
        }
    }

    /// Create an error response from a gateway error
    pub fn from_error(path: Option<&str>, err: &GatewayError) -> Self {
        let (code, api_code, meta) = match err {
            GatewayError::Application(e) => (
                "API_ERROR",
                Some(e.code),
                Metadata {
                    current_time: e.timestamp,
                    cached_until: e.expires,
                },
            ),
            GatewayError::Transport(_) => ("TRANSPORT_ERROR", None, Metadata::default()),
            GatewayError::Decode(_) => ("DECODE_ERROR", None, Metadata::default()),
            GatewayError::Config(_) => ("CONFIG_ERROR", None, Metadata::default()),
        };

        let message = match err {
            GatewayError::Application(e) => e.message.clone(),
            other => other.to_string(),
        };

        Self::error(path, code, api_code, message, meta)
    }

    /// Create an error response
    pub fn error(
        path: Option<&str>,
        code: &str,
        api_code: Option<i64>,
        message: String,
        meta: Metadata,
    ) -> Self {
        Self {
            ok: false,
            path: path.map(ToString::to_string),
            data: None,
            error: Some(ErrorInfo {
                code: code.to_string(),
                api_code,
                message,
            }),
            meta,
        }
    }

    /// Serialize to a JSON string
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| serialize_error_json(&e.to_string()))
    }
}

fn serialize_error_json(message: &str) -> String {
    serde_json::json!({
        "ok": false,
        "error": {
            "code": "SERIALIZE_ERROR",
            "message": message,
        },
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ApplicationError, DecodeError};

    #[test]
    fn test_success_envelope() {
        let envelope = OutputEnvelope::success(
            Some("server/ServerStatus"),
            serde_json::json!({"online": true}),
            Some(1),
            Some(2),
        );
        let json: Value = serde_json::from_str(&envelope.to_json()).unwrap();

        assert_eq!(json["ok"], true);
        assert_eq!(json["path"], "server/ServerStatus");
        assert_eq!(json["data"]["online"], true);
        assert_eq!(json["meta"]["cached_until"], 2);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_api_error_envelope() {
        let err = GatewayError::Application(ApplicationError {
            code: 203,
            message: "Authentication failure.".to_string(),
            timestamp: Some(10),
            expires: Some(70),
        });
        let envelope = OutputEnvelope::from_error(Some("account/Characters"), &err);
        let json: Value = serde_json::from_str(&envelope.to_json()).unwrap();

        assert_eq!(json["ok"], false);
        assert_eq!(json["error"]["code"], "API_ERROR");
        assert_eq!(json["error"]["api_code"], 203);
        assert_eq!(json["error"]["message"], "Authentication failure.");
        assert_eq!(json["meta"]["current_time"], 10);
    }

    #[test]
    fn test_decode_error_envelope() {
        let err = GatewayError::Decode(DecodeError::Structure("bad".to_string()));
        let envelope = OutputEnvelope::from_error(None, &err);

        let info = envelope.error.unwrap();
        assert_eq!(info.code, "DECODE_ERROR");
        assert!(info.api_code.is_none());
        assert!(info.message.contains("bad"));
    }

    #[test]
    fn test_serialize_error_json_escapes_message() {
        let text = serialize_error_json("bad \"quote\"\nline");
        let json: Value = serde_json::from_str(&text).unwrap();

        assert_eq!(json["ok"], false);
        assert_eq!(json["error"]["code"], "SERIALIZE_ERROR");
        assert_eq!(json["error"]["message"], "bad \"quote\"\nline");
    }
}
